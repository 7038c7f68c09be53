use std::{io, num::TryFromIntError};

use thiserror::Error;

/// A serialization error.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// An io error that prevented deserialization
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The data to be deserialized was malformed.
    #[error("parse error: {0}")]
    Parse(&'static str),
    /// A count is too large to convert to a usize (and thus, too large to
    /// allocate on this platform)
    #[error("count too large: {0}")]
    TryFromIntError(#[from] TryFromIntError),
}
