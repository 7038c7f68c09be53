//! Job-critical serialization.
//!
//! This module contains four traits: `SmeltSerialize` and `SmeltDeserialize`,
//! analogs of the Serde `Serialize` and `Deserialize` traits but intended for
//! the job wire formats that cross worker thread boundaries, and
//! `WriteSmeltExt` and `ReadSmeltExt`, extension traits for `io::Read` and
//! `io::Write` with utility functions for reading and writing wire data
//! (e.g., the wide `u32` list count format).
//!
//! The whole protocol uses a single declared byte order: little-endian.

mod error;
mod read_smelt;
mod smelt_deserialize;
mod smelt_serialize;
mod write_smelt;

pub mod wire_value;

#[cfg(test)]
mod tests;

pub use error::SerializationError;
pub use read_smelt::ReadSmeltExt;
pub use smelt_deserialize::{
    smelt_deserialize_bytes_external_count, smelt_deserialize_external_count, SmeltDeserialize,
    SmeltDeserializeInto, TrustedPreallocate,
};
pub use smelt_serialize::{
    smelt_serialize_bytes, smelt_serialize_external_count, smelt_serialized_bytes_size,
    SmeltSerialize, MAX_JOB_MESSAGE_LEN,
};
pub use wire_value::{serialize, WireValue};
pub use write_smelt::WriteSmeltExt;
