//! Chain primitives for Smelt: the wire codec, account view keys, encrypted
//! notes and their nullifiers, and consensus parameters.

#![doc(html_root_url = "https://docs.rs/smelt_chain")]
#![deny(missing_docs)]

pub mod block;
pub mod keys;
pub mod note;
pub mod parameters;
pub mod serialization;
