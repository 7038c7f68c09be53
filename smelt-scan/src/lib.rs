//! Parallel batched note decryption for Smelt.
//!
//! A caller builds a [`DecryptNotesRequest`], submits it to the
//! [`WorkerPool`], and awaits the returned [`JobHandle`]. An idle worker
//! thread deserializes the job, trial-decrypts every candidate against
//! every account with [`decrypt_notes`], and sends back a
//! [`DecryptNotesResponse`] the caller can split per account with
//! [`DecryptNotesResponse::map_to_accounts`].

#![doc(html_root_url = "https://docs.rs/smelt_scan")]
#![deny(missing_docs)]

pub mod config;
pub mod message;
pub mod pool;
pub mod request;
pub mod response;
pub mod scan;

pub use config::Config;
pub use message::{JobError, WorkerReply, WorkerRequest, WorkerResponse};
pub use pool::{JobHandle, PoolError, WorkerPool};
pub use request::{DecryptNotesRequest, DecryptOptions, EncryptedNoteCandidate};
pub use response::{DecryptNotesResponse, DecryptedNote};
pub use scan::decrypt_notes;
