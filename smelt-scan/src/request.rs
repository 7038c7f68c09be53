//! The decryption job request model and its wire payload.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use smelt_chain::{
    keys::AccountKeySet,
    note::{EncryptedNote, ENCRYPTED_NOTE_SIZE},
    serialization::{
        ReadSmeltExt, SerializationError, SmeltDeserialize, SmeltDeserializeInto, SmeltSerialize,
        TrustedPreallocate, WriteSmeltExt, MAX_JOB_MESSAGE_LEN,
    },
};

/// Flag bit for [`DecryptOptions::decrypt_for_spender`].
const DECRYPT_FOR_SPENDER_FLAG: u8 = 0b0000_0001;

/// Flag bit for [`DecryptOptions::skip_note_validation`].
const SKIP_NOTE_VALIDATION_FLAG: u8 = 0b0000_0010;

/// An encrypted note to trial-decrypt, with its position in the global
/// note commitment sequence.
///
/// The position is carried because nullifier derivation needs it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedNoteCandidate {
    /// The opaque ciphertext container.
    pub note: EncryptedNote,
    /// The note's position in the global commitment sequence.
    pub note_index: u64,
}

impl SmeltSerialize for EncryptedNoteCandidate {
    fn wire_size(&self) -> usize {
        4 + ENCRYPTED_NOTE_SIZE + 8
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_count(ENCRYPTED_NOTE_SIZE)?;
        self.note.smelt_serialize(&mut writer)?;
        writer.write_u64::<LittleEndian>(self.note_index)?;
        Ok(())
    }
}

impl SmeltDeserialize for EncryptedNoteCandidate {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let note_len = reader.read_count_usize()?;
        if note_len != ENCRYPTED_NOTE_SIZE {
            return Err(SerializationError::Parse(
                "candidate note length does not match the ciphertext container size",
            ));
        }
        let note = EncryptedNote::smelt_deserialize(&mut reader)?;
        let note_index = reader.read_u64::<LittleEndian>()?;

        Ok(Self { note, note_index })
    }
}

impl TrustedPreallocate for EncryptedNoteCandidate {
    fn max_allocation() -> u64 {
        // A candidate is a length prefix, the note container, and a u64
        // index, so this is the most candidates that fit in a job message.
        (MAX_JOB_MESSAGE_LEN as u64) / (4 + ENCRYPTED_NOTE_SIZE as u64 + 8)
    }
}

/// Configuration for a decryption job.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DecryptOptions {
    /// Also attempt spender-side decryption when receiver-side decryption
    /// fails for every account.
    pub decrypt_for_spender: bool,
    /// Skip recomputing the note commitment after a successful decryption.
    ///
    /// Decryption itself and nullifier derivation are unaffected.
    pub skip_note_validation: bool,
}

impl DecryptOptions {
    /// Pack the options into their wire flags byte.
    pub fn to_flags_byte(self) -> u8 {
        let mut flags = 0;
        if self.decrypt_for_spender {
            flags |= DECRYPT_FOR_SPENDER_FLAG;
        }
        if self.skip_note_validation {
            flags |= SKIP_NOTE_VALIDATION_FLAG;
        }
        flags
    }

    /// Unpack the wire flags byte, rejecting unrecognized bits.
    pub fn from_flags_byte(flags: u8) -> Result<Self, SerializationError> {
        if flags & !(DECRYPT_FOR_SPENDER_FLAG | SKIP_NOTE_VALIDATION_FLAG) != 0 {
            return Err(SerializationError::Parse("unrecognized decrypt option flags"));
        }

        Ok(Self {
            decrypt_for_spender: flags & DECRYPT_FOR_SPENDER_FLAG != 0,
            skip_note_validation: flags & SKIP_NOTE_VALIDATION_FLAG != 0,
        })
    }
}

/// A batch of encrypted notes to trial-decrypt against a set of accounts.
///
/// Immutable once constructed; workers only ever read it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecryptNotesRequest {
    /// The caller-chosen correlation id, carried unchanged into the
    /// response. Opaque to the decryption algorithm.
    pub job_id: u64,
    /// The account key sets to try, in priority order.
    pub account_keys: Vec<AccountKeySet>,
    /// The candidate notes, in request order.
    pub candidates: Vec<EncryptedNoteCandidate>,
    /// Per-job options.
    pub options: DecryptOptions,
}

impl DecryptNotesRequest {
    /// Build a request for trial-decrypting `candidates` against
    /// `account_keys`.
    pub fn new(
        account_keys: Vec<AccountKeySet>,
        candidates: Vec<EncryptedNoteCandidate>,
        options: DecryptOptions,
        job_id: u64,
    ) -> Self {
        Self {
            job_id,
            account_keys,
            candidates,
            options,
        }
    }

    /// The exact payload length in bytes, excluding the envelope header.
    pub fn payload_size(&self) -> usize {
        self.account_keys.wire_size() + self.candidates.wire_size() + 1
    }

    /// Write the payload. The envelope carries `job_id`, so it is not
    /// written here.
    pub fn serialize_payload<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.account_keys.smelt_serialize(&mut writer)?;
        self.candidates.smelt_serialize(&mut writer)?;
        writer.write_u8(self.options.to_flags_byte())?;
        Ok(())
    }

    /// Read a payload back, reattaching the envelope's `job_id`.
    pub fn deserialize_payload<R: io::Read>(
        job_id: u64,
        mut reader: R,
    ) -> Result<Self, SerializationError> {
        let account_keys = (&mut reader).smelt_deserialize_into()?;
        let candidates = (&mut reader).smelt_deserialize_into()?;
        let options = DecryptOptions::from_flags_byte(reader.read_u8()?)?;

        Ok(Self {
            job_id,
            account_keys,
            candidates,
            options,
        })
    }
}
