//! Note plaintexts, ciphertext containers, and nullifiers.
//!
//! A note is a value-transfer record. On chain it only ever appears
//! encrypted; the trial-decryption engine turns ciphertext containers back
//! into these plaintexts for the accounts that can view them.

use std::{fmt, io};

use rand::{CryptoRng, RngCore};

use crate::{
    keys::TransmissionKey,
    serialization::{
        ReadSmeltExt, SerializationError, SmeltDeserialize, SmeltSerialize, WriteSmeltExt,
    },
};

mod ciphertext;
mod nullifier;

pub use ciphertext::{EncryptedNote, ENCRYPTED_NOTE_SIZE};
pub use nullifier::Nullifier;

/// The exact serialized length of a note plaintext, in bytes.
///
/// owner ‖ asset id ‖ value ‖ randomness ‖ memo ‖ sender.
pub const PLAINTEXT_NOTE_SIZE: usize = 32 + 32 + 8 + 32 + 32 + 32;

/// The byte length of a note memo.
pub const MEMO_SIZE: usize = 32;

/// An asset identifier.
///
/// The all-zero identifier is reserved for the chain's native asset.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    /// The native asset of the chain.
    pub fn native() -> Self {
        Self([0u8; 32])
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("AssetId")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for AssetId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A fixed-width note memo.
///
/// Shorter text is zero-padded; longer text is truncated to
/// [`MEMO_SIZE`] bytes.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Memo(pub [u8; MEMO_SIZE]);

impl From<&str> for Memo {
    fn from(text: &str) -> Self {
        let mut bytes = [0u8; MEMO_SIZE];
        let text_bytes = text.as_bytes();
        let len = text_bytes.len().min(MEMO_SIZE);
        bytes[..len].copy_from_slice(&text_bytes[..len]);
        Self(bytes)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => f
                .debug_tuple("Memo")
                .field(&text.trim_end_matches('\0'))
                .finish(),
            Err(_) => f.debug_tuple("Memo").field(&hex::encode(self.0)).finish(),
        }
    }
}

/// A decrypted note plaintext.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Note {
    /// The transmission key of the account this note pays.
    pub owner: TransmissionKey,
    /// The asset being transferred.
    pub asset_id: AssetId,
    /// The amount being transferred, in base units.
    pub value: u64,
    /// Commitment trapdoor, chosen fresh for every note.
    pub randomness: [u8; 32],
    /// The note memo.
    pub memo: Memo,
    /// The transmission key of the account that created the note.
    pub sender: TransmissionKey,
}

impl Note {
    /// Build a note paying `value` of the native asset to `owner`.
    pub fn new<T>(
        owner: TransmissionKey,
        value: u64,
        memo: Memo,
        sender: TransmissionKey,
        csprng: &mut T,
    ) -> Self
    where
        T: RngCore + CryptoRng,
    {
        let mut randomness = [0u8; 32];
        csprng.fill_bytes(&mut randomness);

        Self {
            owner,
            asset_id: AssetId::native(),
            value,
            randomness,
            memo,
            sender,
        }
    }

    /// The note's committed form: a personalized BLAKE2b-256 digest of the
    /// canonical plaintext encoding.
    ///
    /// The ciphertext container carries this commitment in the clear, so a
    /// decrypted plaintext can be validated against it.
    pub fn commitment(&self) -> NoteCommitment {
        let encoding = self
            .smelt_serialize_to_vec()
            .expect("writes to a Vec<u8> are infallible");

        let hash = blake2b_simd::Params::new()
            .hash_length(32)
            .personal(b"Smelt_NoteCommit")
            .to_state()
            .update(&encoding)
            .finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(hash.as_bytes());
        NoteCommitment(bytes)
    }
}

impl SmeltSerialize for Note {
    fn wire_size(&self) -> usize {
        PLAINTEXT_NOTE_SIZE
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_32_bytes(&self.owner.0)?;
        writer.write_32_bytes(&self.asset_id.0)?;
        writer.write_all(&self.value.to_le_bytes())?;
        writer.write_32_bytes(&self.randomness)?;
        writer.write_32_bytes(&self.memo.0)?;
        writer.write_32_bytes(&self.sender.0)
    }
}

impl SmeltDeserialize for Note {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let owner = TransmissionKey::from(reader.read_32_bytes()?);
        let asset_id = AssetId::from(reader.read_32_bytes()?);

        let mut value_bytes = [0u8; 8];
        reader.read_exact(&mut value_bytes)?;
        let value = u64::from_le_bytes(value_bytes);

        let randomness = reader.read_32_bytes()?;
        let memo = Memo(reader.read_32_bytes()?);
        let sender = TransmissionKey::from(reader.read_32_bytes()?);

        Ok(Self {
            owner,
            asset_id,
            value,
            randomness,
            memo,
            sender,
        })
    }
}

/// A note commitment: the digest the chain stores for an encrypted note.
///
/// Doubles as the note's hash in decryption results.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct NoteCommitment(pub [u8; 32]);

impl fmt::Debug for NoteCommitment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("NoteCommitment")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for NoteCommitment {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl SmeltSerialize for NoteCommitment {
    fn wire_size(&self) -> usize {
        32
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.0[..])
    }
}

impl SmeltDeserialize for NoteCommitment {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let bytes = reader.read_32_bytes()?;

        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::thread_rng;

    use crate::keys::IncomingViewKey;

    fn test_note() -> Note {
        let mut rng = thread_rng();
        let owner = IncomingViewKey::new(&mut rng).transmission_key();
        let sender = IncomingViewKey::new(&mut rng).transmission_key();

        Note::new(owner, 42, Memo::from("geology rocks"), sender, &mut rng)
    }

    #[test]
    fn plaintext_wire_size_is_exact() {
        let note = test_note();
        let data = note.smelt_serialize_to_vec().unwrap();
        assert_eq!(data.len(), PLAINTEXT_NOTE_SIZE);

        let parsed = Note::smelt_deserialize(&data[..]).unwrap();
        assert_eq!(note, parsed);
    }

    #[test]
    fn commitment_is_deterministic_and_binds_the_plaintext() {
        let note = test_note();
        assert_eq!(note.commitment(), note.commitment());

        let mut other = note.clone();
        other.value += 1;
        assert_ne!(note.commitment(), other.commitment());
    }

    #[test]
    fn memo_pads_and_truncates() {
        assert_eq!(Memo::from("hi").0[..2], *b"hi");
        assert_eq!(Memo::from("hi").0[2..], [0u8; 30]);

        let long = "x".repeat(MEMO_SIZE + 10);
        assert_eq!(Memo::from(long.as_str()).0, [b'x'; MEMO_SIZE]);
    }
}
