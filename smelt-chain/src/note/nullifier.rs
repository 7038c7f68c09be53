//! Nullifier derivation for decrypted notes.

use std::{fmt, io};

use crate::{
    keys::ViewKey,
    note::NoteCommitment,
    serialization::{SerializationError, SmeltDeserialize, SmeltSerialize},
};

/// Derives a nullifier from the nullifier deriving key, the note's
/// commitment, and its global position.
fn prf_nullifier(
    nullifier_deriving_key: [u8; 32],
    commitment: [u8; 32],
    position: u64,
) -> [u8; 32] {
    let hash = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(b"Smelt_Nullifier")
        .to_state()
        .update(&nullifier_deriving_key[..])
        .update(&commitment[..])
        .update(&position.to_le_bytes())
        .finalize();

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(hash.as_bytes());
    bytes
}

/// The unique spend tag of a note.
///
/// Revealing it when the note is spent marks the note as consumed without
/// revealing which note it was. Deriving it requires the full view key, so
/// holders of only the incoming view key can decrypt notes but not watch
/// for their spends.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    /// Derive the nullifier of the note committed to by `commitment`, held
    /// at the global leaf `position`, for the account with `view_key`.
    pub fn derive(view_key: &ViewKey, commitment: &NoteCommitment, position: u64) -> Self {
        Self(prf_nullifier(
            view_key.nullifier_deriving_key,
            commitment.0,
            position,
        ))
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Nullifier")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for Nullifier {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Nullifier> for [u8; 32] {
    fn from(n: Nullifier) -> Self {
        n.0
    }
}

impl SmeltSerialize for Nullifier {
    fn wire_size(&self) -> usize {
        32
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl SmeltDeserialize for Nullifier {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut bytes = [0u8; 32];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::thread_rng;

    #[test]
    fn distinct_positions_give_distinct_nullifiers() {
        let view_key = ViewKey::new(&mut thread_rng());
        let commitment = NoteCommitment([7u8; 32]);

        let first = Nullifier::derive(&view_key, &commitment, 0);
        let second = Nullifier::derive(&view_key, &commitment, 1);

        assert_ne!(first, second);
    }

    #[test]
    fn distinct_keys_give_distinct_nullifiers() {
        let mut rng = thread_rng();
        let commitment = NoteCommitment([7u8; 32]);

        let first = Nullifier::derive(&ViewKey::new(&mut rng), &commitment, 3);
        let second = Nullifier::derive(&ViewKey::new(&mut rng), &commitment, 3);

        assert_ne!(first, second);
    }

    #[test]
    fn derivation_is_deterministic() {
        let view_key = ViewKey::new(&mut thread_rng());
        let commitment = NoteCommitment([9u8; 32]);

        assert_eq!(
            Nullifier::derive(&view_key, &commitment, 42),
            Nullifier::derive(&view_key, &commitment, 42),
        );
    }
}
