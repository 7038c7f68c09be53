//! The fixed-size encrypted note container and its two decryption paths.
//!
//! Layout: note commitment ‖ ephemeral x25519 public key ‖ AEAD-sealed
//! plaintext for the receiver ‖ AEAD-sealed recovery block for the spender.
//! The receiver path opens the plaintext directly from a Diffie-Hellman
//! shared secret with the incoming view key; the spender path first opens
//! the recovery block under the outgoing view key to recover the ephemeral
//! secret, then re-derives the receiver key from it.

use std::{fmt, io};

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

#[cfg(test)]
use proptest::{arbitrary::any, collection::vec, prelude::*};

use crate::{
    keys::{IncomingViewKey, OutgoingViewKey},
    note::{Note, NoteCommitment, PLAINTEXT_NOTE_SIZE},
    serialization::{SerializationError, SmeltDeserialize, SmeltSerialize},
};

/// AES-256-GCM authentication tag length.
const AEAD_TAG_SIZE: usize = 16;

/// The sealed note plaintext, as stored in the container.
const RECEIVER_CIPHERTEXT_SIZE: usize = PLAINTEXT_NOTE_SIZE + AEAD_TAG_SIZE;

/// The sealed spender recovery block: ephemeral secret ‖ owner key.
const RECOVERY_CIPHERTEXT_SIZE: usize = 32 + 32 + AEAD_TAG_SIZE;

/// The exact serialized length of an encrypted note container, in bytes.
pub const ENCRYPTED_NOTE_SIZE: usize =
    32 + 32 + RECEIVER_CIPHERTEXT_SIZE + RECOVERY_CIPHERTEXT_SIZE;

const EPHEMERAL_KEY_OFFSET: usize = 32;
const RECEIVER_CIPHERTEXT_OFFSET: usize = 64;
const RECOVERY_CIPHERTEXT_OFFSET: usize = RECEIVER_CIPHERTEXT_OFFSET + RECEIVER_CIPHERTEXT_SIZE;

/// Every sealed block is keyed by a fresh single-use key (the ephemeral key
/// is unique per note), so a fixed nonce is sound.
const NOTE_ENCRYPTION_NONCE: [u8; 12] = [0u8; 12];

/// An encrypted note container.
pub struct EncryptedNote(pub [u8; ENCRYPTED_NOTE_SIZE]);

impl EncryptedNote {
    /// Encrypt `note` so its owner can decrypt it with their incoming view
    /// key, and the sender can later recover it with `outgoing_view_key`.
    pub fn encrypt<T>(note: &Note, outgoing_view_key: &OutgoingViewKey, csprng: &mut T) -> Self
    where
        T: RngCore + CryptoRng,
    {
        let plaintext = note
            .smelt_serialize_to_vec()
            .expect("writes to a Vec<u8> are infallible");
        let commitment = note.commitment();

        let ephemeral_secret = StaticSecret::random_from_rng(&mut *csprng);
        let ephemeral_key = PublicKey::from(&ephemeral_secret);
        let shared_secret = ephemeral_secret.diffie_hellman(&PublicKey::from(note.owner));

        let receiver_ciphertext = seal(
            kdf_receiver(&shared_secret, &ephemeral_key),
            &plaintext,
        );

        let mut recovery_block = [0u8; 64];
        recovery_block[..32].copy_from_slice(&ephemeral_secret.to_bytes());
        recovery_block[32..].copy_from_slice(&note.owner.0);
        let recovery_ciphertext = seal(
            kdf_recovery(outgoing_view_key, &ephemeral_key, &commitment),
            &recovery_block,
        );

        let mut bytes = [0u8; ENCRYPTED_NOTE_SIZE];
        bytes[..32].copy_from_slice(&commitment.0);
        bytes[EPHEMERAL_KEY_OFFSET..RECEIVER_CIPHERTEXT_OFFSET]
            .copy_from_slice(ephemeral_key.as_bytes());
        bytes[RECEIVER_CIPHERTEXT_OFFSET..RECOVERY_CIPHERTEXT_OFFSET]
            .copy_from_slice(&receiver_ciphertext);
        bytes[RECOVERY_CIPHERTEXT_OFFSET..].copy_from_slice(&recovery_ciphertext);

        Self(bytes)
    }

    /// The committed form this container claims for its plaintext.
    ///
    /// Also serves as the note's hash in decryption results.
    pub fn commitment(&self) -> NoteCommitment {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.0[..32]);
        NoteCommitment(bytes)
    }

    /// Try to decrypt this note as its receiver.
    ///
    /// Returns `None` when the note is not addressed to the holder of
    /// `incoming_view_key`. That is a routine miss during trial decryption,
    /// never an error.
    pub fn decrypt_note_for_owner(&self, incoming_view_key: &IncomingViewKey) -> Option<Note> {
        let ephemeral_key = self.ephemeral_key();
        let shared_secret =
            StaticSecret::from(incoming_view_key.0).diffie_hellman(&ephemeral_key);

        let plaintext = open(
            kdf_receiver(&shared_secret, &ephemeral_key),
            &self.0[RECEIVER_CIPHERTEXT_OFFSET..RECOVERY_CIPHERTEXT_OFFSET],
        )?;

        Note::smelt_deserialize(&plaintext[..]).ok()
    }

    /// Try to decrypt this note as its spender, using the outgoing view key
    /// it was created under.
    ///
    /// Returns `None` when `outgoing_view_key` did not create this note.
    pub fn decrypt_note_for_spender(&self, outgoing_view_key: &OutgoingViewKey) -> Option<Note> {
        let ephemeral_key = self.ephemeral_key();

        let recovery_block = open(
            kdf_recovery(outgoing_view_key, &ephemeral_key, &self.commitment()),
            &self.0[RECOVERY_CIPHERTEXT_OFFSET..],
        )?;

        let mut ephemeral_secret_bytes = [0u8; 32];
        ephemeral_secret_bytes.copy_from_slice(&recovery_block[..32]);
        let mut owner_bytes = [0u8; 32];
        owner_bytes.copy_from_slice(&recovery_block[32..]);

        // An authentic recovery block still has to be self-consistent: the
        // recovered ephemeral secret must produce the container's ephemeral
        // key.
        let ephemeral_secret = StaticSecret::from(ephemeral_secret_bytes);
        if PublicKey::from(&ephemeral_secret).as_bytes() != ephemeral_key.as_bytes() {
            return None;
        }

        let shared_secret = ephemeral_secret.diffie_hellman(&PublicKey::from(owner_bytes));
        let plaintext = open(
            kdf_receiver(&shared_secret, &ephemeral_key),
            &self.0[RECEIVER_CIPHERTEXT_OFFSET..RECOVERY_CIPHERTEXT_OFFSET],
        )?;

        Note::smelt_deserialize(&plaintext[..]).ok()
    }

    fn ephemeral_key(&self) -> PublicKey {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.0[EPHEMERAL_KEY_OFFSET..RECEIVER_CIPHERTEXT_OFFSET]);
        PublicKey::from(bytes)
    }
}

/// Derive the AEAD key for the receiver ciphertext.
fn kdf_receiver(shared_secret: &SharedSecret, ephemeral_key: &PublicKey) -> [u8; 32] {
    let hash = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(b"Smelt_NoteEnc")
        .to_state()
        .update(shared_secret.as_bytes())
        .update(ephemeral_key.as_bytes())
        .finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(hash.as_bytes());
    key
}

/// Derive the AEAD key for the spender recovery block.
fn kdf_recovery(
    outgoing_view_key: &OutgoingViewKey,
    ephemeral_key: &PublicKey,
    commitment: &NoteCommitment,
) -> [u8; 32] {
    let hash = blake2b_simd::Params::new()
        .hash_length(32)
        .personal(b"Smelt_OutCipher")
        .to_state()
        .update(&outgoing_view_key.0)
        .update(ephemeral_key.as_bytes())
        .update(&commitment.0)
        .finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(hash.as_bytes());
    key
}

/// Seal `plaintext` under `key`.
fn seal(key: [u8; 32], plaintext: &[u8]) -> Vec<u8> {
    Aes256Gcm::new(&key.into())
        .encrypt(&NOTE_ENCRYPTION_NONCE.into(), plaintext)
        .expect("sealing a fixed-size plaintext cannot fail")
}

/// Open `ciphertext` under `key`; authentication failure is a routine miss.
fn open(key: [u8; 32], ciphertext: &[u8]) -> Option<Vec<u8>> {
    Aes256Gcm::new(&key.into())
        .decrypt(&NOTE_ENCRYPTION_NONCE.into(), ciphertext)
        .ok()
}

impl fmt::Debug for EncryptedNote {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("EncryptedNote")
            .field(&hex::encode(&self.0[..]))
            .finish()
    }
}

// These impls all only exist because of array length restrictions.

impl Copy for EncryptedNote {}

impl Clone for EncryptedNote {
    fn clone(&self) -> Self {
        let mut bytes = [0; ENCRYPTED_NOTE_SIZE];
        bytes[..].copy_from_slice(&self.0[..]);
        Self(bytes)
    }
}

impl PartialEq for EncryptedNote {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl Eq for EncryptedNote {}

impl TryFrom<&[u8]> for EncryptedNote {
    type Error = SerializationError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != ENCRYPTED_NOTE_SIZE {
            return Err(SerializationError::Parse(
                "encrypted note has the wrong length",
            ));
        }

        let mut array = [0; ENCRYPTED_NOTE_SIZE];
        array[..].copy_from_slice(bytes);
        Ok(Self(array))
    }
}

impl SmeltSerialize for EncryptedNote {
    fn wire_size(&self) -> usize {
        ENCRYPTED_NOTE_SIZE
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.0[..])?;
        Ok(())
    }
}

impl SmeltDeserialize for EncryptedNote {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut bytes = [0; ENCRYPTED_NOTE_SIZE];
        reader.read_exact(&mut bytes[..])?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
impl Arbitrary for EncryptedNote {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        vec(any::<u8>(), ENCRYPTED_NOTE_SIZE)
            .prop_map(|bytes| {
                let mut array = [0; ENCRYPTED_NOTE_SIZE];
                array[..].copy_from_slice(&bytes);
                Self(array)
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

#[cfg(test)]
proptest! {

    #[test]
    fn encrypted_note_roundtrip(en in any::<EncryptedNote>()) {

        let mut data = Vec::new();

        en.smelt_serialize(&mut data).expect("EncryptedNote should serialize");

        let en2 = EncryptedNote::smelt_deserialize(&data[..]).expect("randomized EncryptedNote should deserialize");

        prop_assert_eq![en, en2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::thread_rng;

    use crate::{keys::AccountKeySet, note::Memo};

    fn encrypted_fixture() -> (AccountKeySet, AccountKeySet, Note, EncryptedNote) {
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);

        let note = Note::new(
            receiver.incoming_view_key.transmission_key(),
            1_000,
            Memo::from("ore shipment"),
            sender.incoming_view_key.transmission_key(),
            &mut rng,
        );
        let encrypted = EncryptedNote::encrypt(&note, &sender.outgoing_view_key, &mut rng);

        (receiver, sender, note, encrypted)
    }

    #[test]
    fn owner_can_decrypt() {
        let (receiver, _sender, note, encrypted) = encrypted_fixture();

        let decrypted = encrypted
            .decrypt_note_for_owner(&receiver.incoming_view_key)
            .expect("owner should decrypt their note");
        assert_eq!(decrypted, note);
        assert_eq!(encrypted.commitment(), note.commitment());
    }

    #[test]
    fn spender_can_recover() {
        let (_receiver, sender, note, encrypted) = encrypted_fixture();

        let recovered = encrypted
            .decrypt_note_for_spender(&sender.outgoing_view_key)
            .expect("spender should recover the note they created");
        assert_eq!(recovered, note);
    }

    #[test]
    fn wrong_keys_miss_cleanly() {
        let (_receiver, _sender, _note, encrypted) = encrypted_fixture();
        let stranger = AccountKeySet::generate(&mut thread_rng());

        assert_eq!(
            encrypted.decrypt_note_for_owner(&stranger.incoming_view_key),
            None,
        );
        assert_eq!(
            encrypted.decrypt_note_for_spender(&stranger.outgoing_view_key),
            None,
        );
    }

    #[test]
    fn wrong_length_container_is_rejected() {
        let result = EncryptedNote::try_from(&[0u8; ENCRYPTED_NOTE_SIZE - 1][..]);
        assert!(result.is_err());
    }
}
