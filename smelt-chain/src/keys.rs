//! Account view-key types used by the trial-decryption engine.
//!
//! An account hands the engine three pieces of view-key material: the
//! incoming view key (detects and decrypts notes addressed to the account),
//! the outgoing view key (recovers notes the account sent), and the view key
//! proper, whose nullifier-deriving half is needed to compute spend
//! nullifiers. None of them carry spending authority.

use std::fmt;

use rand::{CryptoRng, RngCore};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::serialization::{
    ReadSmeltExt, SerializationError, SmeltDeserialize, SmeltSerialize, TrustedPreallocate,
    WriteSmeltExt, MAX_JOB_MESSAGE_LEN,
};

/// The byte length of the incoming and outgoing view keys.
pub const ACCOUNT_KEY_SIZE: usize = 32;

/// The byte length of a [`ViewKey`]: authorizing half plus
/// nullifier-deriving half.
pub const VIEW_KEY_SIZE: usize = 64;

/// An error in constructing a key from caller-supplied bytes.
///
/// Key material is validated here, at construction, so malformed payload
/// shapes never reach serialization or a worker.
#[derive(Error, Debug, PartialEq)]
pub enum KeyError {
    /// The supplied byte string has the wrong length for this key type.
    #[error("key must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// The length this key type requires.
        expected: usize,
        /// The length the caller supplied.
        actual: usize,
    },
    /// The supplied hex string did not decode.
    #[error("invalid hex in key: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// An incoming view key: the x25519 secret that detects and decrypts notes
/// addressed to the account.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct IncomingViewKey(pub [u8; 32]);

impl IncomingViewKey {
    /// Generate a fresh `IncomingViewKey`.
    pub fn new<T>(csprng: &mut T) -> Self
    where
        T: RngCore + CryptoRng,
    {
        let mut bytes = [0u8; 32];
        csprng.fill_bytes(&mut bytes);

        Self::from(bytes)
    }

    /// Parse an `IncomingViewKey` from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        Ok(Self(parse_key_bytes::<32>(s)?))
    }

    /// The transmission key notes addressed to this account are encrypted
    /// to: the x25519 public key of this secret.
    pub fn transmission_key(&self) -> TransmissionKey {
        TransmissionKey::from(PublicKey::from(&StaticSecret::from(self.0)))
    }
}

impl fmt::Debug for IncomingViewKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("IncomingViewKey")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for IncomingViewKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for IncomingViewKey {
    type Error = KeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(check_key_length::<32>(bytes)?))
    }
}

/// An outgoing view key: the symmetric secret that recovers notes the
/// account sent.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct OutgoingViewKey(pub [u8; 32]);

impl OutgoingViewKey {
    /// Generate a fresh `OutgoingViewKey`.
    pub fn new<T>(csprng: &mut T) -> Self
    where
        T: RngCore + CryptoRng,
    {
        let mut bytes = [0u8; 32];
        csprng.fill_bytes(&mut bytes);

        Self::from(bytes)
    }

    /// Parse an `OutgoingViewKey` from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        Ok(Self(parse_key_bytes::<32>(s)?))
    }
}

impl fmt::Debug for OutgoingViewKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("OutgoingViewKey")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for OutgoingViewKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for OutgoingViewKey {
    type Error = KeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(check_key_length::<32>(bytes)?))
    }
}

/// A view key: the authorizing key concatenated with the nullifier-deriving
/// key.
///
/// Only the nullifier-deriving half participates in scanning; the
/// authorizing half is carried so the wire layout matches the account
/// store's key format.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ViewKey {
    /// The authorizing public key half.
    pub authorizing_key: [u8; 32],
    /// The half used to derive spend nullifiers for received notes.
    pub nullifier_deriving_key: [u8; 32],
}

impl ViewKey {
    /// Generate a fresh `ViewKey`.
    pub fn new<T>(csprng: &mut T) -> Self
    where
        T: RngCore + CryptoRng,
    {
        let mut bytes = [0u8; 64];
        csprng.fill_bytes(&mut bytes);

        Self::from(bytes)
    }

    /// Parse a `ViewKey` from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        Ok(Self::from(parse_key_bytes::<64>(s)?))
    }

    /// The full 64-byte encoding: authorizing ‖ nullifier-deriving.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.authorizing_key);
        bytes[32..].copy_from_slice(&self.nullifier_deriving_key);
        bytes
    }
}

impl fmt::Debug for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ViewKey")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}

impl From<[u8; 64]> for ViewKey {
    fn from(bytes: [u8; 64]) -> Self {
        let mut authorizing_key = [0u8; 32];
        let mut nullifier_deriving_key = [0u8; 32];
        authorizing_key.copy_from_slice(&bytes[..32]);
        nullifier_deriving_key.copy_from_slice(&bytes[32..]);

        Self {
            authorizing_key,
            nullifier_deriving_key,
        }
    }
}

impl TryFrom<&[u8]> for ViewKey {
    type Error = KeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self::from(check_key_length::<64>(bytes)?))
    }
}

/// A transmission key: the public key a note is encrypted to.
///
/// This is the "owner" and "sender" field type in note plaintexts.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct TransmissionKey(pub [u8; 32]);

impl fmt::Debug for TransmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("TransmissionKey")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for TransmissionKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<PublicKey> for TransmissionKey {
    fn from(public_key: PublicKey) -> Self {
        Self(public_key.to_bytes())
    }
}

impl From<TransmissionKey> for PublicKey {
    fn from(key: TransmissionKey) -> Self {
        PublicKey::from(key.0)
    }
}

/// The view-key bundle one account contributes to a decryption request.
///
/// Immutable once constructed; requests share these by value across worker
/// threads.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccountKeySet {
    /// Detects and decrypts notes addressed to the account.
    pub incoming_view_key: IncomingViewKey,
    /// Recovers notes the account sent.
    pub outgoing_view_key: OutgoingViewKey,
    /// Supplies the nullifier-deriving key for received notes.
    pub view_key: ViewKey,
}

impl AccountKeySet {
    /// Bundle an account's view keys for a request.
    pub fn new(
        incoming_view_key: IncomingViewKey,
        outgoing_view_key: OutgoingViewKey,
        view_key: ViewKey,
    ) -> Self {
        Self {
            incoming_view_key,
            outgoing_view_key,
            view_key,
        }
    }

    /// Generate a full set of fresh account keys.
    pub fn generate<T>(csprng: &mut T) -> Self
    where
        T: RngCore + CryptoRng,
    {
        Self {
            incoming_view_key: IncomingViewKey::new(csprng),
            outgoing_view_key: OutgoingViewKey::new(csprng),
            view_key: ViewKey::new(csprng),
        }
    }
}

impl SmeltSerialize for AccountKeySet {
    fn wire_size(&self) -> usize {
        ACCOUNT_KEY_SIZE + ACCOUNT_KEY_SIZE + VIEW_KEY_SIZE
    }

    fn smelt_serialize<W: std::io::Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        writer.write_32_bytes(&self.incoming_view_key.0)?;
        writer.write_32_bytes(&self.outgoing_view_key.0)?;
        writer.write_64_bytes(&self.view_key.to_bytes())
    }
}

impl SmeltDeserialize for AccountKeySet {
    fn smelt_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let incoming_view_key = IncomingViewKey::from(reader.read_32_bytes()?);
        let outgoing_view_key = OutgoingViewKey::from(reader.read_32_bytes()?);
        let view_key = ViewKey::from(reader.read_64_bytes()?);

        Ok(Self {
            incoming_view_key,
            outgoing_view_key,
            view_key,
        })
    }
}

impl TrustedPreallocate for AccountKeySet {
    fn max_allocation() -> u64 {
        // Each serialized key set takes 128 bytes of the message.
        (MAX_JOB_MESSAGE_LEN as u64) / 128
    }
}

/// Decode and length-check a fixed-size key from hex.
fn parse_key_bytes<const N: usize>(s: &str) -> Result<[u8; N], KeyError> {
    let bytes = hex::decode(s)?;
    check_key_length::<N>(&bytes)
}

/// Length-check a fixed-size key from a byte slice.
fn check_key_length<const N: usize>(bytes: &[u8]) -> Result<[u8; N], KeyError> {
    <[u8; N]>::try_from(bytes).map_err(|_| KeyError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}
