//! Block heights, block hashes, and raw header hashing.

use std::{fmt, io};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::serialization::{
    wire_value::{self, WireValue},
    ReadSmeltExt, SerializationError, SmeltDeserialize, SmeltSerialize,
};

#[cfg(test)]
use proptest_derive::Arbitrary;

/// The height of a block is the length of the chain back to the genesis
/// block.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct Height(pub u32);

/// The hash of a block header, used to identify the whole block.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct BlockHash(pub [u8; 32]);

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("BlockHash")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl SmeltSerialize for BlockHash {
    fn wire_size(&self) -> usize {
        32
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl SmeltDeserialize for BlockHash {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(BlockHash(reader.read_32_bytes()?))
    }
}

impl std::str::FromStr for BlockHash {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            Err(SerializationError::Parse("hex decoding error"))
        } else {
            Ok(BlockHash(bytes))
        }
    }
}

/// The exact length of the header hash preimage, in bytes.
pub const HEADER_PREIMAGE_SIZE: usize = 8 + 4 + 32 + 32 + 32 + 32 + 8 + 32;

/// The header fields that commit to a block, before any hash is attached.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawBlockHeader {
    /// The mining nonce.
    pub randomness: u64,
    /// The block's position in the chain.
    pub sequence: Height,
    /// The hash of the previous block's header.
    pub previous_block_hash: BlockHash,
    /// The root of the note commitment tree after this block.
    pub note_commitment_root: [u8; 32],
    /// A commitment to the block's transactions.
    pub transaction_commitment: [u8; 32],
    /// The difficulty target the header hash must fall under.
    pub target: U256,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Arbitrary miner-chosen bytes.
    pub graffiti: [u8; 32],
}

impl RawBlockHeader {
    /// Hash this header's canonical 180-byte encoding.
    pub fn hash(&self) -> BlockHash {
        let preimage = wire_value::serialize(&WireValue::List(vec![
            WireValue::U64(self.randomness),
            WireValue::U32(self.sequence.0),
            WireValue::Hash(self.previous_block_hash.0),
            WireValue::Hash(self.note_commitment_root),
            WireValue::Hash(self.transaction_commitment),
            WireValue::big_int_le(self.target, 32),
            WireValue::U64(self.timestamp_ms),
            WireValue::Hash(self.graffiti),
        ]));
        debug_assert_eq!(preimage.len(), HEADER_PREIMAGE_SIZE);

        let hash = blake2b_simd::Params::new()
            .hash_length(32)
            .personal(b"Smelt_BlockHash")
            .to_state()
            .update(&preimage)
            .finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(hash.as_bytes());
        BlockHash(bytes)
    }
}
