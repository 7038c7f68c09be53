//! Consensus parameters and upgrade activation rules.
//!
//! Parameters deserialize from network definition files, where an
//! activation point is either a block sequence or the string `"never"`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{block::Height, serialization::SerializationError};

/// The block sequence at which an upgrade takes effect, if ever.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActivationHeight {
    /// Active from this block sequence onwards.
    At(Height),
    /// Never activates.
    Never,
}

impl Serialize for ActivationHeight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActivationHeight::At(height) => serializer.serialize_u32(height.0),
            ActivationHeight::Never => serializer.serialize_str("never"),
        }
    }
}

impl<'de> Deserialize<'de> for ActivationHeight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Sequence(u32),
            Keyword(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Sequence(sequence) => Ok(ActivationHeight::At(Height(sequence))),
            Repr::Keyword(word) if word == "never" => Ok(ActivationHeight::Never),
            Repr::Keyword(word) => Err(de::Error::custom(format!(
                "invalid activation height {word:?}: expected a block sequence or \"never\""
            ))),
        }
    }
}

/// The consensus parameters of a network, as shipped in its definition file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConsensusParameters {
    /// How many seconds into the future a new block's timestamp may be.
    pub allowed_block_future_seconds: u64,
    /// The coin supply created by the genesis block.
    pub genesis_supply: u64,
    /// The block time the difficulty adjustment aims for.
    pub target_block_time_in_seconds: u64,
    /// The time range within which difficulty and target do not change.
    pub target_bucket_time_in_seconds: u64,
    /// The maximum serialized block size.
    pub max_block_size_bytes: u64,
    /// The minimum fee a transaction must pay to be accepted.
    pub min_fee: u64,
    /// Activation of version 2 transactions with asset ownership.
    pub enable_asset_ownership: ActivationHeight,
    /// Activation of strictly increasing block timestamps.
    pub enforce_sequential_block_time: ActivationHeight,
}

/// The serialization version of a transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum TransactionVersion {
    /// The original transaction format.
    V1 = 1,
    /// Adds asset ownership transfers.
    V2 = 2,
}

impl From<TransactionVersion> for u8 {
    fn from(version: TransactionVersion) -> Self {
        version as u8
    }
}

impl TryFrom<u8> for TransactionVersion {
    type Error = SerializationError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(TransactionVersion::V1),
            2 => Ok(TransactionVersion::V2),
            _ => Err(SerializationError::Parse("unknown transaction version")),
        }
    }
}

/// Evaluates upgrade activation against a set of consensus parameters.
#[derive(Clone, Debug)]
pub struct Consensus {
    /// The network's parameters.
    pub parameters: ConsensusParameters,
}

impl Consensus {
    /// Build a `Consensus` for `parameters`.
    pub fn new(parameters: ConsensusParameters) -> Self {
        Self { parameters }
    }

    /// Is `upgrade` active at block `sequence`?
    ///
    /// The genesis block activates every upgrade with an activation point
    /// of 1 or below, so sequences are clamped up to 1 first.
    pub fn is_active(&self, upgrade: ActivationHeight, sequence: Height) -> bool {
        match upgrade {
            ActivationHeight::Never => false,
            ActivationHeight::At(height) => sequence.0.max(1) >= height.0,
        }
    }

    /// Is `upgrade` disabled on this network altogether?
    pub fn is_never_active(&self, upgrade: ActivationHeight) -> bool {
        upgrade == ActivationHeight::Never
    }

    /// The transaction version new transactions must use at `sequence`.
    pub fn active_transaction_version(&self, sequence: Height) -> TransactionVersion {
        if self.is_active(self.parameters.enable_asset_ownership, sequence) {
            TransactionVersion::V2
        } else {
            TransactionVersion::V1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testnet_parameters() -> ConsensusParameters {
        ConsensusParameters {
            allowed_block_future_seconds: 15,
            genesis_supply: 42_000_000,
            target_block_time_in_seconds: 60,
            target_bucket_time_in_seconds: 10,
            max_block_size_bytes: 524_288,
            min_fee: 1,
            enable_asset_ownership: ActivationHeight::At(Height(9)),
            enforce_sequential_block_time: ActivationHeight::Never,
        }
    }

    #[test]
    fn activation_respects_the_threshold() {
        let consensus = Consensus::new(testnet_parameters());
        let upgrade = consensus.parameters.enable_asset_ownership;

        assert!(!consensus.is_active(upgrade, Height(8)));
        assert!(consensus.is_active(upgrade, Height(9)));
        assert!(consensus.is_active(upgrade, Height(10)));
    }

    #[test]
    fn never_is_never_active() {
        let consensus = Consensus::new(testnet_parameters());
        let upgrade = consensus.parameters.enforce_sequential_block_time;

        assert!(!consensus.is_active(upgrade, Height(u32::MAX)));
        assert!(consensus.is_never_active(upgrade));
        assert!(!consensus.is_never_active(ActivationHeight::At(Height(1))));
    }

    #[test]
    fn sequence_zero_is_treated_as_genesis() {
        let consensus = Consensus::new(testnet_parameters());

        assert!(consensus.is_active(ActivationHeight::At(Height(1)), Height(0)));
        assert!(!consensus.is_active(ActivationHeight::At(Height(2)), Height(0)));
    }

    #[test]
    fn transaction_version_switches_at_activation() {
        let consensus = Consensus::new(testnet_parameters());

        assert_eq!(
            consensus.active_transaction_version(Height(8)),
            TransactionVersion::V1
        );
        assert_eq!(
            consensus.active_transaction_version(Height(9)),
            TransactionVersion::V2
        );
    }

    #[test]
    fn activation_height_deserializes_from_json() {
        let at: ActivationHeight = serde_json::from_str("9").expect("number should parse");
        assert_eq!(at, ActivationHeight::At(Height(9)));

        let never: ActivationHeight =
            serde_json::from_str("\"never\"").expect("keyword should parse");
        assert_eq!(never, ActivationHeight::Never);

        let bad: Result<ActivationHeight, _> = serde_json::from_str("\"someday\"");
        assert!(bad.is_err());
    }

    #[test]
    fn parameters_deserialize_from_a_network_definition() {
        let definition = r#"{
            "allowedBlockFutureSeconds": 15,
            "genesisSupply": 42000000,
            "targetBlockTimeInSeconds": 60,
            "targetBucketTimeInSeconds": 10,
            "maxBlockSizeBytes": 524288,
            "minFee": 1,
            "enableAssetOwnership": 9,
            "enforceSequentialBlockTime": "never"
        }"#;

        let parameters: ConsensusParameters =
            serde_json::from_str(definition).expect("definition should parse");
        assert_eq!(parameters, testnet_parameters());
    }

    #[test]
    fn transaction_version_bytes_round_trip() {
        for version in [TransactionVersion::V1, TransactionVersion::V2] {
            let byte: u8 = version.into();
            assert_eq!(TransactionVersion::try_from(byte).unwrap(), version);
        }
        assert!(TransactionVersion::try_from(3).is_err());
    }
}
