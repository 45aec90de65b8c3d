use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::blockchain::{BlockHeader, Hash256, U256, decode_compact, encode_compact};
use crate::config::ConfigError;

/// Satoshis per coin.
pub const COIN: u64 = 100_000_000;

/// Genesis merkle root shared by every preset (internal byte order).
const GENESIS_MERKLE_ROOT: Hash256 = Hash256([
    0x3b, 0xa3, 0xed, 0xfd, 0x7a, 0x7b, 0x12, 0xb2, 0x7a, 0xc7, 0x2c, 0x3e, 0x67, 0x76, 0x8f, 0x61,
    0x7f, 0xc8, 0x1b, 0xc3, 0x88, 0x8a, 0x51, 0x32, 0x3a, 0x9f, 0xb8, 0xaa, 0x4b, 0x1e, 0x5e, 0x4a,
]);

const MAIN_CHECKPOINT_11111: Hash256 = Hash256([
    0x1d, 0x7c, 0x6e, 0xb2, 0xfd, 0x42, 0xf5, 0x59, 0x25, 0xe9, 0x2e, 0xfa, 0xd6, 0x8b, 0x61, 0xed,
    0xd2, 0x2f, 0xba, 0x29, 0xfd, 0xe8, 0x78, 0x3d, 0xf7, 0x44, 0xe2, 0x69, 0x00, 0x00, 0x00, 0x00,
]);

const MAIN_CHECKPOINT_33333: Hash256 = Hash256([
    0xa6, 0xd0, 0xb5, 0xdf, 0x7d, 0x0d, 0xf0, 0x69, 0xce, 0xb1, 0xe7, 0x36, 0xa2, 0x16, 0xad, 0x18,
    0x7a, 0x50, 0xb0, 0x7a, 0xaa, 0x4e, 0x78, 0x74, 0x8a, 0x58, 0xd5, 0x2d, 0x00, 0x00, 0x00, 0x00,
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
    Regtest,
    UnitTest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
            Network::UnitTest => "unittest",
        })
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            "regtest" => Ok(Network::Regtest),
            "unittest" => Ok(Network::UnitTest),
            _ => Err(ConfigError::UnknownNetwork(s.to_string())),
        }
    }
}

/// Relaxation letting test networks mine at minimum difficulty when blocks
/// stop arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MinDifficultyPolicy {
    Disabled,
    /// A block more than `max_gap_secs` after its parent may (and must)
    /// carry the pow-limit target. Other blocks inherit the target of the
    /// last block that was not mined at minimum difficulty.
    AllowAfterGap { max_gap_secs: u32 },
}

/// Per-network consensus constants. Loaded once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network: Network,
    /// Blocks between difficulty retargets.
    pub interval: u32,
    /// Seconds one retarget interval is expected to take.
    pub target_timespan: u32,
    pub target_spacing: u32,
    /// Easiest allowed target, in compact form.
    pub pow_limit_bits: u32,
    pub pow_no_retargeting: bool,
    pub min_difficulty: MinDifficultyPolicy,
    pub subsidy_halving_interval: u32,
    pub base_subsidy: u64,
    pub majority_window: usize,
    pub majority_enforce_threshold: usize,
    pub majority_reject_threshold: usize,
    /// Number of ancestors whose median time a new header must exceed.
    pub median_time_span: usize,
    pub max_future_drift_secs: u32,
    pub genesis: BlockHeader,
    pub checkpoints: BTreeMap<u32, Hash256>,
}

impl NetworkParams {
    pub fn main() -> Self {
        Self {
            network: Network::Main,
            interval: 2016,
            target_timespan: 14 * 24 * 60 * 60,
            target_spacing: 10 * 60,
            pow_limit_bits: 0x1d00ffff,
            pow_no_retargeting: false,
            min_difficulty: MinDifficultyPolicy::Disabled,
            subsidy_halving_interval: 210_000,
            base_subsidy: 50 * COIN,
            majority_window: 1000,
            majority_enforce_threshold: 750,
            majority_reject_threshold: 950,
            median_time_span: 11,
            max_future_drift_secs: 2 * 60 * 60,
            genesis: BlockHeader {
                version: 1,
                prev_hash: Hash256::ZERO,
                merkle_root: GENESIS_MERKLE_ROOT,
                time: 1_231_006_505,
                bits: 0x1d00ffff,
                nonce: 2_083_236_893,
            },
            checkpoints: BTreeMap::from([
                (11_111, MAIN_CHECKPOINT_11111),
                (33_333, MAIN_CHECKPOINT_33333),
            ]),
        }
    }

    pub fn testnet() -> Self {
        let main = Self::main();
        Self {
            network: Network::Test,
            min_difficulty: MinDifficultyPolicy::AllowAfterGap {
                max_gap_secs: main.target_spacing * 2,
            },
            majority_window: 100,
            majority_enforce_threshold: 51,
            majority_reject_threshold: 75,
            genesis: BlockHeader {
                time: 1_296_688_602,
                nonce: 414_098_458,
                ..main.genesis
            },
            checkpoints: BTreeMap::new(),
            ..main
        }
    }

    pub fn regtest() -> Self {
        let main = Self::main();
        Self {
            network: Network::Regtest,
            pow_limit_bits: 0x207fffff,
            pow_no_retargeting: true,
            min_difficulty: MinDifficultyPolicy::AllowAfterGap {
                max_gap_secs: main.target_spacing * 2,
            },
            subsidy_halving_interval: 150,
            genesis: BlockHeader {
                time: 1_296_688_602,
                bits: 0x207fffff,
                nonce: 2,
                ..main.genesis
            },
            checkpoints: BTreeMap::new(),
            ..main
        }
    }

    /// Tiny windows and the easiest target, for tests that mine headers.
    pub fn unit_test() -> Self {
        let main = Self::main();
        Self {
            network: Network::UnitTest,
            interval: 10,
            target_timespan: 10 * 60,
            target_spacing: 60,
            pow_limit_bits: 0x207fffff,
            majority_window: 7,
            majority_enforce_threshold: 3,
            majority_reject_threshold: 4,
            genesis: BlockHeader {
                bits: 0x207fffff,
                nonce: 2,
                ..main.genesis
            },
            checkpoints: BTreeMap::new(),
            ..main
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self::main(),
            Network::Test => Self::testnet(),
            Network::Regtest => Self::regtest(),
            Network::UnitTest => Self::unit_test(),
        }
    }

    /// Easiest allowed target as a full integer.
    pub fn pow_limit(&self) -> U256 {
        // validate() guarantees pow_limit_bits decodes
        decode_compact(self.pow_limit_bits).unwrap_or_default()
    }

    pub fn checkpoint(&self, height: u32) -> Option<&Hash256> {
        self.checkpoints.get(&height)
    }

    /// Reject constants no chain could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval < 2 {
            return Err(ConfigError::InvalidParams("retarget interval must be at least 2"));
        }
        if self.target_timespan == 0 || self.target_spacing == 0 {
            return Err(ConfigError::InvalidParams("target timespan and spacing must be positive"));
        }
        if self.subsidy_halving_interval == 0 {
            return Err(ConfigError::InvalidParams("halving interval must be positive"));
        }
        if self.majority_window == 0 {
            return Err(ConfigError::InvalidParams("majority window must be positive"));
        }
        if self.majority_reject_threshold > self.majority_window
            || self.majority_enforce_threshold > self.majority_reject_threshold
        {
            return Err(ConfigError::InvalidParams(
                "majority thresholds must satisfy enforce <= reject <= window",
            ));
        }
        if self.median_time_span == 0 {
            return Err(ConfigError::InvalidParams("median time span must be positive"));
        }
        let pow_limit = decode_compact(self.pow_limit_bits)
            .map_err(|_| ConfigError::InvalidParams("pow limit is not a valid compact target"))?;
        if encode_compact(pow_limit) != self.pow_limit_bits {
            return Err(ConfigError::InvalidParams("pow limit is not in canonical compact form"));
        }
        let genesis_target = self
            .genesis
            .target()
            .map_err(|_| ConfigError::InvalidParams("genesis target is not a valid compact target"))?;
        if genesis_target > pow_limit {
            return Err(ConfigError::InvalidParams("genesis target is easier than the pow limit"));
        }
        Ok(())
    }
}
