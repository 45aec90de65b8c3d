//! Header-chain engine for a proof-of-work network: validates block headers
//! against the consensus rules, stores them with their cumulative work and
//! follows the heaviest branch, reorganizing when a side branch overtakes it.

pub mod blockchain;
pub mod chain;
pub mod config;
pub mod consensus;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use blockchain::{BlockHeader, Hash256, StoredHeader};
pub use chain::{AcceptOutcome, ChainError, ChainEvent, ChainListener, ChainSelector, RejectReason};
pub use consensus::{ConsensusRules, Network, NetworkParams, VersionTally};
pub use store::{FileHeaderStore, HeaderStore, MemoryHeaderStore, StoreError};
