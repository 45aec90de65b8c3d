use thiserror::Error;

use crate::blockchain::{CompactError, Hash256};
use crate::config::ConfigError;
use crate::store::StoreError;

/// Why a single header was refused. Rejections never touch stored state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("parent {0} is unknown")]
    MissingParent(Hash256),
    #[error("invalid difficulty target: {0}")]
    InvalidTarget(#[from] CompactError),
    #[error("target is easier than the network limit")]
    TargetAboveLimit,
    #[error("hash {0} does not meet the claimed target")]
    BadProofOfWork(Hash256),
    #[error("difficulty transition not allowed: expected bits {expected:#010x}, got {actual:#010x}")]
    BadDifficultyTransition { expected: u32, actual: u32 },
    #[error("timestamp {time} is not after median time past {median}")]
    TimestampTooEarly { time: u32, median: u32 },
    #[error("timestamp {time} is too far ahead of local time {now}")]
    TimestampTooFarInFuture { time: u32, now: i64 },
    #[error("header {actual} at checkpoint height {height} should be {expected}")]
    CheckpointMismatch {
        height: u32,
        expected: Hash256,
        actual: Hash256,
    },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("header rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ChainError {
    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            ChainError::Rejected(reason) => Some(reason),
            ChainError::Store(_) | ChainError::Config(_) => None,
        }
    }
}
