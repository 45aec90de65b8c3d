pub mod error;
pub mod listener;
pub mod selector;

pub use error::{ChainError, RejectReason};
pub use listener::{ChainEvent, ChainListener};
pub use selector::{AcceptOutcome, ChainSelector};
