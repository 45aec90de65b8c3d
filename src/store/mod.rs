pub mod file;
pub mod memory;

pub use file::FileHeaderStore;
pub use memory::MemoryHeaderStore;

use thiserror::Error;

use crate::blockchain::{Hash256, StoredHeader};

/// Faults raised by a storage backend. Fatal to the operation in progress,
/// never to already-committed headers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("store record could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store is corrupt: {0}")]
    Corrupt(String),
    #[error("cannot make {0} the chain head: it was never stored")]
    UnknownHead(Hash256),
}

/// Hash-indexed header storage plus the single chain-head pointer.
///
/// Implementations take `&self` and synchronize internally so that many
/// readers can walk ancestors while one writer extends the chain.
pub trait HeaderStore: Send + Sync {
    fn get(&self, hash: &Hash256) -> Result<Option<StoredHeader>, StoreError>;

    /// Insert a header. Storing a hash that is already present is a no-op.
    fn put(&self, header: StoredHeader) -> Result<(), StoreError>;

    fn chain_head(&self) -> Result<StoredHeader, StoreError>;

    /// Move the head pointer. The header must already have been `put`.
    fn set_chain_head(&self, head: &StoredHeader) -> Result<(), StoreError>;

    fn contains(&self, hash: &Hash256) -> Result<bool, StoreError> {
        Ok(self.get(hash)?.is_some())
    }

    /// The parent of `header`, or `None` for genesis.
    fn get_prev(&self, header: &StoredHeader) -> Result<Option<StoredHeader>, StoreError> {
        if header.height == 0 {
            return Ok(None);
        }
        match self.get(&header.prev_hash())? {
            Some(parent) => Ok(Some(parent)),
            None => Err(StoreError::Corrupt(format!(
                "header {} at height {} has no stored parent",
                header.hash(),
                header.height
            ))),
        }
    }

    /// Walk back from `from` to its ancestor at `height`.
    fn ancestor(&self, from: &StoredHeader, height: u32) -> Result<Option<StoredHeader>, StoreError> {
        if height > from.height {
            return Ok(None);
        }
        let mut cursor = from.clone();
        while cursor.height > height {
            match self.get_prev(&cursor)? {
                Some(parent) => cursor = parent,
                None => return Ok(None),
            }
        }
        Ok(Some(cursor))
    }
}
