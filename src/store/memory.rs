use std::collections::HashMap;
use std::sync::RwLock;

use super::{HeaderStore, StoreError};
use crate::blockchain::{Hash256, StoredHeader};
use crate::consensus::NetworkParams;

/// Volatile store over a HashMap. Never fails on I/O.
#[derive(Debug)]
pub struct MemoryHeaderStore {
    headers: RwLock<HashMap<Hash256, StoredHeader>>,
    head: RwLock<Hash256>,
}

impl MemoryHeaderStore {
    /// A store holding only the network's genesis header, which is the head.
    pub fn new(params: &NetworkParams) -> Result<Self, StoreError> {
        let genesis = StoredHeader::genesis(params.genesis)
            .map_err(|e| StoreError::Corrupt(format!("genesis header: {e}")))?;
        let hash = genesis.hash();
        Ok(Self {
            headers: RwLock::new(HashMap::from([(hash, genesis)])),
            head: RwLock::new(hash),
        })
    }

    pub fn len(&self) -> usize {
        self.headers.read().expect("rwlock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HeaderStore for MemoryHeaderStore {
    fn get(&self, hash: &Hash256) -> Result<Option<StoredHeader>, StoreError> {
        Ok(self.headers.read().expect("rwlock poisoned").get(hash).cloned())
    }

    fn put(&self, header: StoredHeader) -> Result<(), StoreError> {
        let mut headers = self.headers.write().expect("rwlock poisoned");
        headers.entry(header.hash()).or_insert(header);
        Ok(())
    }

    fn chain_head(&self) -> Result<StoredHeader, StoreError> {
        let head = *self.head.read().expect("rwlock poisoned");
        self.get(&head)?
            .ok_or_else(|| StoreError::Corrupt(format!("head {head} missing from store")))
    }

    fn set_chain_head(&self, head: &StoredHeader) -> Result<(), StoreError> {
        let hash = head.hash();
        if !self.contains(&hash)? {
            return Err(StoreError::UnknownHead(hash));
        }
        *self.head.write().expect("rwlock poisoned") = hash;
        Ok(())
    }
}
