use serde::{Deserialize, Serialize};

use super::header::{BlockHeader, Hash256};
use super::work::{CompactError, U512, work_for_bits};

/// A header as committed to a [`HeaderStore`](crate::store::HeaderStore):
/// its height and the total work from genesis up to and including it.
/// Both are derived from the parent once, at insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    pub header: BlockHeader,
    pub height: u32,
    pub chain_work: U512,
}

impl StoredHeader {
    pub fn genesis(header: BlockHeader) -> Result<Self, CompactError> {
        Ok(Self {
            chain_work: work_for_bits(header.bits)?,
            header,
            height: 0,
        })
    }

    /// Build the record for `header` as a child of `self`.
    pub fn build_next(&self, header: BlockHeader) -> Result<Self, CompactError> {
        let work = work_for_bits(header.bits)?;
        Ok(Self {
            header,
            height: self.height + 1,
            chain_work: self.chain_work.saturating_add(work),
        })
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn prev_hash(&self) -> Hash256 {
        self.header.prev_hash
    }

    pub fn more_work_than(&self, other: &StoredHeader) -> bool {
        self.chain_work > other.chain_work
    }
}
