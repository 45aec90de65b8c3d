use std::collections::VecDeque;

use log::debug;
use thiserror::Error;

use crate::blockchain::StoredHeader;
use crate::store::{HeaderStore, StoreError};

#[derive(Debug, Error)]
pub enum TallyError {
    /// The chain is shorter than the window; the tally keeps what it found
    /// and stays in the filling state.
    #[error("only {available} of {required} blocks of history available")]
    InsufficientHistory { available: usize, required: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sliding window over the versions of the most recent blocks on the best
/// chain, used to measure soft-fork signaling.
#[derive(Debug, Clone)]
pub struct VersionTally {
    window: usize,
    versions: VecDeque<u32>,
}

impl VersionTally {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            versions: VecDeque::with_capacity(window),
        }
    }

    /// Record the version of the next block on the chain, evicting the
    /// oldest once the window is full.
    pub fn add(&mut self, version: u32) {
        if self.versions.len() == self.window {
            self.versions.pop_front();
        }
        self.versions.push_back(version);
    }

    /// Number of blocks in the window with a version of at least `version`,
    /// or `None` until the window has filled.
    pub fn count_at_or_above(&self, version: u32) -> Option<usize> {
        if !self.is_full() {
            return None;
        }
        Some(self.versions.iter().filter(|&&v| v >= version).count())
    }

    pub fn is_full(&self) -> bool {
        self.versions.len() == self.window
    }

    /// The configured window length, regardless of how many samples are held.
    pub fn size(&self) -> usize {
        self.window
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }

    /// Reseed from `tip` and its ancestors. Any previous contents are
    /// discarded. With fewer than `size()` blocks on the chain the tally
    /// holds all of them and reports [`TallyError::InsufficientHistory`].
    pub fn initialize<S: HeaderStore + ?Sized>(
        &mut self,
        store: &S,
        tip: &StoredHeader,
    ) -> Result<(), TallyError> {
        let mut newest_first = Vec::with_capacity(self.window);
        let mut cursor = Some(tip.clone());
        while let Some(block) = cursor {
            newest_first.push(block.header.version);
            if newest_first.len() == self.window || block.height == 0 {
                break;
            }
            cursor = store.get_prev(&block)?;
        }

        self.clear();
        for version in newest_first.iter().rev() {
            self.add(*version);
        }

        if newest_first.len() < self.window {
            debug!(
                "version tally seeded with {} of {} blocks from {}",
                newest_first.len(),
                self.window,
                tip.hash()
            );
            return Err(TallyError::InsufficientHistory {
                available: newest_first.len(),
                required: self.window,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{ConsensusRules, NetworkParams};
    use crate::fixtures;
    use crate::store::MemoryHeaderStore;

    fn window() -> usize {
        NetworkParams::unit_test().majority_window
    }

    #[test]
    fn null_while_filling() {
        let mut tally = VersionTally::new(window());
        for _ in 0..window() {
            assert_eq!(tally.count_at_or_above(1), None);
            tally.add(1);
        }
        assert_eq!(tally.count_at_or_above(1), Some(window()));
    }

    #[test]
    fn size_matches_window() {
        let mut tally = VersionTally::new(window());
        assert_eq!(tally.size(), window());
        tally.add(4);
        assert_eq!(tally.size(), window());
    }

    #[test]
    fn version_counts() {
        let mut tally = VersionTally::new(window());

        for _ in 0..window() {
            tally.add(1);
        }
        assert_eq!(tally.count_at_or_above(1), Some(window()));
        assert_eq!(tally.count_at_or_above(2), Some(0));

        // replace with 2s one at a time
        for i in 0..window() {
            assert_eq!(tally.count_at_or_above(2), Some(i));
            tally.add(2);
        }
        assert_eq!(tally.count_at_or_above(2), Some(window()));

        // a rogue 1
        tally.add(1);
        assert_eq!(tally.count_at_or_above(2), Some(window() - 1));

        // higher versions count too
        tally.add(10);
        assert_eq!(tally.count_at_or_above(2), Some(window() - 1));
        assert_eq!(tally.count_at_or_above(10), Some(1));
    }

    #[test]
    fn initialize_from_full_history() {
        let params = NetworkParams::unit_test();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        let chain = fixtures::build_branch(&rules, &store, &genesis, window(), 2, 0);
        let tip = chain.last().unwrap();
        assert_eq!(tip.header.version, 2);

        let mut tally = VersionTally::new(window());
        tally.initialize(&store, tip).unwrap();
        assert_eq!(tally.count_at_or_above(2), Some(window()));
    }

    #[test]
    fn initialize_orders_oldest_first() {
        let params = NetworkParams::unit_test();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        let old = fixtures::build_branch(&rules, &store, &genesis, window(), 1, 0);
        let new = fixtures::build_branch(&rules, &store, old.last().unwrap(), 2, 3, 0);

        let mut tally = VersionTally::new(window());
        tally.initialize(&store, new.last().unwrap()).unwrap();
        assert_eq!(tally.count_at_or_above(3), Some(2));

        // the two oldest entries are evicted first
        tally.add(1);
        tally.add(1);
        assert_eq!(tally.count_at_or_above(3), Some(2));
        for _ in 0..window() - 4 {
            tally.add(1);
        }
        assert_eq!(tally.count_at_or_above(3), Some(2));
        tally.add(1);
        assert_eq!(tally.count_at_or_above(3), Some(1));
    }

    #[test]
    fn initialize_with_short_chain_stays_filling() {
        let params = NetworkParams::unit_test();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        let chain = fixtures::build_branch(&rules, &store, &genesis, 3, 2, 0);
        let mut tally = VersionTally::new(window());
        let err = tally.initialize(&store, chain.last().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            TallyError::InsufficientHistory { available: 4, required: 7 }
        ));
        assert_eq!(tally.count_at_or_above(1), None);

        // the seeded blocks still count once the window fills
        for _ in 0..window() - 4 {
            tally.add(2);
        }
        assert_eq!(tally.count_at_or_above(2), Some(window() - 1));
    }
}
