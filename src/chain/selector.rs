use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;

use super::error::{ChainError, RejectReason};
use super::listener::ChainListener;
use crate::blockchain::{BlockHeader, StoredHeader};
use crate::consensus::{ConsensusRules, NetworkParams, TallyError, VersionTally};
use crate::store::{HeaderStore, StoreError};

/// What accepting a valid header did to the best chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcceptOutcome {
    /// Already stored; nothing changed.
    Duplicate,
    /// Built directly on the head and became the new head.
    ExtendedHead { height: u32 },
    /// Stored on a branch with no more work than the head.
    SideBranch { height: u32 },
    /// Its branch overtook the head; `fork_height` is the common ancestor.
    Reorganized {
        fork_height: u32,
        disconnected: usize,
        connected: usize,
    },
}

/// The blocks a reorg moves across, gathered before anything is changed.
struct ForkPath {
    fork_height: u32,
    /// Old branch, newest first.
    disconnect: Vec<StoredHeader>,
    /// New branch, oldest first.
    connect: Vec<StoredHeader>,
}

/// Validates incoming headers and keeps the store's head on the branch with
/// the most cumulative work.
///
/// Validation and insertion may run concurrently for different headers.
/// Head selection, tally updates and listener notification are serialized
/// behind a writer lock; the head pointer and version tally change together
/// under `tally`'s write lock so readers never see one without the other.
pub struct ChainSelector<S: HeaderStore + ?Sized> {
    rules: ConsensusRules,
    store: Arc<S>,
    tally: RwLock<VersionTally>,
    writer: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn ChainListener>>>,
}

impl<S: HeaderStore + ?Sized> ChainSelector<S> {
    /// Resume from whatever head `store` holds. A chain shorter than the
    /// majority window leaves the tally filling. Unusable parameters are
    /// refused here rather than on the first header.
    pub fn new(params: NetworkParams, store: Arc<S>) -> Result<Self, ChainError> {
        params.validate()?;
        let rules = ConsensusRules::new(params);
        let head = store.chain_head()?;
        let tally = seeded_tally(&rules, store.as_ref(), &head)?;
        info!(
            "chain selector on {} starting at height {} ({})",
            rules.params().network,
            head.height,
            head.hash()
        );
        Ok(Self {
            rules,
            store,
            tally: RwLock::new(tally),
            writer: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
        })
    }

    pub fn rules(&self) -> &ConsensusRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn add_listener(&self, listener: Arc<dyn ChainListener>) {
        self.listeners
            .write()
            .expect("rwlock poisoned")
            .push(listener);
    }

    pub fn chain_head(&self) -> Result<StoredHeader, StoreError> {
        let _state = self.tally.read().expect("rwlock poisoned");
        self.store.chain_head()
    }

    pub fn best_height(&self) -> Result<u32, StoreError> {
        Ok(self.chain_head()?.height)
    }

    /// Best-chain header at `height`, if the chain is that long.
    pub fn header_at_height(&self, height: u32) -> Result<Option<StoredHeader>, StoreError> {
        let head = self.chain_head()?;
        self.store.ancestor(&head, height)
    }

    pub fn tally_count_at_or_above(&self, version: u32) -> Option<usize> {
        self.tally
            .read()
            .expect("rwlock poisoned")
            .count_at_or_above(version)
    }

    /// Snapshot of the version window for the current head.
    pub fn version_tally(&self) -> VersionTally {
        self.tally.read().expect("rwlock poisoned").clone()
    }

    /// Accept a header, judging future timestamps against the wall clock.
    pub fn accept_header(&self, header: BlockHeader) -> Result<AcceptOutcome, ChainError> {
        self.accept_header_at(header, Utc::now().timestamp())
    }

    /// Accept a header, judging future timestamps against `now` (Unix seconds).
    pub fn accept_header_at(&self, header: BlockHeader, now: i64) -> Result<AcceptOutcome, ChainError> {
        let hash = header.hash();
        if self.store.contains(&hash)? {
            debug!("header {hash} already stored");
            return Ok(AcceptOutcome::Duplicate);
        }

        let stored = match self.validate(&header, now) {
            Ok(stored) => stored,
            Err(e) => {
                debug!("rejected header {hash}: {e}");
                return Err(e);
            }
        };
        self.store.put(stored.clone())?;

        self.select_best_chain(stored)
    }

    /// Every pre-insertion check. Nothing is written here.
    fn validate(&self, header: &BlockHeader, now: i64) -> Result<StoredHeader, ChainError> {
        let params = self.rules.params();
        let parent = self
            .store
            .get(&header.prev_hash)?
            .ok_or(RejectReason::MissingParent(header.prev_hash))?;
        let height = parent.height + 1;
        let hash = header.hash();

        if let Some(expected) = params.checkpoint(height) {
            if *expected != hash {
                return Err(RejectReason::CheckpointMismatch {
                    height,
                    expected: *expected,
                    actual: hash,
                }
                .into());
            }
        }

        let target = header.target().map_err(RejectReason::from)?;
        if target > params.pow_limit() {
            return Err(RejectReason::TargetAboveLimit.into());
        }
        if hash.to_u256() > target {
            return Err(RejectReason::BadProofOfWork(hash).into());
        }

        let expected = self
            .rules
            .required_bits(self.store.as_ref(), &parent, header.time)?;
        if header.bits != expected {
            return Err(RejectReason::BadDifficultyTransition {
                expected,
                actual: header.bits,
            }
            .into());
        }

        let median = self.rules.median_time_past(self.store.as_ref(), &parent)?;
        if header.time <= median {
            return Err(RejectReason::TimestampTooEarly {
                time: header.time,
                median,
            }
            .into());
        }
        if i64::from(header.time) > now + i64::from(params.max_future_drift_secs) {
            return Err(RejectReason::TimestampTooFarInFuture {
                time: header.time,
                now,
            }
            .into());
        }

        parent.build_next(*header).map_err(|e| RejectReason::from(e).into())
    }

    /// Compare a freshly stored header against the head and move the head
    /// if it carries more work. Ties keep the head that was seen first.
    fn select_best_chain(&self, stored: StoredHeader) -> Result<AcceptOutcome, ChainError> {
        let _writer = self.writer.lock().expect("mutex poisoned");
        let head = self.store.chain_head()?;

        if !stored.more_work_than(&head) {
            // a racing submission of the same header, or of a descendant,
            // may already have put it on the best chain
            let on_best_chain = self
                .store
                .ancestor(&head, stored.height)?
                .is_some_and(|ancestor| ancestor.hash() == stored.hash());
            if on_best_chain {
                debug!("header {} already on the best chain", stored.hash());
                return Ok(AcceptOutcome::Duplicate);
            }
            debug!(
                "header {} at height {} stored on a side branch",
                stored.hash(),
                stored.height
            );
            return Ok(AcceptOutcome::SideBranch {
                height: stored.height,
            });
        }

        if stored.prev_hash() != head.hash() {
            return self.reorganize(head, stored);
        }

        {
            let mut tally = self.tally.write().expect("rwlock poisoned");
            self.store.set_chain_head(&stored)?;
            tally.add(stored.header.version);
        }
        debug!("new head {} at height {}", stored.hash(), stored.height);
        let listeners = self.listener_snapshot();
        for listener in &listeners {
            listener.on_block_connected(&stored);
        }
        Ok(AcceptOutcome::ExtendedHead {
            height: stored.height,
        })
    }

    /// Switch to the branch ending at `new_head`. All reads happen first, so
    /// a store fault leaves the old head, the old tally and no notifications.
    fn reorganize(&self, old_head: StoredHeader, new_head: StoredHeader) -> Result<AcceptOutcome, ChainError> {
        let path = self.find_fork(&old_head, &new_head)?;
        info!(
            "reorganizing at height {}: {} blocks out (head {}), {} blocks in (head {})",
            path.fork_height,
            path.disconnect.len(),
            old_head.hash(),
            path.connect.len(),
            new_head.hash()
        );

        let rebuilt = seeded_tally(&self.rules, self.store.as_ref(), &new_head)?;
        {
            let mut tally = self.tally.write().expect("rwlock poisoned");
            self.store.set_chain_head(&new_head)?;
            *tally = rebuilt;
        }

        let listeners = self.listener_snapshot();
        for header in &path.disconnect {
            for listener in &listeners {
                listener.on_block_disconnected(header);
            }
        }
        for header in &path.connect {
            for listener in &listeners {
                listener.on_block_connected(header);
            }
        }

        Ok(AcceptOutcome::Reorganized {
            fork_height: path.fork_height,
            disconnected: path.disconnect.len(),
            connected: path.connect.len(),
        })
    }

    /// Walk both tips back to equal height, then in lockstep until they meet.
    fn find_fork(&self, old_head: &StoredHeader, new_head: &StoredHeader) -> Result<ForkPath, StoreError> {
        let mut old = old_head.clone();
        let mut new = new_head.clone();
        let mut disconnect = Vec::new();
        let mut connect = Vec::new();

        while old.height > new.height {
            let parent = self.parent_on_fork(&old)?;
            disconnect.push(std::mem::replace(&mut old, parent));
        }
        while new.height > old.height {
            let parent = self.parent_on_fork(&new)?;
            connect.push(std::mem::replace(&mut new, parent));
        }
        while old.hash() != new.hash() {
            let old_parent = self.parent_on_fork(&old)?;
            let new_parent = self.parent_on_fork(&new)?;
            disconnect.push(std::mem::replace(&mut old, old_parent));
            connect.push(std::mem::replace(&mut new, new_parent));
        }
        connect.reverse();

        Ok(ForkPath {
            fork_height: old.height,
            disconnect,
            connect,
        })
    }

    fn parent_on_fork(&self, header: &StoredHeader) -> Result<StoredHeader, StoreError> {
        self.store.get_prev(header)?.ok_or_else(|| {
            StoreError::Corrupt(format!(
                "branches through {} share no ancestor",
                header.hash()
            ))
        })
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn ChainListener>> {
        self.listeners.read().expect("rwlock poisoned").clone()
    }
}

/// A tally for `head`, tolerating a chain shorter than the window.
fn seeded_tally<S: HeaderStore + ?Sized>(
    rules: &ConsensusRules,
    store: &S,
    head: &StoredHeader,
) -> Result<VersionTally, StoreError> {
    let mut tally = VersionTally::new(rules.majority_window());
    match tally.initialize(store, head) {
        Ok(()) | Err(TallyError::InsufficientHistory { .. }) => Ok(tally),
        Err(TallyError::Store(e)) => Err(e),
    }
}
