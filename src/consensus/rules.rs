use crate::blockchain::{StoredHeader, U256, U512, decode_compact, encode_compact};
use crate::store::{HeaderStore, StoreError};

use super::params::{MinDifficultyPolicy, NetworkParams};
use super::tally::VersionTally;

/// Network-parameterized consensus decisions. Everything here is a pure
/// function of the parameters, except the helpers that need to read
/// ancestors out of a [`HeaderStore`].
#[derive(Debug, Clone)]
pub struct ConsensusRules {
    params: NetworkParams,
}

impl ConsensusRules {
    pub fn new(params: NetworkParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// True for the last block of a retarget interval; its child is the
    /// first block mined at the recomputed difficulty.
    pub fn is_difficulty_transition_point(&self, height: u32) -> bool {
        height != 0 && (u64::from(height) + 1) % u64::from(self.params.interval) == 0
    }

    pub fn is_reward_halving_point(&self, height: u32) -> bool {
        (u64::from(height) + 1) % u64::from(self.params.subsidy_halving_interval) == 0
    }

    /// New coins created by the block at `height`, in satoshis.
    pub fn block_inflation(&self, height: u32) -> u64 {
        let halvings = height / self.params.subsidy_halving_interval;
        if halvings >= u64::BITS {
            return 0;
        }
        self.params.base_subsidy >> halvings
    }

    pub fn majority_window(&self) -> usize {
        self.params.majority_window
    }

    pub fn majority_enforce_threshold(&self) -> usize {
        self.params.majority_enforce_threshold
    }

    pub fn majority_reject_threshold(&self) -> usize {
        self.params.majority_reject_threshold
    }

    /// Whether enough of the window signals a version above `version` that
    /// blocks at `version` should be considered out of date.
    pub fn is_version_outdated(&self, tally: &VersionTally, version: u32) -> bool {
        let Some(next) = version.checked_add(1) else {
            return false;
        };
        tally
            .count_at_or_above(next)
            .is_some_and(|count| count >= self.params.majority_reject_threshold)
    }

    /// Whether the rules introduced with `version` have reached the enforce
    /// threshold within the window.
    pub fn is_version_enforced(&self, tally: &VersionTally, version: u32) -> bool {
        tally
            .count_at_or_above(version)
            .is_some_and(|count| count >= self.params.majority_enforce_threshold)
    }

    /// Scale `prev_target` by how long the last interval actually took.
    /// The timespan is clamped to a factor of four in either direction and
    /// the result never exceeds the pow limit.
    pub fn retarget(&self, prev_target: U256, first_time: u32, last_time: u32) -> U256 {
        let expected = i64::from(self.params.target_timespan);
        let actual = (i64::from(last_time) - i64::from(first_time)).clamp(expected / 4, expected * 4);

        // actual is positive after the clamp
        let scaled = U512::from(prev_target) * U512::from(actual as u64) / U512::from(expected as u64);
        let pow_limit = self.params.pow_limit();
        if scaled > U512::from(pow_limit) {
            return pow_limit;
        }
        let mut words = [0u64; 4];
        words.copy_from_slice(&scaled.0[..4]);
        U256(words)
    }

    /// The compact target a child of `parent` mined at `child_time` must carry.
    pub fn required_bits<S: HeaderStore + ?Sized>(
        &self,
        store: &S,
        parent: &StoredHeader,
        child_time: u32,
    ) -> Result<u32, StoreError> {
        if !self.is_difficulty_transition_point(parent.height) {
            if let MinDifficultyPolicy::AllowAfterGap { max_gap_secs } = self.params.min_difficulty {
                return self.min_difficulty_bits(store, parent, child_time, max_gap_secs);
            }
            return Ok(parent.header.bits);
        }

        if self.params.pow_no_retargeting {
            return Ok(parent.header.bits);
        }

        let first_height = parent.height + 1 - self.params.interval;
        let first = store.ancestor(parent, first_height)?.ok_or_else(|| {
            StoreError::Corrupt(format!(
                "missing ancestor at height {first_height} of {}",
                parent.hash()
            ))
        })?;

        let prev_target = decode_compact(parent.header.bits).map_err(|e| {
            StoreError::Corrupt(format!("stored header {} has invalid bits: {e}", parent.hash()))
        })?;
        let next = self.retarget(prev_target, first.header.time, parent.header.time);
        Ok(encode_compact(next))
    }

    fn min_difficulty_bits<S: HeaderStore + ?Sized>(
        &self,
        store: &S,
        parent: &StoredHeader,
        child_time: u32,
        max_gap_secs: u32,
    ) -> Result<u32, StoreError> {
        if u64::from(child_time) > u64::from(parent.header.time) + u64::from(max_gap_secs) {
            return Ok(self.params.pow_limit_bits);
        }

        let mut cursor = parent.clone();
        while cursor.height != 0
            && cursor.height % self.params.interval != 0
            && cursor.header.bits == self.params.pow_limit_bits
        {
            cursor = store.get_prev(&cursor)?.ok_or_else(|| {
                StoreError::Corrupt(format!("missing parent of {}", cursor.hash()))
            })?;
        }
        Ok(cursor.header.bits)
    }

    /// Median timestamp of `tip` and up to `median_time_span - 1` ancestors.
    pub fn median_time_past<S: HeaderStore + ?Sized>(
        &self,
        store: &S,
        tip: &StoredHeader,
    ) -> Result<u32, StoreError> {
        let mut times = Vec::with_capacity(self.params.median_time_span);
        let mut cursor = Some(tip.clone());
        while let Some(block) = cursor {
            times.push(block.header.time);
            if times.len() == self.params.median_time_span || block.height == 0 {
                break;
            }
            cursor = store.get_prev(&block)?;
        }
        times.sort_unstable();
        Ok(times[times.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockHeader, Hash256};
    use crate::fixtures;
    use crate::store::MemoryHeaderStore;

    fn main_rules() -> ConsensusRules {
        ConsensusRules::new(NetworkParams::main())
    }

    #[test]
    fn is_difficulty_transition_point() {
        let rules = main_rules();
        assert!(!rules.is_difficulty_transition_point(0));
        assert!(!rules.is_difficulty_transition_point(2014));
        assert!(rules.is_difficulty_transition_point(2015));
        assert!(!rules.is_difficulty_transition_point(2016));
        assert!(rules.is_difficulty_transition_point(4031));
    }

    #[test]
    fn is_reward_halving_point() {
        let rules = main_rules();
        assert!(rules.is_reward_halving_point(209_999));
        assert!(rules.is_reward_halving_point(419_999));
        assert!(!rules.is_reward_halving_point(629_998));
        assert!(rules.is_reward_halving_point(629_999));
        assert!(!rules.is_reward_halving_point(630_000));
        assert!(rules.is_reward_halving_point(839_999));
    }

    #[test]
    fn block_inflation_halves_at_boundaries() {
        let rules = main_rules();
        let fifty = 50 * super::super::params::COIN;
        assert_eq!(rules.block_inflation(0), fifty);
        assert_eq!(rules.block_inflation(209_998), fifty);
        assert_eq!(rules.block_inflation(209_999), fifty);
        assert_eq!(rules.block_inflation(210_000), fifty / 2);
        assert_eq!(rules.block_inflation(210_001), fifty / 2);
        assert_eq!(rules.block_inflation(420_000), fifty / 4);
    }

    #[test]
    fn block_inflation_reaches_exact_zero() {
        let rules = main_rules();
        // 50 BTC in satoshis needs 33 halvings to hit zero
        assert_eq!(rules.block_inflation(32 * 210_000), 1);
        assert_eq!(rules.block_inflation(33 * 210_000), 0);
        assert_eq!(rules.block_inflation(64 * 210_000), 0);
        assert_eq!(rules.block_inflation(u32::MAX), 0);
    }

    #[test]
    fn retarget_matches_known_mainnet_transition() {
        let rules = main_rules();
        let prev = decode_compact(0x1d00ffff).unwrap();
        // blocks 30240 .. 32255
        let next = rules.retarget(prev, 1_261_130_161, 1_262_152_739);
        assert_eq!(encode_compact(next), 0x1d00d86a);
    }

    #[test]
    fn retarget_is_capped_at_pow_limit() {
        let rules = main_rules();
        let prev = decode_compact(0x1d00ffff).unwrap();
        let next = rules.retarget(prev, 1_231_006_505, 1_233_061_996);
        assert_eq!(encode_compact(next), 0x1d00ffff);
    }

    #[test]
    fn retarget_clamps_fast_intervals_to_a_quarter() {
        let rules = main_rules();
        let prev = decode_compact(0x1c05a3f4).unwrap();
        let next = rules.retarget(prev, 1_279_008_237, 1_279_297_671);
        assert_eq!(encode_compact(next), 0x1c0168fd);
    }

    #[test]
    fn required_bits_follow_parent_between_retargets() {
        let params = NetworkParams::unit_test();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        let bits = rules.required_bits(&store, &genesis, genesis.header.time + 60).unwrap();
        assert_eq!(bits, genesis.header.bits);
    }

    #[test]
    fn required_bits_retarget_after_interval() {
        let params = NetworkParams::unit_test();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        let chain = fixtures::build_branch(&rules, &store, &genesis, 9, 1, 0);
        let tip = chain.last().unwrap();
        assert!(rules.is_difficulty_transition_point(tip.height));

        // nine 60s gaps against a 600s timespan
        let expected = rules.retarget(
            decode_compact(tip.header.bits).unwrap(),
            genesis.header.time,
            tip.header.time,
        );
        let bits = rules.required_bits(&store, tip, tip.header.time + 60).unwrap();
        assert_eq!(bits, encode_compact(expected));
        assert_ne!(bits, tip.header.bits);
    }

    #[test]
    fn min_difficulty_after_gap_and_walk_back() {
        let mut params = NetworkParams::unit_test();
        params.pow_limit_bits = 0x207fffff;
        params.genesis.bits = 0x1f00ffff;
        params.min_difficulty = MinDifficultyPolicy::AllowAfterGap { max_gap_secs: 120 };
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        // regular spacing inherits the parent
        let bits = rules.required_bits(&store, &genesis, genesis.header.time + 60).unwrap();
        assert_eq!(bits, 0x1f00ffff);

        // a long gap allows (and demands) the easiest target
        let late = genesis.header.time + 121;
        let bits = rules.required_bits(&store, &genesis, late).unwrap();
        assert_eq!(bits, params.pow_limit_bits);

        let mut easy = BlockHeader {
            version: 1,
            prev_hash: genesis.hash(),
            merkle_root: Hash256::digest(b"min-difficulty"),
            time: late,
            bits,
            nonce: 0,
        };
        easy.solve().unwrap();
        let easy = genesis.build_next(easy).unwrap();
        store.put(easy.clone()).unwrap();

        // a prompt child of a min-difficulty block reverts to the real target
        let bits = rules.required_bits(&store, &easy, late + 30).unwrap();
        assert_eq!(bits, 0x1f00ffff);
    }

    #[test]
    fn regtest_never_retargets() {
        let params = NetworkParams::regtest();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();
        let parent = StoredHeader {
            height: params.interval - 1,
            ..genesis
        };
        assert!(rules.is_difficulty_transition_point(parent.height));
        let bits = rules.required_bits(&store, &parent, parent.header.time + 60).unwrap();
        assert_eq!(bits, parent.header.bits);
    }

    #[test]
    fn median_time_past_uses_recent_window() {
        let params = NetworkParams::unit_test();
        let rules = ConsensusRules::new(params.clone());
        let store = MemoryHeaderStore::new(&params).unwrap();
        let genesis = store.chain_head().unwrap();

        assert_eq!(rules.median_time_past(&store, &genesis).unwrap(), genesis.header.time);

        let chain = fixtures::build_branch(&rules, &store, &genesis, 8, 1, 0);
        let tip = chain.last().unwrap();
        // heights 0..=8, evenly spaced: the median is height 4
        assert_eq!(
            rules.median_time_past(&store, tip).unwrap(),
            fixtures::time_at(&genesis, 4)
        );
    }

    #[test]
    fn version_thresholds_need_a_full_window() {
        let rules = ConsensusRules::new(NetworkParams::unit_test());
        let mut tally = VersionTally::new(rules.majority_window());
        for _ in 0..rules.majority_window() - 1 {
            tally.add(2);
        }
        assert!(!rules.is_version_enforced(&tally, 2));
        assert!(!rules.is_version_outdated(&tally, 1));

        tally.add(2);
        assert!(rules.is_version_enforced(&tally, 2));
        assert!(rules.is_version_outdated(&tally, 1));
        assert!(!rules.is_version_outdated(&tally, 2));
    }
}
