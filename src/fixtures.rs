//! Header-mining helpers shared by the unit tests.

use crate::blockchain::{BlockHeader, Hash256, StoredHeader};
use crate::chain::{AcceptOutcome, ChainSelector};
use crate::consensus::ConsensusRules;
use crate::store::HeaderStore;

pub(crate) const SPACING: u32 = 60;

/// Timestamp the fixtures give the block at `height`.
pub(crate) fn time_at(genesis: &StoredHeader, height: u32) -> u32 {
    genesis.header.time + SPACING * height
}

/// A solved child of `parent` carrying the required target. `salt` keeps
/// competing branches from mining identical headers.
pub(crate) fn mine_child<S: HeaderStore + ?Sized>(
    rules: &ConsensusRules,
    store: &S,
    parent: &StoredHeader,
    version: u32,
    salt: u32,
) -> BlockHeader {
    let time = parent.header.time + SPACING;
    let bits = rules.required_bits(store, parent, time).unwrap();
    let mut preimage = salt.to_le_bytes().to_vec();
    preimage.extend_from_slice(&(parent.height + 1).to_le_bytes());

    let mut header = BlockHeader {
        version,
        prev_hash: parent.hash(),
        merkle_root: Hash256::digest(&preimage),
        time,
        bits,
        nonce: 0,
    };
    header.solve().unwrap();
    header
}

/// Mine `count` headers on top of `parent` and put them straight into
/// `store`, bypassing head selection.
pub(crate) fn build_branch<S: HeaderStore + ?Sized>(
    rules: &ConsensusRules,
    store: &S,
    parent: &StoredHeader,
    count: usize,
    version: u32,
    salt: u32,
) -> Vec<StoredHeader> {
    let mut branch = Vec::with_capacity(count);
    let mut tip = parent.clone();
    for _ in 0..count {
        let header = mine_child(rules, store, &tip, version, salt);
        tip = tip.build_next(header).unwrap();
        store.put(tip.clone()).unwrap();
        branch.push(tip.clone());
    }
    branch
}

/// Mine `count` headers on top of `parent` and feed each to `selector`.
pub(crate) fn submit_branch<S: HeaderStore + ?Sized>(
    selector: &ChainSelector<S>,
    parent: &StoredHeader,
    count: usize,
    version: u32,
    salt: u32,
) -> Vec<(StoredHeader, AcceptOutcome)> {
    let mut branch = Vec::with_capacity(count);
    let mut tip = parent.clone();
    for _ in 0..count {
        let header = mine_child(selector.rules(), selector.store().as_ref(), &tip, version, salt);
        let outcome = selector.accept_header(header).unwrap();
        tip = selector.store().get(&header.hash()).unwrap().unwrap();
        branch.push((tip.clone(), outcome));
    }
    branch
}
