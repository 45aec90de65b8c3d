use chrono::DateTime;
use header_chain::{AcceptOutcome, ChainSelector, HeaderStore, StoredHeader};
use serde::Serialize;

/// Shared application state: one selector over whichever store is configured.
pub struct AppState {
    pub selector: ChainSelector<dyn HeaderStore>,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct HeaderResponse {
    pub hash: String,
    pub height: u32,
    /// Cumulative work from genesis, lowercase hex.
    pub chain_work: String,
    pub version: u32,
    pub prev_hash: String,
    pub merkle_root: String,
    pub time: u32,
    pub time_utc: Option<String>,
    pub bits: String,
    pub nonce: u32,
}

impl From<&StoredHeader> for HeaderResponse {
    fn from(stored: &StoredHeader) -> Self {
        let header = &stored.header;
        Self {
            hash: stored.hash().to_string(),
            height: stored.height,
            chain_work: format!("{:x}", stored.chain_work),
            version: header.version,
            prev_hash: header.prev_hash.to_string(),
            merkle_root: header.merkle_root.to_string(),
            time: header.time,
            time_utc: DateTime::from_timestamp(i64::from(header.time), 0).map(|t| t.to_rfc3339()),
            bits: format!("{:08x}", header.bits),
            nonce: header.nonce,
        }
    }
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub hash: String,
    #[serde(flatten)]
    pub outcome: AcceptOutcome,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/* ---------- Consensus API Models ---------- */

#[derive(Serialize)]
pub struct ConsensusResponse {
    pub height: u32,
    pub difficulty_transition_point: bool,
    pub reward_halving_point: bool,
    /// Block subsidy in satoshis.
    pub subsidy: u64,
}

#[derive(Serialize)]
pub struct TallyResponse {
    pub version: u32,
    pub window: usize,
    /// Null until the window has filled.
    pub count: Option<usize>,
    pub enforce_threshold: usize,
    pub reject_threshold: usize,
    pub enforced: bool,
    pub outdated: bool,
}
