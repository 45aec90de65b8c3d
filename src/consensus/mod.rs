pub mod params;
pub mod rules;
pub mod tally;

pub use params::{COIN, MinDifficultyPolicy, Network, NetworkParams};
pub use rules::ConsensusRules;
pub use tally::{TallyError, VersionTally};
