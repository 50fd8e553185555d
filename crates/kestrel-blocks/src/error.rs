use kestrel_cfa::{CfaNode, LoopId};

/// Configuration errors raised while setting up a partitioning.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("unknown partitioning heuristic '{0}'")]
    UnknownHeuristic(String),
    /// Only `function` together with `loop` may be combined.
    #[error("cannot combine partitioning heuristics {0:?}")]
    ConflictingHeuristics(Vec<String>),
    #[error("no partitioning heuristic configured")]
    NoHeuristic,
    #[error("loop {id} has {} heads and cannot form a block", heads.len())]
    UnsupportedLoop { id: LoopId, heads: Vec<CfaNode> },
}
