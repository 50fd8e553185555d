use kestrel_cfa::CfaNode;

use crate::ArgStateId;

/// Failures raised by domain operators.
///
/// Domains report their own failures through [`Custom`](Self::Custom) via
/// [`CpaError::custom`].
#[derive(Debug, thiserror::Error)]
pub enum CpaError {
    #[error("transfer relation failed: {0}")]
    Transfer(String),
    #[error("merge operator failed: {0}")]
    Merge(String),
    #[error("stop operator failed: {0}")]
    Stop(String),
    #[error("precision adjustment failed: {0}")]
    PrecisionAdjustment(String),
    #[error("summary application failed: {0}")]
    SummaryApplication(String),
    /// Domain-defined error.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl CpaError {
    /// Wrap an arbitrary error as [`CpaError::Custom`].
    pub fn custom(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        CpaError::Custom(Box::new(error))
    }
}

/// Invalid analysis configuration, detected before exploration starts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {0} operator")]
    MissingOperator(&'static str),
    #[error("block-modular analysis requires a block partitioning")]
    MissingPartitioning,
    #[error("block-modular analysis requires a reducer")]
    MissingReducer,
}

#[derive(Debug, thiserror::Error)]
pub enum ReducerError {
    /// The domain has no meaningful implementation of this operation.
    #[error("reducer does not support {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl ReducerError {
    pub fn custom(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        ReducerError::Custom(Box::new(error))
    }
}

/// Misuse of the reachability graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("state {0} was removed from the graph")]
    Destroyed(ArgStateId),
    #[error("state {0} is already covered")]
    AlreadyCovered(ArgStateId),
    #[error("state {0} may not cover other states")]
    NotCovering(ArgStateId),
    #[error("covering {state} by {by} would create a cycle")]
    CoveringCycle { state: ArgStateId, by: ArgStateId },
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Cpa(#[from] CpaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Reducer(#[from] ReducerError),
    #[error(transparent)]
    Arg(#[from] ArgError),
    #[error("no state {0} in the reached set")]
    UnknownState(ArgStateId),
    #[error("block entered at {0} has no reduction boundary")]
    MissingBlock(CfaNode),
    #[error("analysis was interrupted")]
    Interrupted,
}
