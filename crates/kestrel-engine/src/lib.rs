//! Reachability engine: the configurable fixpoint algorithm, the reached set
//! and abstract reachability graph it fills, and the contracts a pluggable
//! abstract domain implements to take part, block-modular reduction included.

#[macro_use]
mod arena;
mod arg;
mod boundary;
mod cache;
mod cpa;
mod domain;
mod engine;
mod error;
mod options;
mod reached;
mod reducer;
mod status;
mod summary;

pub use arg::{Arg, ArgNode, ArgStateId};
pub use boundary::{BoundaryFlag, BoundaryFlags, BoundaryInfoProvider, BoundedInfo, LoopBoundReason};
pub use cache::BlockSummaryCache;
pub use cpa::Cpa;
pub use domain::{
    AbstractState, Action, BreakOnTarget, ForcedCovering, Merge, MergeOperator, MergeSep,
    Precision, PrecisionAdjustment, PrecisionAdjustmentResult, StaticPrecisionAdjustment,
    StopOperator, StopSep, TransferRelation,
};
pub use engine::Engine;
pub use error::{ArgError, ConfigError, CpaError, EngineError, ReducerError};
pub use options::EngineOptions;
pub use reached::{ReachedSet, WaitlistOrder};
pub use reducer::{MemoKey, Reducer};
pub use status::{AlgorithmStatus, EngineStatistics, ShutdownNotifier};
pub use summary::{
    FunctionSummaryStore, InMemorySummaryStore, LoopSummaryStore, SummaryApplicator,
    SummaryInstance, SummaryProvider,
};
