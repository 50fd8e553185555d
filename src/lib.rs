//! Configurable program analysis over control-flow automata.
//!
//! The member crates are re-exported under short names; [`prelude`] pulls in
//! what a typical analysis setup needs.

pub use kestrel_blocks as blocks;
pub use kestrel_cegar as cegar;
pub use kestrel_cfa as cfa;
pub use kestrel_engine as engine;

pub mod prelude {
    pub use kestrel_blocks::{Block, BlockId, BlockPartitioning, PartitioningOptions, partition};
    pub use kestrel_cegar::{
        CegarOptions, Counterexample, CounterexampleChecker, RefinementController, Verdict,
    };
    pub use kestrel_cfa::{Cfa, CfaBuilder, CfaEdge, CfaNode, CfaTraversal, EdgeKind};
    pub use kestrel_engine::{
        AbstractState, AlgorithmStatus, Cpa, Engine, EngineOptions, Precision, ReachedSet,
        Reducer, TransferRelation,
    };
}
