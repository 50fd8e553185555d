//! Bounded exploration: where a successor leaves the explored region and
//! a summary has to stand in for it.

use kestrel_cfa::{CfaEdge, LoopId};

/// Which enclosing construct a state is bounded by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoundaryFlag {
    #[default]
    None,
    Function,
    Loop,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundaryFlags {
    pub flag: BoundaryFlag,
    /// Execution is abstract rather than concrete.
    pub under_abstract: bool,
    /// Loop nesting depth at the state.
    pub loop_depth: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopBoundReason {
    MaxIterationReached,
    MaxDepthReached,
}

/// Outcome of a boundary check between a state and one of its successors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoundedInfo {
    /// No bound was exceeded.
    None,
    Function {
        name: String,
        entry: CfaEdge,
        exits: Vec<CfaEdge>,
    },
    Loop {
        id: LoopId,
        reason: LoopBoundReason,
        entry: CfaEdge,
        exits: Vec<CfaEdge>,
    },
    /// A bound kind the engine does not know how to summarize.
    Unrecognized { kind: String },
}

pub trait BoundaryInfoProvider<S> {
    fn flags(&self, state: &S) -> BoundaryFlags;

    fn boundary_info(&self, from: &S, to: &S, flags: &BoundaryFlags) -> BoundedInfo;
}
