//! The operator contract a pluggable abstract domain implements.
//!
//! States never carry behavior beyond location, target flag and the covering
//! predicate. Transfer, merge, stop and precision adjustment are separate
//! operator objects bundled into a [`Cpa`](crate::Cpa).

use std::fmt::Debug;
use std::hash::Hash;

use kestrel_cfa::{Cfa, CfaEdge, CfaNode, CfaTraversal};

use crate::{ArgStateId, CpaError, ReachedSet};

pub trait AbstractState: Clone + Eq + Hash + Debug {
    /// The program location this state belongs to.
    fn location(&self) -> CfaNode;

    /// Whether this state violates the checked property.
    fn is_target(&self) -> bool;

    /// Covering predicate: every concrete behavior of `self` is also a
    /// behavior of `other`.
    fn is_less_or_equal(&self, other: &Self) -> bool;
}

pub trait Precision: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> Precision for T {}

pub trait TransferRelation<S, P> {
    /// Abstract successors of `state` along one edge. An empty result means
    /// the edge is infeasible from `state`.
    fn successors_for_edge(
        &self,
        cfa: &Cfa,
        state: &S,
        precision: &P,
        edge: CfaEdge,
    ) -> Result<Vec<S>, CpaError>;

    /// Abstract successors of `state` along every leaving edge the engine
    /// follows. Call-to-return edges are skipped; calls go through the callee.
    fn successors(&self, cfa: &Cfa, state: &S, precision: &P) -> Result<Vec<S>, CpaError>
    where
        S: AbstractState,
    {
        let traversal = CfaTraversal::dfs();
        let mut result = Vec::new();
        for edge in cfa.leaving_edges(state.location()) {
            if traversal.follows(cfa, edge) {
                result.extend(self.successors_for_edge(cfa, state, precision, edge)?);
            }
        }
        Ok(result)
    }
}

pub trait MergeOperator<S, P> {
    /// Combine `new` into `reached`. Returning `reached` unchanged means no
    /// merge took place.
    fn merge(&self, new: &S, reached: &S, precision: &P) -> Result<S, CpaError>;
}

/// Merge configuration. [`Merge::Sep`] never merges and lets the engine skip
/// the merge phase entirely.
pub enum Merge<S, P> {
    Sep,
    Join(Box<dyn MergeOperator<S, P>>),
}

impl<S, P> Merge<S, P> {
    pub fn join(operator: impl MergeOperator<S, P> + 'static) -> Self {
        Merge::Join(Box::new(operator))
    }

    pub fn is_sep(&self) -> bool {
        matches!(self, Merge::Sep)
    }
}

impl<S, P> std::fmt::Debug for Merge<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Merge::Sep => f.write_str("Merge::Sep"),
            Merge::Join(_) => f.write_str("Merge::Join(..)"),
        }
    }
}

/// The merge operator that keeps states separate.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeSep;

impl<S, P> From<MergeSep> for Merge<S, P> {
    fn from(_: MergeSep) -> Self {
        Merge::Sep
    }
}

impl<S: Clone, P> MergeOperator<S, P> for MergeSep {
    fn merge(&self, _new: &S, reached: &S, _precision: &P) -> Result<S, CpaError> {
        Ok(reached.clone())
    }
}

pub trait StopOperator<S, P> {
    /// Whether `state` is subsumed by the `reached` states at its location.
    fn stop(&self, state: &S, reached: &[&S], precision: &P) -> Result<bool, CpaError>;
}

/// Stop when a single reached state covers the new one.
#[derive(Clone, Copy, Debug, Default)]
pub struct StopSep;

impl<S: AbstractState, P> StopOperator<S, P> for StopSep {
    fn stop(&self, state: &S, reached: &[&S], _precision: &P) -> Result<bool, CpaError> {
        Ok(reached.iter().any(|other| state.is_less_or_equal(other)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Continue,
    /// Insert the state, then halt the analysis.
    Break,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecisionAdjustmentResult<S, P> {
    pub state: S,
    pub precision: P,
    pub action: Action,
}

impl<S, P> PrecisionAdjustmentResult<S, P> {
    pub fn new(state: S, precision: P, action: Action) -> Self {
        Self {
            state,
            precision,
            action,
        }
    }
}

pub trait PrecisionAdjustment<S, P> {
    /// Adjust a successor before it is merged or stopped. `None` drops it.
    ///
    /// `projection` extracts the component state this operator works on from
    /// a composite state; `full_state` is the composite state itself.
    fn adjust(
        &self,
        state: &S,
        precision: &P,
        reached: &ReachedSet<S, P>,
        projection: &dyn Fn(&S) -> S,
        full_state: &S,
    ) -> Result<Option<PrecisionAdjustmentResult<S, P>>, CpaError>;
}

/// Leave state and precision untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticPrecisionAdjustment;

impl<S: AbstractState, P: Precision> PrecisionAdjustment<S, P> for StaticPrecisionAdjustment {
    fn adjust(
        &self,
        state: &S,
        precision: &P,
        _reached: &ReachedSet<S, P>,
        _projection: &dyn Fn(&S) -> S,
        _full_state: &S,
    ) -> Result<Option<PrecisionAdjustmentResult<S, P>>, CpaError> {
        Ok(Some(PrecisionAdjustmentResult::new(
            state.clone(),
            precision.clone(),
            Action::Continue,
        )))
    }
}

/// Halt as soon as a target state is produced.
#[derive(Clone, Copy, Debug, Default)]
pub struct BreakOnTarget;

impl<S: AbstractState, P: Precision> PrecisionAdjustment<S, P> for BreakOnTarget {
    fn adjust(
        &self,
        state: &S,
        precision: &P,
        _reached: &ReachedSet<S, P>,
        _projection: &dyn Fn(&S) -> S,
        full_state: &S,
    ) -> Result<Option<PrecisionAdjustmentResult<S, P>>, CpaError> {
        let action = if full_state.is_target() {
            Action::Break
        } else {
            Action::Continue
        };
        Ok(Some(PrecisionAdjustmentResult::new(
            state.clone(),
            precision.clone(),
            action,
        )))
    }
}

/// Try to cover a popped state before computing its successors.
pub trait ForcedCovering<S, P> {
    /// The reached state that now covers `id`, if any.
    fn try_forced_covering(
        &self,
        id: ArgStateId,
        state: &S,
        precision: &P,
        reached: &ReachedSet<S, P>,
    ) -> Result<Option<ArgStateId>, CpaError>;
}
