use std::collections::BTreeSet;

use kestrel_blocks::Block;
use kestrel_cfa::{Cfa, CfaEdge, CfaNode};
use kestrel_engine::{
    AbstractState, Cpa, CpaError, Merge, MergeSep, PrecisionAdjustment, Reducer, ReducerError,
    StopSep, TransferRelation,
};

/// A state that only knows where it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationState {
    pub location: CfaNode,
    pub target: bool,
}

impl LocationState {
    pub fn new(location: CfaNode) -> Self {
        Self {
            location,
            target: false,
        }
    }
}

impl AbstractState for LocationState {
    fn location(&self) -> CfaNode {
        self.location
    }

    fn is_target(&self) -> bool {
        self.target
    }

    fn is_less_or_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// Every edge is feasible. States at `targets` are target states.
#[derive(Clone, Debug, Default)]
pub struct LocationTransfer {
    targets: BTreeSet<CfaNode>,
}

impl LocationTransfer {
    pub fn new(targets: impl IntoIterator<Item = CfaNode>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }
}

impl TransferRelation<LocationState, ()> for LocationTransfer {
    fn successors_for_edge(
        &self,
        cfa: &Cfa,
        _state: &LocationState,
        _precision: &(),
        edge: CfaEdge,
    ) -> Result<Vec<LocationState>, CpaError> {
        let location = cfa
            .target(edge)
            .ok_or_else(|| CpaError::Transfer(format!("edge {edge} is not part of the CFA")))?;
        Ok(vec![LocationState {
            location,
            target: self.targets.contains(&location),
        }])
    }
}

/// Nothing to project: a location state has no variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocationReducer;

impl Reducer<LocationState, ()> for LocationReducer {
    fn reduce(
        &self,
        state: &LocationState,
        _block: &Block,
        _call_node: CfaNode,
    ) -> Result<LocationState, ReducerError> {
        Ok(*state)
    }

    fn expand(
        &self,
        _root: &LocationState,
        _block: &Block,
        reduced: &LocationState,
    ) -> Result<LocationState, ReducerError> {
        Ok(*reduced)
    }

    fn reduce_precision(&self, _precision: &(), _block: &Block) -> Result<(), ReducerError> {
        Ok(())
    }

    fn expand_precision(&self, _root: &(), _block: &Block, _reduced: &()) -> Result<(), ReducerError> {
        Ok(())
    }
}

/// Location analysis with separate merge and stop-sep, and a reducer.
pub fn location_cpa(
    targets: impl IntoIterator<Item = CfaNode>,
    precision_adjustment: Option<Box<dyn PrecisionAdjustment<LocationState, ()>>>,
) -> Cpa<LocationState, ()> {
    let cpa = Cpa::<LocationState, ()>::builder()
        .transfer(Box::new(LocationTransfer::new(targets)))
        .merge(Merge::from(MergeSep))
        .stop(Box::new(StopSep))
        .maybe_precision_adjustment(precision_adjustment)
        .reducer(Box::new(LocationReducer))
        .build();
    match cpa {
        Ok(cpa) => cpa,
        Err(err) => panic!("location analysis is fully configured: {err}"),
    }
}
