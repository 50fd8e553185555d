use std::fmt;

use indexmap::IndexSet;
use kestrel_cfa::CfaNode;
use kestrel_engine::{AbstractState, Arg, ArgStateId};

use crate::CheckerError;

/// The part of the graph leading from the root to one target state.
///
/// Built once from the graph and never updated: later surgery on the graph
/// does not affect an existing counterexample.
#[derive(Clone, Debug)]
pub struct Counterexample<S> {
    root: ArgStateId,
    target: ArgStateId,
    states_on_paths: IndexSet<ArgStateId>,
    path: Vec<(ArgStateId, S)>,
}

impl<S: AbstractState> Counterexample<S> {
    pub fn new(arg: &Arg<S>, root: ArgStateId, target: ArgStateId) -> Self {
        let path = arg
            .one_path_to(target)
            .into_iter()
            .filter_map(|id| Some((id, arg.state(id)?.clone())))
            .collect();
        Self {
            root,
            target,
            states_on_paths: arg.all_states_on_paths_to(target),
            path,
        }
    }

    pub fn root(&self) -> ArgStateId {
        self.root
    }

    pub fn target(&self) -> ArgStateId {
        self.target
    }

    /// Every state on some path to the target, the target included.
    pub fn states_on_paths(&self) -> &IndexSet<ArgStateId> {
        &self.states_on_paths
    }

    /// One concrete path, first state first.
    pub fn path(&self) -> &[(ArgStateId, S)] {
        &self.path
    }

    pub fn path_ids(&self) -> Vec<ArgStateId> {
        self.path.iter().map(|(id, _)| *id).collect()
    }

    pub fn locations(&self) -> Vec<CfaNode> {
        self.path.iter().map(|(_, state)| state.location()).collect()
    }

    pub fn target_state(&self) -> Option<&S> {
        self.path.last().map(|(_, state)| state)
    }
}

impl<S: AbstractState> fmt::Display for Counterexample<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (id, state)) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{id}@{}", state.location())?;
        }
        Ok(())
    }
}

/// Decides whether a counterexample is a real execution.
///
/// A checker is an opaque collaborator: it may replay the path concretely,
/// ask a solver, or run a whole nested analysis.
pub trait CounterexampleChecker<S> {
    fn check_counterexample(&mut self, counterexample: &Counterexample<S>)
    -> Result<bool, CheckerError>;
}

impl<S, F> CounterexampleChecker<S> for F
where
    F: FnMut(&Counterexample<S>) -> Result<bool, CheckerError>,
{
    fn check_counterexample(
        &mut self,
        counterexample: &Counterexample<S>,
    ) -> Result<bool, CheckerError> {
        self(counterexample)
    }
}
