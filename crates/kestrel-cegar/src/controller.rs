use indexmap::IndexSet;
use kestrel_engine::{AbstractState, AlgorithmStatus, ArgStateId, Engine, Precision, ReachedSet};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::{CegarOptions, Counterexample, CounterexampleChecker, RefinementError, Verdict};

/// How a refinement run ended.
#[derive(Clone, Debug)]
pub enum RefinementOutcome<S> {
    /// No unchecked target is left and nothing is waiting.
    Exhausted,
    /// The checker confirmed this counterexample.
    BugFound(Counterexample<S>),
}

#[derive(Clone, Debug)]
pub struct RefinementResult<S> {
    pub status: AlgorithmStatus,
    pub outcome: RefinementOutcome<S>,
    /// Counterexample checks performed during the run.
    pub checked: usize,
    /// Checks that found the counterexample infeasible.
    pub infeasible: usize,
}

/// Alternates engine runs with counterexample checks until a bug is
/// confirmed or the state space is exhausted.
///
/// The controller touches the reached set only between engine runs.
pub struct RefinementController<'a, S, P, C> {
    engine: Engine<'a, S, P>,
    checker: C,
    options: CegarOptions,
    confirmed: FxHashSet<ArgStateId>,
}

#[bon::bon]
impl<'a, S: AbstractState, P: Precision, C: CounterexampleChecker<S>>
    RefinementController<'a, S, P, C>
{
    #[builder]
    pub fn new(
        engine: Engine<'a, S, P>,
        checker: C,
        #[builder(default)] options: CegarOptions,
    ) -> Self {
        Self {
            engine,
            checker,
            options,
            confirmed: FxHashSet::default(),
        }
    }
}

impl<'a, S: AbstractState, P: Precision, C: CounterexampleChecker<S>>
    RefinementController<'a, S, P, C>
{
    pub fn engine(&self) -> &Engine<'a, S, P> {
        &self.engine
    }

    pub fn options(&self) -> &CegarOptions {
        &self.options
    }

    /// Targets the checker has confirmed so far. They are never checked
    /// again.
    pub fn confirmed_targets(&self) -> &FxHashSet<ArgStateId> {
        &self.confirmed
    }

    pub fn run(
        &mut self,
        reached: &mut ReachedSet<S, P>,
    ) -> Result<RefinementResult<S>, RefinementError> {
        let mut status = AlgorithmStatus::SOUND_AND_PRECISE;
        let mut checked = 0;
        let mut infeasible = 0;

        while reached.has_waiting_state() {
            status = status.update(self.engine.run(reached)?);

            let targets = self.unchecked_targets(reached);
            if targets.is_empty() {
                debug!("no unchecked target states");
                break;
            }

            let mut confirmed = None;
            for target in targets {
                // removed together with an earlier infeasible target
                if !reached.contains(target) {
                    continue;
                }
                checked += 1;
                match self.check(reached, target)? {
                    Some(counterexample) => {
                        self.confirmed.insert(target);
                        confirmed.get_or_insert(counterexample);
                    }
                    None => {
                        infeasible += 1;
                        let sound = self.remove_infeasible(reached, target)?;
                        status = status.with_sound(status.is_sound() && sound);
                    }
                }
            }

            if let Some(counterexample) = confirmed {
                return Ok(RefinementResult {
                    status,
                    outcome: RefinementOutcome::BugFound(counterexample),
                    checked,
                    infeasible,
                });
            }
        }

        Ok(RefinementResult {
            status,
            outcome: RefinementOutcome::Exhausted,
            checked,
            infeasible,
        })
    }

    /// Run to completion and fold the result, errors included, into a
    /// single verdict.
    pub fn verify(&mut self, reached: &mut ReachedSet<S, P>) -> Verdict<S> {
        Verdict::from(self.run(reached))
    }

    /// The state the last run stopped at if it is a fresh target, otherwise
    /// every reached target not confirmed yet.
    fn unchecked_targets(&self, reached: &ReachedSet<S, P>) -> Vec<ArgStateId> {
        if !self.options.check_all_targets() {
            let last = reached
                .last_state()
                .filter(|&id| reached.arg().is_target(id) && !self.confirmed.contains(&id));
            if let Some(last) = last {
                return vec![last];
            }
        }
        reached
            .targets()
            .filter(|id| !self.confirmed.contains(id))
            .collect()
    }

    /// Ask the checker about `target`. Returns the counterexample when it is
    /// feasible.
    fn check(
        &mut self,
        reached: &ReachedSet<S, P>,
        target: ArgStateId,
    ) -> Result<Option<Counterexample<S>>, RefinementError> {
        let root = reached.first_state().unwrap_or(target);
        let counterexample = Counterexample::new(reached.arg(), root, target);
        info!(
            target = %target,
            states = counterexample.states_on_paths().len(),
            "checking counterexample"
        );
        let feasible = self
            .checker
            .check_counterexample(&counterexample)
            .map_err(|source| {
                warn!(target = %target, error = %source, "feasibility could not be decided");
                RefinementError::Checker { target, source }
            })?;

        if feasible {
            info!(target = %target, "counterexample confirmed");
            return Ok(Some(counterexample));
        }
        info!(target = %target, "counterexample is infeasible");
        if !self.options.continue_after_infeasible_error() {
            return Err(RefinementError::InfeasibleCounterexample {
                path: counterexample.path_ids(),
            });
        }
        Ok(None)
    }

    /// Cut an infeasible target out of the graph. Returns whether the
    /// analysis stays sound.
    fn remove_infeasible(
        &mut self,
        reached: &mut ReachedSet<S, P>,
        target: ArgStateId,
    ) -> Result<bool, RefinementError> {
        let mut sound = true;
        if self.options.remove_infeasible_errors() {
            let on_paths = reached.arg().all_states_on_paths_to(target);
            sound &= detach_covering(reached, &on_paths)?;
        } else {
            warn!(
                target = %target,
                "infeasible path may still cover other states, safety cannot be proven"
            );
            sound = false;
        }
        sound &= remove_target(reached, target)?;
        Ok(sound)
    }
}

/// Forbid the states of an infeasible path from covering anything and let
/// the states they covered be rediscovered by re-queueing their parents.
fn detach_covering<S: AbstractState, P: Precision>(
    reached: &mut ReachedSet<S, P>,
    on_paths: &IndexSet<ArgStateId>,
) -> Result<bool, RefinementError> {
    let mut sound = true;
    let mut covered = Vec::new();
    for &id in on_paths {
        covered.extend(reached.arg().covers(id));
        reached.arg_mut().set_not_covering(id);
    }

    for state in covered {
        let arg = reached.arg();
        let Some(by) = arg.covered_by(state) else {
            continue;
        };
        if arg.is_transitive_child_of(state, by) {
            // re-admitting it would unroll the loop through its coverer
            warn!(
                state = %state,
                covered_by = %by,
                "covered state lies below its coverer, safety cannot be proven"
            );
            sound = false;
            continue;
        }
        let parents: Vec<ArgStateId> = arg.parents(state).collect();
        for parent in parents {
            if on_paths.contains(&parent) {
                warn!(
                    state = %state,
                    parent = %parent,
                    "covered state hangs off the infeasible path, safety cannot be proven"
                );
                sound = false;
            } else {
                reached.re_add_to_waitlist(parent);
            }
        }
        reached.arg_mut().remove_from_arg(state)?;
    }
    Ok(sound)
}

/// Remove the target together with its single parent and everything below
/// that parent. Removal does not climb further up.
fn remove_target<S: AbstractState, P: Precision>(
    reached: &mut ReachedSet<S, P>,
    target: ArgStateId,
) -> Result<bool, RefinementError> {
    let arg = reached.arg();
    let parents: Vec<ArgStateId> = arg.parents(target).collect();
    let mut sound = true;

    let mut doomed = IndexSet::new();
    let top = match parents[..] {
        [parent] => {
            if arg.children(parent).count() > 1 || arg.covers(parent).next().is_some() {
                // siblings and covered states of the parent are lost with it
                warn!(
                    target = %target,
                    parent = %parent,
                    "parent of infeasible target has other successors, safety cannot be proven"
                );
                sound = false;
            }
            if reached.is_waiting(parent) {
                // successors not computed yet are lost with it
                warn!(
                    target = %target,
                    parent = %parent,
                    "parent of infeasible target is still waiting, safety cannot be proven"
                );
                sound = false;
            }
            parent
        }
        _ => {
            warn!(
                target = %target,
                parents = parents.len(),
                "infeasible target without a single parent, removing the target only"
            );
            sound = false;
            target
        }
    };
    doomed.insert(top);
    doomed.extend(arg.subtree(top));

    for &id in &doomed {
        if id == top {
            continue;
        }
        if arg.parents(id).any(|parent| !doomed.contains(&parent)) {
            warn!(state = %id, "removed state is also reachable elsewhere, safety cannot be proven");
            sound = false;
        }
    }

    let mut covered_outside = Vec::new();
    for &id in &doomed {
        covered_outside.extend(arg.covers(id).filter(|covered| !doomed.contains(covered)));
    }
    if !covered_outside.is_empty() {
        warn!(
            count = covered_outside.len(),
            "removed states covered others, safety cannot be proven"
        );
        sound = false;
    }

    debug!(target = %target, removed = doomed.len(), "removing infeasible target");
    for id in doomed.into_iter().chain(covered_outside) {
        reached.remove(id);
        reached.arg_mut().remove_from_arg(id)?;
    }
    Ok(sound)
}
