use indexmap::IndexSet;
use kestrel_blocks::{Block, BlockPartitioning};
use kestrel_cfa::Cfa;
use smallvec::SmallVec;
use tracing::{debug, error, info, trace};

use crate::{
    AbstractState, Action, AlgorithmStatus, ArgStateId, BlockSummaryCache, BoundaryFlag,
    BoundedInfo, ConfigError, Cpa, EngineError, EngineOptions, EngineStatistics, LoopBoundReason,
    Merge, Precision, PrecisionAdjustmentResult, ReachedSet, ShutdownNotifier, SummaryProvider,
};

/// The worklist fixpoint algorithm over a [`Cpa`].
///
/// The engine pops a waiting state, computes its successors, substitutes
/// summaries where a successor crosses a bound, adjusts precision, and
/// finally merges and stop-checks each successor before it is reached.
/// With block-modular analysis enabled, successors entering a block are
/// replaced by the block's cached or freshly computed exits.
pub struct Engine<'a, S, P> {
    cfa: &'a Cfa,
    cpa: Cpa<S, P>,
    options: EngineOptions,
    partitioning: Option<&'a BlockPartitioning>,
    summaries: SummaryProvider,
    cache: BlockSummaryCache<S, P>,
    shutdown: ShutdownNotifier,
    stats: EngineStatistics,
}

#[bon::bon]
impl<'a, S: AbstractState, P: Precision> Engine<'a, S, P> {
    #[builder]
    pub fn new(
        cfa: &'a Cfa,
        cpa: Cpa<S, P>,
        #[builder(default)] options: EngineOptions,
        partitioning: Option<&'a BlockPartitioning>,
        #[builder(default)] summaries: SummaryProvider,
        #[builder(default)] shutdown: ShutdownNotifier,
    ) -> Result<Self, ConfigError> {
        if options.block_modular() {
            if partitioning.is_none() {
                return Err(ConfigError::MissingPartitioning);
            }
            if !cpa.has_reducer() {
                return Err(ConfigError::MissingReducer);
            }
        }
        Ok(Self {
            cfa,
            cpa,
            options,
            partitioning,
            summaries,
            cache: BlockSummaryCache::default(),
            shutdown,
            stats: EngineStatistics::default(),
        })
    }
}

impl<'a, S: AbstractState, P: Precision> Engine<'a, S, P> {
    pub fn cfa(&self) -> &'a Cfa {
        self.cfa
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn statistics(&self) -> &EngineStatistics {
        &self.stats
    }

    pub fn cache(&self) -> &BlockSummaryCache<S, P> {
        &self.cache
    }

    pub fn shutdown_notifier(&self) -> &ShutdownNotifier {
        &self.shutdown
    }

    /// A reached set holding `state` as its only root, using the configured
    /// waitlist order.
    pub fn initial_reached_set(&self, state: S, precision: P) -> ReachedSet<S, P> {
        ReachedSet::with_initial_state(state, precision, self.options.waitlist_order())
    }

    /// Explore until the waitlist is empty or a precision adjustment asks to
    /// stop.
    ///
    /// A state whose handling fails is put back on the waitlist before the
    /// error is returned. Shutdown is polled once per popped state.
    pub fn run(&mut self, reached: &mut ReachedSet<S, P>) -> Result<AlgorithmStatus, EngineError> {
        let status =
            AlgorithmStatus::default().with_precise(!self.options.report_false_as_unknown());
        if self.options.block_modular() && reached.depth() == 0 {
            let main = self
                .partitioning
                .and_then(BlockPartitioning::main_block)
                .map(Block::id);
            reached.set_base_block(main);
        }
        info!(
            waiting = reached.waitlist_len(),
            reached = reached.len(),
            "starting reachability analysis"
        );
        let complete = self.explore(reached, true)?;
        debug!(
            complete,
            iterations = self.stats.iterations,
            reached = reached.len(),
            "reachability analysis finished"
        );
        Ok(status)
    }

    /// Drain the innermost level. Returns `false` when halted by a break.
    ///
    /// A block level (`outermost == false`) never halts: a break only ends
    /// the handling of one state, and the block is explored to completion so
    /// that its exits form a whole summary. The break resurfaces once the
    /// target exit is expanded at the outer level.
    fn explore(&mut self, reached: &mut ReachedSet<S, P>, outermost: bool) -> Result<bool, EngineError> {
        while reached.has_waiting_state() {
            if outermost && self.shutdown.should_shutdown() {
                info!("shutdown requested, stopping analysis");
                return Err(EngineError::Interrupted);
            }
            self.stats.record_waitlist(reached.waitlist_len());
            let Some(id) = reached.pop_from_waitlist() else {
                break;
            };
            match self.handle_state(reached, id) {
                Ok(false) => {}
                Ok(true) if !outermost => {
                    trace!(state = %id, "break inside block, exploring the block to completion");
                }
                Ok(true) => {
                    debug!(state = %id, "analysis halted by precision adjustment");
                    return Ok(false);
                }
                Err(err) => {
                    reached.re_add_to_waitlist(id);
                    return Err(err);
                }
            }
        }
        Ok(true)
    }

    /// Handle one popped state; `true` halts the analysis.
    fn handle_state(&mut self, reached: &mut ReachedSet<S, P>, id: ArgStateId) -> Result<bool, EngineError> {
        let state = reached
            .arg()
            .state(id)
            .cloned()
            .ok_or(EngineError::UnknownState(id))?;
        let precision = reached
            .precision(id)
            .cloned()
            .ok_or(EngineError::UnknownState(id))?;
        trace!(state = %id, location = %state.location(), "handling state");

        if let Some(forced) = &self.cpa.forced_covering {
            if let Some(by) = forced.try_forced_covering(id, &state, &precision, reached)? {
                debug!(state = %id, covered_by = %by, "forced covering");
                reached.arg_mut().set_covered(id, by)?;
                reached.remove(id);
                self.stats.forced_coverings += 1;
                return Ok(false);
            }
        }

        let block = self.current_block(reached);
        if let Some(block) = block {
            if reached.depth() > 0
                && block.is_return_node(state.location())
                && reached.level_entry() != Some(id)
            {
                trace!(state = %id, block = %block.id(), "block exit, not expanding");
                return Ok(false);
            }
        }

        let raw = self.cpa.transfer.successors(self.cfa, &state, &precision)?;
        self.stats.record_successors(raw.len());

        let mut bounded: SmallVec<[S; 4]> = SmallVec::with_capacity(raw.len());
        for successor in raw {
            self.apply_bounds(&state, successor, &mut bounded)?;
        }

        let mut successors: Vec<(S, P)> = Vec::with_capacity(bounded.len());
        for successor in bounded {
            if let Some(block) = block {
                if !block.contains(successor.location()) {
                    trace!(location = %successor.location(), "successor leaves block");
                    continue;
                }
            }
            if self.options.block_modular() {
                successors.extend(self.enter_block(reached, successor, &precision)?);
            } else {
                successors.push((successor, precision.clone()));
            }
        }
        let successors: IndexSet<(S, P)> = successors.into_iter().collect();

        let mut parent = id;
        let mut pending = successors.into_iter();
        while let Some((successor, successor_precision)) = pending.next() {
            let projection = |s: &S| s.clone();
            let Some(adjusted) = self.cpa.precision_adjustment.adjust(
                &successor,
                &successor_precision,
                reached,
                &projection,
                &successor,
            )?
            else {
                trace!("successor dropped by precision adjustment");
                continue;
            };
            let PrecisionAdjustmentResult {
                state: successor,
                precision: successor_precision,
                action,
            } = adjusted;

            if action == Action::Break {
                self.stats.breaks += 1;
                if successor.is_target() && self.is_subsumed(reached, &successor, &successor_precision)? {
                    debug!(location = %successor.location(), "ignoring break on covered target");
                    continue;
                }
                let child = reached.arg_mut().add_child(successor, parent)?;
                reached.add(child, successor_precision);
                if pending.len() > 0 {
                    reached.re_add_to_waitlist(parent);
                }
                return Ok(true);
            }

            parent = self.merge_and_stop(reached, parent, successor, successor_precision)?;
        }
        Ok(false)
    }

    fn current_block(&self, reached: &ReachedSet<S, P>) -> Option<&'a Block> {
        let partitioning = self.partitioning?;
        partitioning.get(reached.current_block()?)
    }

    /// Replace `successor` by summary results when it crosses a bound.
    fn apply_bounds(&self, state: &S, successor: S, out: &mut SmallVec<[S; 4]>) -> Result<(), EngineError> {
        let Some(provider) = &self.cpa.boundary else {
            out.push(successor);
            return Ok(());
        };
        let flags = provider.flags(&successor);
        let applicator = self
            .cpa
            .summary_applicator
            .as_deref()
            .filter(|applicator| applicator.supports(state));

        match provider.boundary_info(state, &successor, &flags) {
            BoundedInfo::None => {
                if flags.flag == BoundaryFlag::None {
                    out.push(successor);
                } else {
                    trace!(flag = ?flags.flag, "discarding out-of-bound successor");
                }
            }
            BoundedInfo::Function { name, entry, exits } => {
                let summaries = self.summaries.function_summaries(&name);
                match applicator {
                    Some(applicator) if !summaries.is_empty() => {
                        debug!(function = %name, summaries = summaries.len(), "applying function summaries");
                        let applied = applicator.apply_function_summary(state, &summaries, entry, &exits)?;
                        if applied.is_empty() {
                            debug!(
                                function = %name,
                                "function summaries gave no successor, keeping it"
                            );
                            out.push(successor);
                        } else {
                            out.extend(applied);
                        }
                    }
                    _ => out.push(successor),
                }
            }
            BoundedInfo::Loop {
                id,
                reason,
                entry,
                exits,
            } => {
                let Some(applicator) = applicator else {
                    out.push(successor);
                    return Ok(());
                };
                let mut applied = Vec::new();
                let internal = (flags.under_abstract && reason == LoopBoundReason::MaxIterationReached)
                    || (!flags.under_abstract && flags.loop_depth == 1);
                if internal {
                    let summaries = self.summaries.internal_loop_summaries(id);
                    if !summaries.is_empty() {
                        debug!(loop_id = %id, summaries = summaries.len(), "applying internal loop summaries");
                        applied.extend(applicator.apply_internal_loop_summary(
                            &successor,
                            &summaries,
                            entry,
                        )?);
                    }
                }
                let external = self.summaries.external_loop_summaries(id);
                if !external.is_empty() {
                    debug!(loop_id = %id, summaries = external.len(), "applying external loop summaries");
                    applied.extend(
                        applicator
                            .apply_external_loop_summary(&successor, &external, entry, &exits)?
                            .into_iter()
                            .map(|(_, s)| s),
                    );
                }
                if applied.is_empty() {
                    out.push(successor);
                } else {
                    out.extend(applied);
                }
            }
            BoundedInfo::Unrecognized { kind } => {
                error!(%kind, "unrecognized boundary info, keeping successor");
                out.push(successor);
            }
        }
        Ok(())
    }

    /// Summarize the block entered by `successor`, or pass it through.
    fn enter_block(
        &mut self,
        reached: &mut ReachedSet<S, P>,
        successor: S,
        precision: &P,
    ) -> Result<Vec<(S, P)>, EngineError> {
        let Some(partitioning) = self.partitioning else {
            return Ok(vec![(successor, precision.clone())]);
        };
        let location = successor.location();
        let Some(block) = partitioning.block_for_call_node(location) else {
            return Ok(vec![(successor, precision.clone())]);
        };
        if reached.blocks_on_stack().any(|open| open == block.id()) {
            return Ok(vec![(successor, precision.clone())]);
        }
        self.summarize_block(reached, block, &successor, precision)
    }

    fn summarize_block(
        &mut self,
        reached: &mut ReachedSet<S, P>,
        block: &Block,
        entry: &S,
        precision: &P,
    ) -> Result<Vec<(S, P)>, EngineError> {
        let reducer = self.cpa.reducer.as_deref().ok_or(ConfigError::MissingReducer)?;
        let reduced = reducer.reduce(entry, block, entry.location())?;
        let reduced_precision = reducer.reduce_precision(precision, block)?;
        let key = reducer.hash_key(&reduced, &reduced_precision);

        let cached = self.cache.get(block.id(), &key).map(<[(S, P)]>::to_vec);
        let exits = match cached {
            Some(cached) => {
                self.stats.cache_hits += 1;
                trace!(block = %block.id(), exits = cached.len(), "block cache hit");
                cached
            }
            None => {
                self.stats.cache_misses += 1;
                debug!(block = %block.id(), depth = reached.depth() + 1, "exploring block");
                reached.push_level(reduced, reduced_precision, block.id());
                let outcome = self.explore(reached, false);
                let exits = Self::block_exits(reached, block);
                reached.pop_level()?;
                outcome?;
                self.cache.put(block.id(), key, exits.clone());
                exits
            }
        };

        let mut expanded = Vec::with_capacity(exits.len());
        let reducer = self.cpa.reducer.as_deref().ok_or(ConfigError::MissingReducer)?;
        for (exit, exit_precision) in exits {
            let mut state = reducer.expand(entry, block, &exit)?;
            let state_precision = reducer.expand_precision(precision, block, &exit_precision)?;
            if self.options.rebuild_after_function_call() && self.cfa.is_function_exit(exit.location()) {
                state = reducer.rebuild_after_function_call(
                    entry,
                    entry.location(),
                    &state,
                    exit.location(),
                )?;
            }
            expanded.push((state, state_precision));
        }
        Ok(expanded)
    }

    /// Reached states at the block's return nodes, and targets anywhere in
    /// the block.
    fn block_exits(reached: &ReachedSet<S, P>, block: &Block) -> Vec<(S, P)> {
        let exits: IndexSet<(S, P)> = reached
            .entries()
            .filter(|(id, state, _)| {
                block.is_return_node(state.location()) || reached.arg().is_target(*id)
            })
            .map(|(_, state, precision)| (state.clone(), precision.clone()))
            .collect();
        exits.into_iter().collect()
    }

    fn is_subsumed(&self, reached: &ReachedSet<S, P>, state: &S, precision: &P) -> Result<bool, EngineError> {
        let candidates: Vec<&S> = reached
            .reached_at(state.location())
            .into_iter()
            .filter(|&other| reached.arg().may_cover(other))
            .filter_map(|other| reached.arg().state(other))
            .collect();
        Ok(self.cpa.stop.stop(state, &candidates, precision)?)
    }

    /// Merge `successor` into the reached states at its location, then add it
    /// unless it is stopped. Returns the handle of the popped state, which
    /// changes when the popped state itself was merged.
    fn merge_and_stop(
        &mut self,
        reached: &mut ReachedSet<S, P>,
        mut parent: ArgStateId,
        successor: S,
        precision: P,
    ) -> Result<ArgStateId, EngineError> {
        let location = successor.location();
        let mut absorbed = false;

        if let Merge::Join(operator) = &self.cpa.merge {
            for other in reached.reached_at(location) {
                if !reached.arg().may_cover(other) {
                    continue;
                }
                let Some(other_state) = reached.arg().state(other).cloned() else {
                    continue;
                };
                let merged = operator.merge(&successor, &other_state, &precision)?;
                self.stats.merges += 1;
                if merged == other_state {
                    continue;
                }
                trace!(state = %other, "merged successor into reached state");
                reached.remove(other);
                let replacement = reached.arg_mut().add_root(merged);
                reached.arg_mut().replace_in_arg_with(other, replacement)?;
                if other == parent {
                    parent = replacement;
                } else if !reached.arg().is_transitive_child_of(parent, replacement) {
                    reached.arg_mut().add_parent(replacement, parent)?;
                }
                reached.add(replacement, precision.clone());
                absorbed = true;
            }
        }

        if self.is_subsumed(reached, &successor, &precision)? {
            self.stats.stops += 1;
            if absorbed {
                // the merged state already carries the successor's parent
                return Ok(parent);
            }
            let coverer = self.find_coverer(reached, &successor, &precision)?;
            if let Some(by) = coverer {
                let child = reached.arg_mut().add_child(successor, parent)?;
                reached.arg_mut().set_covered(child, by)?;
                trace!(state = %child, covered_by = %by, "successor covered");
            }
            return Ok(parent);
        }

        let child = reached.arg_mut().add_child(successor, parent)?;
        reached.add(child, precision);
        trace!(state = %child, %location, "successor reached");
        Ok(parent)
    }

    /// The oldest reached state that alone stops `state`.
    fn find_coverer(
        &self,
        reached: &ReachedSet<S, P>,
        state: &S,
        precision: &P,
    ) -> Result<Option<ArgStateId>, EngineError> {
        for other in reached.reached_at(state.location()) {
            if !reached.arg().may_cover(other) {
                continue;
            }
            let Some(other_state) = reached.arg().state(other) else {
                continue;
            };
            if self.cpa.stop.stop(state, &[other_state], precision)? {
                return Ok(Some(other));
            }
        }
        Ok(None)
    }
}

impl<S, P> std::fmt::Debug for Engine<'_, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cpa", &self.cpa)
            .field("options", &self.options)
            .field("summaries", &self.summaries)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
