use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use kestrel_blocks::BlockId;
use kestrel_cfa::CfaNode;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::{AbstractState, Arg, ArgError, ArgStateId, Precision};

/// Order in which waiting states are popped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaitlistOrder {
    /// First in, first out.
    #[default]
    Bfs,
    /// Last in, first out.
    Dfs,
}

/// One exploration context. The base level holds the whole analysis; each
/// further level explores one block from a reduced entry state.
#[derive(Clone, Debug)]
struct Level<P> {
    block: Option<BlockId>,
    entry: Option<ArgStateId>,
    reached: IndexMap<ArgStateId, P>,
    by_location: FxHashMap<CfaNode, IndexSet<ArgStateId>>,
    waitlist: VecDeque<ArgStateId>,
    waiting: FxHashSet<ArgStateId>,
    last: Option<ArgStateId>,
}

impl<P> Level<P> {
    fn new(block: Option<BlockId>, entry: Option<ArgStateId>) -> Self {
        Self {
            block,
            entry,
            reached: IndexMap::new(),
            by_location: FxHashMap::default(),
            waitlist: VecDeque::new(),
            waiting: FxHashSet::default(),
            last: None,
        }
    }
}

/// Explored states with their precisions, split into settled states and a
/// waitlist, on top of the [`Arg`] that owns the states themselves.
///
/// Every query is scoped to the innermost level.
#[derive(Clone, Debug)]
pub struct ReachedSet<S, P> {
    arg: Arg<S>,
    levels: Vec<Level<P>>,
    order: WaitlistOrder,
}

impl<S: AbstractState, P: Precision> Default for ReachedSet<S, P> {
    fn default() -> Self {
        Self::new(WaitlistOrder::default())
    }
}

impl<S: AbstractState, P: Precision> ReachedSet<S, P> {
    pub fn new(order: WaitlistOrder) -> Self {
        Self {
            arg: Arg::new(),
            levels: vec![Level::new(None, None)],
            order,
        }
    }

    /// A reached set holding only `state` as root.
    pub fn with_initial_state(state: S, precision: P, order: WaitlistOrder) -> Self {
        let mut reached = Self::new(order);
        reached.add_root(state, precision);
        reached
    }

    pub fn arg(&self) -> &Arg<S> {
        &self.arg
    }

    pub fn arg_mut(&mut self) -> &mut Arg<S> {
        &mut self.arg
    }

    pub fn order(&self) -> WaitlistOrder {
        self.order
    }

    /// Add `state` as a new graph root and mark it reached and waiting.
    pub fn add_root(&mut self, state: S, precision: P) -> ArgStateId {
        let id = self.arg.add_root(state);
        self.add(id, precision);
        id
    }

    /// Mark an existing graph state as reached and waiting.
    pub fn add(&mut self, id: ArgStateId, precision: P) {
        let Some(location) = self.arg.state(id).map(AbstractState::location) else {
            return;
        };
        let level = self.top_mut();
        if level.reached.insert(id, precision).is_none() {
            level.by_location.entry(location).or_default().insert(id);
            level.waitlist.push_back(id);
            level.waiting.insert(id);
        }
        level.last = Some(id);
    }

    pub fn pop_from_waitlist(&mut self) -> Option<ArgStateId> {
        let order = self.order;
        let level = self.top_mut();
        let id = match order {
            WaitlistOrder::Bfs => level.waitlist.pop_front(),
            WaitlistOrder::Dfs => level.waitlist.pop_back(),
        }?;
        level.waiting.remove(&id);
        trace!(state = %id, "popped from waitlist");
        Some(id)
    }

    pub fn has_waiting_state(&self) -> bool {
        !self.top().waitlist.is_empty()
    }

    pub fn waitlist_len(&self) -> usize {
        self.top().waitlist.len()
    }

    pub fn waitlist(&self) -> impl Iterator<Item = ArgStateId> + '_ {
        self.top().waitlist.iter().copied()
    }

    pub fn is_waiting(&self, id: ArgStateId) -> bool {
        self.top().waiting.contains(&id)
    }

    /// Put a reached state back on the waitlist. Does nothing for states
    /// that are not reached or already waiting.
    pub fn re_add_to_waitlist(&mut self, id: ArgStateId) {
        if !self.contains(id) {
            return;
        }
        let level = self.top_mut();
        if level.waiting.insert(id) {
            level.waitlist.push_back(id);
        }
    }

    /// Forget `id` as reached. The graph keeps the state.
    pub fn remove(&mut self, id: ArgStateId) -> Option<P> {
        let location = self.arg.state(id).map(AbstractState::location);
        let level = self.top_mut();
        let precision = level.reached.shift_remove(&id)?;
        if let Some(at) = location.and_then(|loc| level.by_location.get_mut(&loc)) {
            at.shift_remove(&id);
        }
        if level.waiting.remove(&id) {
            level.waitlist.retain(|&waiting| waiting != id);
        }
        if level.last == Some(id) {
            level.last = level.reached.last().map(|(&last, _)| last);
        }
        Some(precision)
    }

    pub fn contains(&self, id: ArgStateId) -> bool {
        self.top().reached.contains_key(&id)
    }

    pub fn precision(&self, id: ArgStateId) -> Option<&P> {
        self.top().reached.get(&id)
    }

    pub fn update_precision(&mut self, id: ArgStateId, precision: P) -> bool {
        match self.top_mut().reached.get_mut(&id) {
            Some(slot) => {
                *slot = precision;
                true
            }
            None => false,
        }
    }

    /// Reached states at `location`, oldest first.
    pub fn reached_at(&self, location: CfaNode) -> Vec<ArgStateId> {
        self.top()
            .by_location
            .get(&location)
            .map(|at| at.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Reached states in insertion order.
    pub fn states(&self) -> impl Iterator<Item = ArgStateId> + '_ {
        self.top().reached.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (ArgStateId, &S, &P)> + '_ {
        self.top()
            .reached
            .iter()
            .filter_map(|(&id, precision)| Some((id, self.arg.state(id)?, precision)))
    }

    pub fn first_state(&self) -> Option<ArgStateId> {
        self.top().reached.first().map(|(&id, _)| id)
    }

    pub fn last_state(&self) -> Option<ArgStateId> {
        self.top().last
    }

    pub fn len(&self) -> usize {
        self.top().reached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top().reached.is_empty()
    }

    /// Uncovered target states among the reached states.
    pub fn targets(&self) -> impl Iterator<Item = ArgStateId> + '_ {
        self.states().filter(|&id| self.arg.is_target(id))
    }

    /// Open a level for exploring `block` from `state`, which becomes a new
    /// graph root.
    pub fn push_level(&mut self, state: S, precision: P, block: BlockId) -> ArgStateId {
        let id = self.arg.add_root(state);
        self.levels.push(Level::new(Some(block), Some(id)));
        self.add(id, precision);
        id
    }

    /// Close the innermost level and remove every graph state explored in
    /// it: its reached states and their successors, covered ones included.
    /// Returns `false` for the base level, which is never popped.
    pub fn pop_level(&mut self) -> Result<bool, ArgError> {
        if self.levels.len() < 2 {
            return Ok(false);
        }
        let Some(level) = self.levels.pop() else {
            return Ok(false);
        };
        let mut doomed: IndexSet<ArgStateId> = level.entry.into_iter().collect();
        for &id in level.reached.keys() {
            doomed.insert(id);
            doomed.extend(self.arg.children(id));
            doomed.extend(self.arg.covers(id));
        }
        trace!(removed = doomed.len(), "closing level");
        for id in doomed {
            // a merge may have replaced the entry
            if !self.arg.is_destroyed(id) {
                self.arg.remove_from_arg(id)?;
            }
        }
        Ok(true)
    }

    /// Number of block levels above the base level.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.top().block
    }

    /// Assign the block explored by the base level.
    pub fn set_base_block(&mut self, block: Option<BlockId>) {
        if let Some(base) = self.levels.first_mut() {
            base.block = block;
        }
    }

    /// The root state the innermost level was opened with.
    pub fn level_entry(&self) -> Option<ArgStateId> {
        self.top().entry
    }

    /// Blocks of all open levels, innermost last.
    pub fn blocks_on_stack(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.levels.iter().filter_map(|level| level.block)
    }

    fn top(&self) -> &Level<P> {
        // levels always holds the base level
        &self.levels[self.levels.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Level<P> {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }
}
