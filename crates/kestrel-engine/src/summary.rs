//! Precomputed function and loop summaries.
//!
//! Stores are filled by an external synthesis pass and only read during
//! exploration, so they are shared behind [`Arc`] without locking.

use std::any::Any;
use std::hash::Hash;
use std::sync::Arc;

use kestrel_cfa::{CfaEdge, LoopId};
use rustc_hash::FxHashMap;

use crate::CpaError;

/// An opaque summary value. Domains downcast it to their own type.
#[derive(Clone)]
pub struct SummaryInstance(Arc<dyn Any + Send + Sync>);

impl SummaryInstance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for SummaryInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SummaryInstance(..)")
    }
}

pub trait FunctionSummaryStore {
    fn query(&self, function: &str) -> Option<SummaryInstance>;
}

pub trait LoopSummaryStore {
    fn query(&self, id: LoopId) -> Option<SummaryInstance>;
}

/// Append-only keyed summary storage.
#[derive(Debug)]
pub struct InMemorySummaryStore<K> {
    entries: FxHashMap<K, SummaryInstance>,
}

impl<K> Default for InMemorySummaryStore<K> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K: Hash + Eq> InMemorySummaryStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `summary` under `key`. An existing entry is never replaced;
    /// returns whether the summary was stored.
    pub fn insert(&mut self, key: K, summary: SummaryInstance) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, summary);
        true
    }

    pub fn get(&self, key: &K) -> Option<&SummaryInstance> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FunctionSummaryStore for InMemorySummaryStore<String> {
    fn query(&self, function: &str) -> Option<SummaryInstance> {
        self.entries.get(function).cloned()
    }
}

impl LoopSummaryStore for InMemorySummaryStore<LoopId> {
    fn query(&self, id: LoopId) -> Option<SummaryInstance> {
        self.entries.get(&id).cloned()
    }
}

/// Every summary store the engine consults, by kind.
#[derive(Clone, Default)]
pub struct SummaryProvider {
    function: Vec<Arc<dyn FunctionSummaryStore>>,
    internal_loop: Vec<Arc<dyn LoopSummaryStore>>,
    external_loop: Vec<Arc<dyn LoopSummaryStore>>,
}

impl SummaryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function_store(mut self, store: Arc<dyn FunctionSummaryStore>) -> Self {
        self.function.push(store);
        self
    }

    pub fn with_internal_loop_store(mut self, store: Arc<dyn LoopSummaryStore>) -> Self {
        self.internal_loop.push(store);
        self
    }

    pub fn with_external_loop_store(mut self, store: Arc<dyn LoopSummaryStore>) -> Self {
        self.external_loop.push(store);
        self
    }

    pub fn function_summaries(&self, function: &str) -> Vec<SummaryInstance> {
        self.function.iter().filter_map(|s| s.query(function)).collect()
    }

    pub fn internal_loop_summaries(&self, id: LoopId) -> Vec<SummaryInstance> {
        self.internal_loop.iter().filter_map(|s| s.query(id)).collect()
    }

    pub fn external_loop_summaries(&self, id: LoopId) -> Vec<SummaryInstance> {
        self.external_loop.iter().filter_map(|s| s.query(id)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.function.is_empty() && self.internal_loop.is_empty() && self.external_loop.is_empty()
    }
}

impl std::fmt::Debug for SummaryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryProvider")
            .field("function", &self.function.len())
            .field("internal_loop", &self.internal_loop.len())
            .field("external_loop", &self.external_loop.len())
            .finish()
    }
}

/// The capability of a state to have summaries applied in place of
/// exploring a bounded region.
pub trait SummaryApplicator<S> {
    fn supports(&self, state: &S) -> bool;

    /// Successors of `state` after the called function, from its summaries.
    fn apply_function_summary(
        &self,
        state: &S,
        summaries: &[SummaryInstance],
        entry: CfaEdge,
        exits: &[CfaEdge],
    ) -> Result<Vec<S>, CpaError>;

    /// States after one abstract pass through the loop body, given every
    /// internal summary recorded for the loop.
    fn apply_internal_loop_summary(
        &self,
        state: &S,
        summaries: &[SummaryInstance],
        entry: CfaEdge,
    ) -> Result<Vec<S>, CpaError>;

    /// States after the whole loop, each paired with the exit edge taken.
    fn apply_external_loop_summary(
        &self,
        state: &S,
        summaries: &[SummaryInstance],
        entry: CfaEdge,
        exits: &[CfaEdge],
    ) -> Result<Vec<(CfaEdge, S)>, CpaError>;
}
