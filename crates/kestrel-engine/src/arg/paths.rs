use indexmap::IndexSet;
use rustc_hash::FxHashSet;

use super::{Arg, ArgStateId};
use crate::AbstractState;

impl<S: AbstractState> Arg<S> {
    /// Every state lying on some parent-path from a root to `target`,
    /// `target` included, in discovery order.
    pub fn all_states_on_paths_to(&self, target: ArgStateId) -> IndexSet<ArgStateId> {
        let mut result = IndexSet::new();
        if self.node(target).is_none() {
            return result;
        }
        let mut worklist = vec![target];
        result.insert(target);
        while let Some(id) = worklist.pop() {
            for parent in self.parents(id) {
                if result.insert(parent) {
                    worklist.push(parent);
                }
            }
        }
        result
    }

    /// One root-to-`target` path, following the first parent at each step.
    pub fn one_path_to(&self, target: ArgStateId) -> Vec<ArgStateId> {
        let mut path = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = self.node(target).map(|_| target);
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            path.push(id);
            current = self.parents(id).next();
        }
        path.reverse();
        path
    }

    /// Whether `ancestor` can reach `id` through parent/child edges.
    pub fn is_transitive_child_of(&self, id: ArgStateId, ancestor: ArgStateId) -> bool {
        let mut seen = FxHashSet::default();
        let mut worklist: Vec<ArgStateId> = self.parents(id).collect();
        while let Some(current) = worklist.pop() {
            if current == ancestor {
                return true;
            }
            if seen.insert(current) {
                worklist.extend(self.parents(current));
            }
        }
        false
    }

    /// Every state below `id`, excluding `id`.
    pub fn subtree(&self, id: ArgStateId) -> IndexSet<ArgStateId> {
        let mut result = IndexSet::new();
        let mut worklist: Vec<ArgStateId> = self.children(id).collect();
        while let Some(current) = worklist.pop() {
            if current != id && result.insert(current) {
                worklist.extend(self.children(current));
            }
        }
        result
    }
}
