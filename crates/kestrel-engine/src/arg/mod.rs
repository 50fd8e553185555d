//! The abstract reachability graph.
//!
//! States live in an [`Arena`](crate::arena::Arena) and refer to each other by
//! [`ArgStateId`]. Parent/child edges form a DAG; the covering relation is a
//! separate set of edges from a covered state to the state subsuming it.
//! Removed states are tombstoned, never reused.

mod paths;

use indexmap::IndexSet;

use crate::arena::Arena;
use crate::{AbstractState, ArgError};

identifier! {
    /// Handle of a state in the [`Arg`]. Handles are ordered by creation.
    struct ArgStateId
}

impl ArgStateId {
    pub fn raw(self) -> usize {
        self.0.raw()
    }
}

impl std::fmt::Display for ArgStateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0.raw())
    }
}

#[derive(Clone, Debug)]
pub struct ArgNode<S> {
    state: S,
    parents: IndexSet<ArgStateId>,
    children: IndexSet<ArgStateId>,
    covered_by: Option<ArgStateId>,
    covers: IndexSet<ArgStateId>,
    may_cover: bool,
}

impl<S> ArgNode<S> {
    fn new(state: S) -> Self {
        Self {
            state,
            parents: IndexSet::new(),
            children: IndexSet::new(),
            covered_by: None,
            covers: IndexSet::new(),
            may_cover: true,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn parents(&self) -> &IndexSet<ArgStateId> {
        &self.parents
    }

    pub fn children(&self) -> &IndexSet<ArgStateId> {
        &self.children
    }

    pub fn covered_by(&self) -> Option<ArgStateId> {
        self.covered_by
    }

    pub fn covers(&self) -> &IndexSet<ArgStateId> {
        &self.covers
    }
}

#[derive(Clone, Debug)]
pub struct Arg<S> {
    nodes: Arena<ArgStateId, ArgNode<S>>,
}

impl<S> Default for Arg<S> {
    fn default() -> Self {
        Self {
            nodes: Arena::default(),
        }
    }
}

impl<S: AbstractState> Arg<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state without parents.
    pub fn add_root(&mut self, state: S) -> ArgStateId {
        self.nodes.alloc(ArgNode::new(state))
    }

    pub fn add_child(&mut self, state: S, parent: ArgStateId) -> Result<ArgStateId, ArgError> {
        self.live(parent)?;
        let child = self.nodes.alloc(ArgNode::new(state));
        self.add_parent(child, parent)?;
        Ok(child)
    }

    /// Link `child` under `parent`. Linking twice is a no-op.
    pub fn add_parent(&mut self, child: ArgStateId, parent: ArgStateId) -> Result<(), ArgError> {
        self.live(child)?;
        self.live_mut(parent)?.children.insert(child);
        self.live_mut(child)?.parents.insert(parent);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ArgStateId) -> Option<&ArgNode<S>> {
        self.nodes.get(id)
    }

    pub fn state(&self, id: ArgStateId) -> Option<&S> {
        self.nodes.get(id).map(|node| &node.state)
    }

    /// Live states in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ArgStateId> + '_ {
        self.nodes.iter().map(|(id, _)| id)
    }

    pub fn is_destroyed(&self, id: ArgStateId) -> bool {
        self.nodes.is_deleted(id)
    }

    pub fn parents(&self, id: ArgStateId) -> impl Iterator<Item = ArgStateId> + '_ {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.parents.iter().copied())
    }

    pub fn children(&self, id: ArgStateId) -> impl Iterator<Item = ArgStateId> + '_ {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.children.iter().copied())
    }

    pub fn covered_by(&self, id: ArgStateId) -> Option<ArgStateId> {
        self.nodes.get(id).and_then(|node| node.covered_by)
    }

    pub fn covers(&self, id: ArgStateId) -> impl Iterator<Item = ArgStateId> + '_ {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.covers.iter().copied())
    }

    pub fn is_covered(&self, id: ArgStateId) -> bool {
        self.covered_by(id).is_some()
    }

    /// Whether `id` may be used to cover other states: it is live, not
    /// covered itself, and refinement has not forbidden it.
    pub fn may_cover(&self, id: ArgStateId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.may_cover && node.covered_by.is_none())
    }

    /// Forbid `id` from covering states from now on.
    pub fn set_not_covering(&mut self, id: ArgStateId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.may_cover = false;
        }
    }

    /// A target state that is not covered.
    pub fn is_target(&self, id: ArgStateId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.covered_by.is_none() && node.state.is_target())
    }

    pub fn set_covered(&mut self, id: ArgStateId, by: ArgStateId) -> Result<(), ArgError> {
        if self.live(id)?.covered_by.is_some() {
            return Err(ArgError::AlreadyCovered(id));
        }
        if !self.live(by)?.may_cover || self.is_covered(by) {
            return Err(ArgError::NotCovering(by));
        }
        if id == by || self.covering_reaches(by, id) {
            return Err(ArgError::CoveringCycle { state: id, by });
        }
        self.live_mut(id)?.covered_by = Some(by);
        self.live_mut(by)?.covers.insert(id);
        Ok(())
    }

    pub fn uncover(&mut self, id: ArgStateId) -> Result<(), ArgError> {
        let Some(by) = self.live_mut(id)?.covered_by.take() else {
            return Ok(());
        };
        if let Some(node) = self.nodes.get_mut(by) {
            node.covers.shift_remove(&id);
        }
        Ok(())
    }

    /// Detach `id` from parents, children and the covering relation, then
    /// destroy it. Children left without parents are not removed.
    pub fn remove_from_arg(&mut self, id: ArgStateId) -> Result<(), ArgError> {
        let node = self.live(id)?;
        let parents: Vec<ArgStateId> = node.parents.iter().copied().collect();
        let children: Vec<ArgStateId> = node.children.iter().copied().collect();
        let covers: Vec<ArgStateId> = node.covers.iter().copied().collect();
        for parent in parents {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.shift_remove(&id);
            }
        }
        for child in children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.shift_remove(&id);
            }
        }
        for covered in covers {
            if let Some(c) = self.nodes.get_mut(covered) {
                c.covered_by = None;
            }
        }
        self.uncover(id)?;
        self.nodes.delete(id);
        Ok(())
    }

    /// Give `replacement` every parent, child and covered state of `id`, then
    /// destroy `id`.
    pub fn replace_in_arg_with(
        &mut self,
        id: ArgStateId,
        replacement: ArgStateId,
    ) -> Result<(), ArgError> {
        if self.is_covered(replacement) {
            return Err(ArgError::AlreadyCovered(replacement));
        }
        self.live(replacement)?;
        let node = self.live(id)?;
        let parents: Vec<ArgStateId> = node.parents.iter().copied().collect();
        let children: Vec<ArgStateId> = node.children.iter().copied().collect();
        let covers: Vec<ArgStateId> = node.covers.iter().copied().collect();
        self.uncover(id)?;

        for child in children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.shift_remove(&id);
            }
            self.add_parent(child, replacement)?;
        }
        for parent in parents {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.shift_remove(&id);
            }
            self.add_parent(replacement, parent)?;
        }
        for covered in covers {
            if let Some(c) = self.nodes.get_mut(covered) {
                c.covered_by = Some(replacement);
            }
            self.live_mut(replacement)?.covers.insert(covered);
        }
        self.nodes.delete(id);
        Ok(())
    }

    /// Whether following covering edges from `from` reaches `to`.
    fn covering_reaches(&self, from: ArgStateId, to: ArgStateId) -> bool {
        let mut current = Some(from);
        let mut steps = 0;
        while let Some(id) = current {
            if id == to {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return true;
            }
            current = self.covered_by(id);
        }
        false
    }

    /// Whether the covering relation over live states contains no cycle.
    pub fn covering_is_acyclic(&self) -> bool {
        self.ids().all(|id| match self.covered_by(id) {
            Some(by) => !self.covering_reaches(by, id),
            None => true,
        })
    }

    /// Check that every edge is mirrored on both ends and only connects live
    /// states, and that covering is acyclic.
    pub fn check_consistency(&self) -> Result<(), ArgError> {
        let inconsistent = |msg: String| Err(ArgError::Inconsistent(msg));
        for (id, node) in self.nodes.iter() {
            for &parent in &node.parents {
                match self.nodes.get(parent) {
                    Some(p) if p.children.contains(&id) => {}
                    _ => return inconsistent(format!("{parent} is not a parent of {id}")),
                }
            }
            for &child in &node.children {
                match self.nodes.get(child) {
                    Some(c) if c.parents.contains(&id) => {}
                    _ => return inconsistent(format!("{child} is not a child of {id}")),
                }
            }
            if let Some(by) = node.covered_by {
                match self.nodes.get(by) {
                    Some(b) if b.covers.contains(&id) => {}
                    _ => return inconsistent(format!("{id} is covered by {by} one-sidedly")),
                }
            }
            for &covered in &node.covers {
                if self.covered_by(covered) != Some(id) {
                    return inconsistent(format!("{id} covers {covered} one-sidedly"));
                }
            }
        }
        if !self.covering_is_acyclic() {
            return inconsistent("covering relation has a cycle".to_string());
        }
        Ok(())
    }

    fn live(&self, id: ArgStateId) -> Result<&ArgNode<S>, ArgError> {
        self.nodes.get(id).ok_or(ArgError::Destroyed(id))
    }

    fn live_mut(&mut self, id: ArgStateId) -> Result<&mut ArgNode<S>, ArgError> {
        self.nodes.get_mut(id).ok_or(ArgError::Destroyed(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_cfa::CfaNode;

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct Label(u32);

    impl AbstractState for Label {
        fn location(&self) -> CfaNode {
            unreachable!("labels have no location")
        }

        fn is_target(&self) -> bool {
            self.0 == 99
        }

        fn is_less_or_equal(&self, other: &Self) -> bool {
            self == other
        }
    }

    fn diamond() -> (Arg<Label>, [ArgStateId; 4]) {
        let mut arg = Arg::new();
        let root = arg.add_root(Label(0));
        let left = arg.add_child(Label(1), root).unwrap();
        let right = arg.add_child(Label(2), root).unwrap();
        let join = arg.add_child(Label(3), left).unwrap();
        arg.add_parent(join, right).unwrap();
        (arg, [root, left, right, join])
    }

    #[test]
    fn test_parent_child_links_are_mirrored() {
        let (arg, [root, left, right, join]) = diamond();
        assert_eq!(arg.children(root).collect::<Vec<_>>(), vec![left, right]);
        assert_eq!(arg.parents(join).collect::<Vec<_>>(), vec![left, right]);
        arg.check_consistency().unwrap();
    }

    #[test]
    fn test_covering_rejects_cycles_and_covered_coverers() {
        let (mut arg, [root, left, right, join]) = diamond();
        arg.set_covered(join, left).unwrap();
        assert!(matches!(arg.set_covered(join, right), Err(ArgError::AlreadyCovered(_))));
        assert!(matches!(arg.set_covered(right, join), Err(ArgError::NotCovering(_))));
        assert!(matches!(
            arg.set_covered(root, root),
            Err(ArgError::CoveringCycle { .. })
        ));
        assert!(!arg.may_cover(join));
        assert!(arg.covering_is_acyclic());
        arg.uncover(join).unwrap();
        assert_eq!(arg.covers(left).count(), 0);
    }

    #[test]
    fn test_not_covering_state_cannot_cover() {
        let (mut arg, [_, left, right, _]) = diamond();
        arg.set_not_covering(left);
        assert!(matches!(arg.set_covered(right, left), Err(ArgError::NotCovering(_))));
    }

    #[test]
    fn test_remove_from_arg_detaches_everything() {
        let (mut arg, [root, left, right, join]) = diamond();
        arg.set_covered(right, left).unwrap();
        arg.remove_from_arg(left).unwrap();
        assert!(arg.is_destroyed(left));
        assert_eq!(arg.children(root).collect::<Vec<_>>(), vec![right]);
        assert_eq!(arg.parents(join).collect::<Vec<_>>(), vec![right]);
        assert!(!arg.is_covered(right));
        assert_eq!(arg.len(), 3);
        arg.check_consistency().unwrap();
        assert!(matches!(arg.add_child(Label(5), left), Err(ArgError::Destroyed(_))));
    }

    #[test]
    fn test_replace_in_arg_moves_relations() {
        let (mut arg, [root, left, right, join]) = diamond();
        arg.set_covered(right, left).unwrap();
        let merged = arg.add_root(Label(7));
        arg.replace_in_arg_with(left, merged).unwrap();
        assert_eq!(arg.parents(merged).collect::<Vec<_>>(), vec![root]);
        assert_eq!(arg.children(merged).collect::<Vec<_>>(), vec![join]);
        assert_eq!(arg.covered_by(right), Some(merged));
        assert!(arg.is_destroyed(left));
        arg.check_consistency().unwrap();
    }

    #[test]
    fn test_covered_target_is_not_a_target() {
        let mut arg = Arg::new();
        let root = arg.add_root(Label(0));
        let error = arg.add_child(Label(99), root).unwrap();
        let other = arg.add_child(Label(99), root).unwrap();
        assert!(arg.is_target(error));
        arg.set_covered(other, error).unwrap();
        assert!(!arg.is_target(other));
    }
}
