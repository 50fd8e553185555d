use std::collections::{BTreeMap, BTreeSet};

use kestrel_cfa::{Cfa, CfaNode, CfaTraversal, EdgeKind, ReferencedVariable};
use tracing::{debug, trace};

use crate::{Block, BlockId, BlockPartitioning};

#[derive(Debug)]
struct Candidate {
    referenced_variables: BTreeSet<ReferencedVariable>,
    inner_function_calls: BTreeSet<CfaNode>,
    nodes: BTreeSet<CfaNode>,
    /// Call and return nodes; absent for callee bodies computed during the
    /// fixpoint, which are folded into callers but never become blocks.
    boundary: Option<(BTreeSet<CfaNode>, BTreeSet<CfaNode>)>,
}

/// Collects candidate blocks and closes them under inner function calls.
pub struct BlockPartitioningBuilder<'cfa> {
    cfa: &'cfa Cfa,
    candidates: BTreeMap<CfaNode, Candidate>,
}

impl<'cfa> BlockPartitioningBuilder<'cfa> {
    pub fn new(cfa: &'cfa Cfa) -> Self {
        Self {
            cfa,
            candidates: BTreeMap::new(),
        }
    }

    /// Register the block made of `nodes`.
    ///
    /// `nodes` must not contain the bodies of inner function calls; those are
    /// added by [`build`](Self::build). A node set without call nodes is not
    /// reachable from outside and is dropped. If another block is already
    /// registered under the same node the new one is dropped.
    pub fn add_block(&mut self, nodes: BTreeSet<CfaNode>) -> &mut Self {
        let call_nodes = self.collect_call_nodes(&nodes);
        let Some(register_node) = call_nodes
            .iter()
            .copied()
            .find(|&node| self.cfa.is_function_entry(node))
            .or_else(|| call_nodes.first().copied())
        else {
            debug!(size = nodes.len(), "dropping block without call nodes");
            return self;
        };
        if self
            .candidates
            .get(&register_node)
            .is_some_and(|c| c.boundary.is_some())
        {
            debug!(%register_node, "a block is already registered at this node");
            return self;
        }

        let return_nodes = self.collect_return_nodes(&nodes);
        trace!(%register_node, size = nodes.len(), "adding block");
        self.candidates.insert(
            register_node,
            Candidate {
                referenced_variables: self.collect_referenced_variables(&nodes),
                inner_function_calls: self.collect_inner_function_calls(&nodes),
                nodes,
                boundary: Some((call_nodes, return_nodes)),
            },
        );
        self
    }

    pub fn build(mut self) -> BlockPartitioning {
        let traversal = CfaTraversal::dfs().ignore_function_calls();
        'fixpoint: loop {
            let mut changed = false;
            let keys: Vec<CfaNode> = self.candidates.keys().copied().collect();
            for key in keys {
                let callees = self.candidates[&key].inner_function_calls.clone();
                for callee in callees {
                    if !self.candidates.contains_key(&callee) {
                        let nodes = traversal.collect_nodes_reachable_from(self.cfa, callee);
                        trace!(%callee, size = nodes.len(), "computing callee body");
                        let body = Candidate {
                            referenced_variables: self.collect_referenced_variables(&nodes),
                            inner_function_calls: self.collect_inner_function_calls(&nodes),
                            nodes,
                            boundary: None,
                        };
                        self.candidates.insert(callee, body);
                        continue 'fixpoint;
                    }
                    if callee == key {
                        continue;
                    }
                    let body = &self.candidates[&callee];
                    let variables = body.referenced_variables.clone();
                    let nodes = body.nodes.clone();
                    let Some(caller) = self.candidates.get_mut(&key) else {
                        continue;
                    };
                    let before = (caller.referenced_variables.len(), caller.nodes.len());
                    caller.referenced_variables.extend(variables);
                    caller.nodes.extend(nodes);
                    changed |= before != (caller.referenced_variables.len(), caller.nodes.len());
                }
            }
            if !changed {
                break;
            }
        }

        let blocks = self
            .candidates
            .into_iter()
            .filter_map(|(register_node, candidate)| {
                let (call_nodes, return_nodes) = candidate.boundary?;
                Some(Block {
                    id: BlockId(0),
                    register_node,
                    referenced_variables: candidate.referenced_variables,
                    call_nodes,
                    return_nodes,
                    inner_function_calls: candidate.inner_function_calls,
                    nodes: candidate.nodes,
                })
            })
            .collect();
        let partitioning = BlockPartitioning::new(blocks, self.cfa.main_entry());
        debug!(blocks = partitioning.len(), "built block partitioning");
        partitioning
    }

    fn collect_referenced_variables(&self, nodes: &BTreeSet<CfaNode>) -> BTreeSet<ReferencedVariable> {
        let mut result = BTreeSet::new();
        for &node in nodes {
            for edge in self.cfa.leaving_edges(node) {
                let inside = self
                    .cfa
                    .target(edge)
                    .is_some_and(|target| nodes.contains(&target));
                if inside || self.cfa.edge_kind(edge) == EdgeKind::FunctionCall {
                    result.extend(self.cfa.edge(edge).variables().iter().cloned());
                }
            }
        }
        result
    }

    fn collect_inner_function_calls(&self, nodes: &BTreeSet<CfaNode>) -> BTreeSet<CfaNode> {
        nodes
            .iter()
            .flat_map(|&node| self.cfa.leaving_edges(node))
            .filter(|&edge| self.cfa.edge_kind(edge) == EdgeKind::FunctionCall)
            .filter_map(|edge| self.cfa.target(edge))
            .collect()
    }

    fn collect_call_nodes(&self, nodes: &BTreeSet<CfaNode>) -> BTreeSet<CfaNode> {
        let mut result = BTreeSet::new();
        for &node in nodes {
            if self.cfa.is_main_entry(node) {
                result.insert(node);
                continue;
            }
            if let Some(summary) = self.cfa.entering_summary_edge(node) {
                // inner calls returning here do not make this a call node
                if self.cfa.source(summary).is_some_and(|caller| !nodes.contains(&caller)) {
                    result.insert(node);
                }
                continue;
            }
            if self
                .cfa
                .predecessors(node)
                .any(|pred| !nodes.contains(&pred))
            {
                result.insert(node);
            }
        }
        result
    }

    fn collect_return_nodes(&self, nodes: &BTreeSet<CfaNode>) -> BTreeSet<CfaNode> {
        let mut result = BTreeSet::new();
        for &node in nodes {
            if self.cfa.is_main_exit(node) {
                result.insert(node);
                continue;
            }
            for edge in self.cfa.leaving_edges(node) {
                let kind = self.cfa.edge_kind(edge);
                if kind == EdgeKind::CallToReturn
                    || self.cfa.target(edge).is_some_and(|target| nodes.contains(&target))
                {
                    continue;
                }
                if kind != EdgeKind::FunctionCall {
                    result.insert(node);
                    continue;
                }
                let Some(return_site) = self
                    .cfa
                    .summary_edge_of_call(edge)
                    .and_then(|summary| self.cfa.target(summary))
                else {
                    continue;
                };
                if !nodes.contains(&return_site) {
                    result.extend(
                        self.cfa
                            .entering_edges(return_site)
                            .filter(|&e| self.cfa.edge_kind(e) != EdgeKind::CallToReturn)
                            .filter_map(|e| self.cfa.source(e)),
                    );
                }
            }
        }
        result
    }
}
