use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::algo::dominators::{self, Dominators};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::{Cfa, CfaEdge, CfaNode, CfaTraversal};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoopId(pub(crate) usize);

impl LoopId {
    pub fn raw(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A cyclic region of one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    id: LoopId,
    function: String,
    heads: BTreeSet<CfaNode>,
    nodes: BTreeSet<CfaNode>,
    incoming: BTreeSet<CfaEdge>,
    outgoing: BTreeSet<CfaEdge>,
}

impl Loop {
    pub fn id(&self) -> LoopId {
        self.id
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn heads(&self) -> &BTreeSet<CfaNode> {
        &self.heads
    }

    pub fn nodes(&self) -> &BTreeSet<CfaNode> {
        &self.nodes
    }

    /// Intraprocedural edges entering the loop from outside.
    pub fn incoming_edges(&self) -> &BTreeSet<CfaEdge> {
        &self.incoming
    }

    /// Intraprocedural edges leaving the loop.
    pub fn outgoing_edges(&self) -> &BTreeSet<CfaEdge> {
        &self.outgoing
    }

    pub fn is_multi_header(&self) -> bool {
        self.heads.len() > 1
    }
}

/// All loops of a [`Cfa`].
///
/// Reducible loops are natural loops found through dominator back edges, one
/// per header. Every strongly connected region entered at more than one node
/// is recorded as a multi-header loop.
#[derive(Clone, Debug, Default)]
pub struct LoopStructure {
    loops: Vec<Loop>,
}

impl LoopStructure {
    pub(crate) fn compute(cfa: &Cfa) -> Self {
        let traversal = CfaTraversal::dfs().ignore_function_calls();
        let mut regions: Vec<(String, BTreeSet<CfaNode>, BTreeSet<CfaNode>)> = Vec::new();

        for (name, info) in cfa.functions() {
            let reachable = traversal.collect_nodes_reachable_from(cfa, info.entry);
            let mut graph = DiGraphMap::<CfaNode, ()>::new();
            for &node in &reachable {
                graph.add_node(node);
            }
            for &node in &reachable {
                for next in traversal.successors_of(cfa, node) {
                    graph.add_edge(node, next, ());
                }
            }

            let doms = dominators::simple_fast(&graph, info.entry);
            let mut natural: BTreeMap<CfaNode, BTreeSet<CfaNode>> = BTreeMap::new();
            for (latch, header, _) in graph.all_edges() {
                if !dominates(&doms, header, latch) {
                    continue;
                }
                let body = natural
                    .entry(header)
                    .or_insert_with(|| BTreeSet::from([header]));
                let mut stack = vec![latch];
                while let Some(node) = stack.pop() {
                    if body.insert(node) {
                        stack.extend(graph.neighbors_directed(node, Direction::Incoming));
                    }
                }
            }
            for (header, body) in natural {
                regions.push((name.to_string(), BTreeSet::from([header]), body));
            }

            for component in tarjan_scc(&graph) {
                if component.len() < 2 {
                    continue;
                }
                let members: BTreeSet<CfaNode> = component.into_iter().collect();
                let entries: BTreeSet<CfaNode> = members
                    .iter()
                    .copied()
                    .filter(|&node| {
                        node == info.entry
                            || graph
                                .neighbors_directed(node, Direction::Incoming)
                                .any(|pred| !members.contains(&pred))
                    })
                    .collect();
                if entries.len() > 1 {
                    regions.push((name.to_string(), entries, members));
                }
            }
        }

        let loops = regions
            .into_iter()
            .enumerate()
            .map(|(index, (function, heads, nodes))| {
                let mut incoming = BTreeSet::new();
                let mut outgoing = BTreeSet::new();
                for &node in &nodes {
                    for edge in cfa.entering_edges(node) {
                        let from_outside =
                            cfa.source(edge).is_some_and(|source| !nodes.contains(&source));
                        if traversal.follows(cfa, edge) && from_outside {
                            incoming.insert(edge);
                        }
                    }
                    for edge in cfa.leaving_edges(node) {
                        let to_outside =
                            cfa.target(edge).is_some_and(|target| !nodes.contains(&target));
                        if traversal.follows(cfa, edge) && to_outside {
                            outgoing.insert(edge);
                        }
                    }
                }
                Loop {
                    id: LoopId(index),
                    function,
                    heads,
                    nodes,
                    incoming,
                    outgoing,
                }
            })
            .collect();
        Self { loops }
    }

    pub fn loops(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter()
    }

    pub fn get(&self, id: LoopId) -> Option<&Loop> {
        self.loops.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn all_loop_heads(&self) -> BTreeSet<CfaNode> {
        self.loops
            .iter()
            .flat_map(|l| l.heads.iter().copied())
            .collect()
    }

    pub fn is_loop_head(&self, node: CfaNode) -> bool {
        self.loops.iter().any(|l| l.heads.contains(&node))
    }

    /// Loops that have `node` among their heads.
    pub fn loops_with_head(&self, node: CfaNode) -> impl Iterator<Item = &Loop> {
        self.loops.iter().filter(move |l| l.heads.contains(&node))
    }
}

fn dominates(doms: &Dominators<CfaNode>, dominator: CfaNode, node: CfaNode) -> bool {
    doms.dominators(node)
        .is_some_and(|mut chain| chain.any(|d| d == dominator))
}
