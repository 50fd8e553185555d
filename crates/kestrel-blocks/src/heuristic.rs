use std::collections::{BTreeMap, BTreeSet};

use kestrel_cfa::{Cfa, CfaNode, CfaTraversal, EdgeKind};
use tracing::{debug, warn};

use crate::{BlockPartitioning, BlockPartitioningBuilder, PartitionError};

/// Decides which nodes start a block and what the block contains.
pub trait PartitioningHeuristic {
    fn name(&self) -> &'static str;

    fn should_be_cached(&self, cfa: &Cfa, node: CfaNode) -> bool;

    /// The intraprocedural node set of the block starting at `node`, or
    /// `None` when no block can be formed there.
    fn block_for_node(&self, cfa: &Cfa, node: CfaNode) -> Option<BTreeSet<CfaNode>>;

    /// Visit every function reachable from the program entry and register the
    /// block of each node this heuristic selects.
    fn build_partitioning(&self, cfa: &Cfa) -> BlockPartitioning {
        let mut builder = BlockPartitioningBuilder::new(cfa);
        for node in select_block_starts(cfa) {
            if !self.should_be_cached(cfa, node) {
                continue;
            }
            match self.block_for_node(cfa, node) {
                Some(nodes) => {
                    builder.add_block(nodes);
                }
                None => debug!(heuristic = self.name(), %node, "no block for node"),
            }
        }
        builder.build()
    }
}

/// Depth-first order over all nodes reachable from the program entry.
///
/// Call edges are not followed; the call-to-return edge is followed instead
/// and the callee entry is pushed as a further root, so every function is
/// visited intraprocedurally.
pub fn select_block_starts(cfa: &Cfa) -> Vec<CfaNode> {
    let traversal = CfaTraversal::dfs().ignore_function_calls();
    let entry = cfa.main_entry();
    let mut seen = BTreeSet::from([entry]);
    let mut stack = vec![entry];
    let mut order = Vec::new();
    while let Some(node) = stack.pop() {
        order.push(node);
        let callees = cfa
            .leaving_edges(node)
            .filter(|&edge| cfa.edge_kind(edge) == EdgeKind::FunctionCall)
            .filter_map(|edge| cfa.target(edge));
        for next in traversal.successors_of(cfa, node).chain(callees) {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    order
}

fn function_body(cfa: &Cfa, entry: CfaNode) -> BTreeSet<CfaNode> {
    CfaTraversal::dfs()
        .ignore_function_calls()
        .collect_nodes_reachable_from(cfa, entry)
}

/// One block per function body.
#[derive(Clone, Copy, Debug, Default)]
pub struct FunctionPartitioning;

impl PartitioningHeuristic for FunctionPartitioning {
    fn name(&self) -> &'static str {
        "function"
    }

    fn should_be_cached(&self, cfa: &Cfa, node: CfaNode) -> bool {
        cfa.is_function_entry(node)
    }

    fn block_for_node(&self, cfa: &Cfa, node: CfaNode) -> Option<BTreeSet<CfaNode>> {
        self.should_be_cached(cfa, node)
            .then(|| function_body(cfa, node))
    }
}

/// One block per single-header loop, plus the whole main body.
#[derive(Clone, Debug)]
pub struct LoopPartitioning {
    bodies: BTreeMap<CfaNode, BTreeSet<CfaNode>>,
    heads: BTreeSet<CfaNode>,
}

impl LoopPartitioning {
    /// Index the loops of `cfa`. Multi-header loops are skipped, or rejected
    /// when `reject_multi_header_loops` is set.
    pub fn new(cfa: &Cfa, reject_multi_header_loops: bool) -> Result<Self, PartitionError> {
        let structure = cfa.loop_structure();
        let mut bodies = BTreeMap::new();
        for lp in structure.loops() {
            if lp.is_multi_header() {
                if reject_multi_header_loops {
                    return Err(PartitionError::UnsupportedLoop {
                        id: lp.id(),
                        heads: lp.heads().iter().copied().collect(),
                    });
                }
                warn!(loop_id = %lp.id(), heads = lp.heads().len(), "skipping multi-header loop");
                continue;
            }
            for &head in lp.heads() {
                bodies
                    .entry(head)
                    .or_insert_with(BTreeSet::new)
                    .extend(lp.nodes().iter().copied());
            }
        }
        Ok(Self {
            bodies,
            heads: structure.all_loop_heads(),
        })
    }

    fn has_blank_edge_from_loop(&self, cfa: &Cfa, node: CfaNode) -> bool {
        cfa.entering_edges(node).any(|edge| {
            cfa.edge_kind(edge) == EdgeKind::Blank
                && cfa.source(edge).is_some_and(|source| self.heads.contains(&source))
        })
    }

    fn is_self_loop(cfa: &Cfa, node: CfaNode) -> bool {
        cfa.num_leaving_edges(node) == 1 && cfa.successors(node).all(|succ| succ == node)
    }

    /// Pull in blank predecessors of the header that precede the loop.
    fn insert_loop_start_states(cfa: &Cfa, body: &mut BTreeSet<CfaNode>, head: CfaNode) {
        let starts: Vec<CfaNode> = cfa
            .entering_edges(head)
            .filter(|&edge| cfa.edge_kind(edge) == EdgeKind::Blank)
            .filter_map(|edge| cfa.source(edge))
            .collect();
        body.extend(starts);
    }

    /// Add every node the loop exits to, then everything that flows into
    /// those exits, so the block keeps a single exit frontier even when a
    /// `break` branch computes something before leaving.
    fn insert_loop_return_states(cfa: &Cfa, body: &mut BTreeSet<CfaNode>) {
        let backwards = CfaTraversal::dfs().ignore_function_calls().backwards();
        let mut worklist: Vec<CfaNode> = body
            .iter()
            .flat_map(|&node| cfa.leaving_edges(node))
            .filter(|&edge| cfa.edge_kind(edge) != EdgeKind::FunctionCall)
            .filter_map(|edge| cfa.target(edge))
            .filter(|target| !body.contains(target))
            .collect();
        while let Some(node) = worklist.pop() {
            if body.insert(node) {
                worklist.extend(backwards.successors_of(cfa, node));
            }
        }
    }
}

impl PartitioningHeuristic for LoopPartitioning {
    fn name(&self) -> &'static str {
        "loop"
    }

    fn should_be_cached(&self, cfa: &Cfa, node: CfaNode) -> bool {
        if cfa.is_main_entry(node) {
            return true;
        }
        self.heads.contains(&node)
            && !self.has_blank_edge_from_loop(cfa, node)
            && !Self::is_self_loop(cfa, node)
    }

    fn block_for_node(&self, cfa: &Cfa, node: CfaNode) -> Option<BTreeSet<CfaNode>> {
        if cfa.is_main_entry(node) {
            return Some(function_body(cfa, node));
        }
        let mut body = self.bodies.get(&node)?.clone();
        Self::insert_loop_start_states(cfa, &mut body, node);
        Self::insert_loop_return_states(cfa, &mut body);
        Some(body)
    }
}

/// Function blocks and loop blocks; a node selected by both gets the
/// function block.
#[derive(Clone, Debug)]
pub struct FunctionAndLoopPartitioning {
    functions: FunctionPartitioning,
    loops: LoopPartitioning,
}

impl FunctionAndLoopPartitioning {
    pub fn new(cfa: &Cfa, reject_multi_header_loops: bool) -> Result<Self, PartitionError> {
        Ok(Self {
            functions: FunctionPartitioning,
            loops: LoopPartitioning::new(cfa, reject_multi_header_loops)?,
        })
    }
}

impl PartitioningHeuristic for FunctionAndLoopPartitioning {
    fn name(&self) -> &'static str {
        "function-and-loop"
    }

    fn should_be_cached(&self, cfa: &Cfa, node: CfaNode) -> bool {
        self.functions.should_be_cached(cfa, node) || self.loops.should_be_cached(cfa, node)
    }

    fn block_for_node(&self, cfa: &Cfa, node: CfaNode) -> Option<BTreeSet<CfaNode>> {
        if self.functions.should_be_cached(cfa, node) {
            self.functions.block_for_node(cfa, node)
        } else {
            self.loops.block_for_node(cfa, node)
        }
    }
}
