use std::collections::BTreeSet;

use crate::{Cfa, CfaEdge, CfaNode, EdgeKind};

/// Configurable depth-first traversal over a [`Cfa`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CfaTraversal {
    ignore_function_calls: bool,
    backwards: bool,
}

impl CfaTraversal {
    pub fn dfs() -> Self {
        Self::default()
    }

    /// Stay inside the current function: call and return edges are skipped,
    /// call-to-return edges are followed instead.
    pub fn ignore_function_calls(self) -> Self {
        Self {
            ignore_function_calls: true,
            ..self
        }
    }

    pub fn backwards(self) -> Self {
        Self {
            backwards: true,
            ..self
        }
    }

    /// Whether this traversal crosses `edge`.
    pub fn follows(self, cfa: &Cfa, edge: CfaEdge) -> bool {
        if self.ignore_function_calls {
            !cfa.edge_kind(edge).is_interprocedural()
        } else {
            cfa.edge_kind(edge) != EdgeKind::CallToReturn
        }
    }

    /// Nodes one step away from `node` in traversal direction.
    pub fn successors_of<'a>(
        self,
        cfa: &'a Cfa,
        node: CfaNode,
    ) -> impl Iterator<Item = CfaNode> + 'a {
        let this = self;
        let edges: Vec<CfaEdge> = if self.backwards {
            cfa.entering_edges(node).collect()
        } else {
            cfa.leaving_edges(node).collect()
        };
        edges
            .into_iter()
            .filter(move |&edge| this.follows(cfa, edge))
            .filter_map(move |edge| {
                if this.backwards {
                    cfa.source(edge)
                } else {
                    cfa.target(edge)
                }
            })
    }

    pub fn collect_nodes_reachable_from(self, cfa: &Cfa, start: CfaNode) -> BTreeSet<CfaNode> {
        let mut seen = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for next in self.successors_of(cfa, node) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }
}
