use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;

use crate::{CfaEdge, CfaNode, EdgeInfo, EdgeKind, LoopStructure, NodeInfo, NodeKind};

/// Entry and exit location of one function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub entry: CfaNode,
    pub exit: CfaNode,
}

/// An immutable control-flow automaton over all functions of a program.
#[derive(Clone, Debug)]
pub struct Cfa {
    pub(crate) graph: DiGraph<NodeInfo, EdgeInfo>,
    pub(crate) functions: IndexMap<String, FunctionInfo>,
    pub(crate) main: String,
    pub(crate) loops: LoopStructure,
}

impl Cfa {
    pub fn main_function(&self) -> &str {
        &self.main
    }

    /// The program entry location.
    pub fn main_entry(&self) -> CfaNode {
        self.functions[self.main.as_str()].entry
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &FunctionInfo)> {
        self.functions.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = CfaNode> + '_ {
        self.graph.node_indices().map(CfaNode)
    }

    pub fn node(&self, node: CfaNode) -> &NodeInfo {
        &self.graph[node.0]
    }

    pub fn function_name(&self, node: CfaNode) -> &str {
        &self.graph[node.0].function
    }

    pub fn is_function_entry(&self, node: CfaNode) -> bool {
        self.graph[node.0].kind == NodeKind::FunctionEntry
    }

    pub fn is_function_exit(&self, node: CfaNode) -> bool {
        self.graph[node.0].kind == NodeKind::FunctionExit
    }

    /// Whether `node` is the entry location of the main function.
    pub fn is_main_entry(&self, node: CfaNode) -> bool {
        self.is_function_entry(node) && self.function_name(node) == self.main
    }

    /// Whether `node` is the exit location of the main function.
    pub fn is_main_exit(&self, node: CfaNode) -> bool {
        self.is_function_exit(node) && self.function_name(node) == self.main
    }

    pub fn edge(&self, edge: CfaEdge) -> &EdgeInfo {
        &self.graph[edge.0]
    }

    pub fn edge_kind(&self, edge: CfaEdge) -> EdgeKind {
        self.graph[edge.0].kind
    }

    pub fn source(&self, edge: CfaEdge) -> Option<CfaNode> {
        self.endpoints(edge).map(|(source, _)| source)
    }

    pub fn target(&self, edge: CfaEdge) -> Option<CfaNode> {
        self.endpoints(edge).map(|(_, target)| target)
    }

    /// Source and target of `edge`, or `None` for an edge of another CFA.
    pub fn endpoints(&self, edge: CfaEdge) -> Option<(CfaNode, CfaNode)> {
        self.graph
            .edge_endpoints(edge.0)
            .map(|(source, target)| (CfaNode(source), CfaNode(target)))
    }

    /// Edges leaving `node`, in insertion order.
    pub fn leaving_edges(&self, node: CfaNode) -> impl Iterator<Item = CfaEdge> + '_ {
        self.sorted_edges(node, Direction::Outgoing).into_iter()
    }

    /// Edges entering `node`, in insertion order.
    pub fn entering_edges(&self, node: CfaNode) -> impl Iterator<Item = CfaEdge> + '_ {
        self.sorted_edges(node, Direction::Incoming).into_iter()
    }

    fn sorted_edges(&self, node: CfaNode, direction: Direction) -> Vec<CfaEdge> {
        let mut edges: Vec<CfaEdge> = self
            .graph
            .edges_directed(node.0, direction)
            .map(|edge| CfaEdge(edge.id()))
            .collect();
        edges.sort();
        edges
    }

    pub fn num_leaving_edges(&self, node: CfaNode) -> usize {
        self.graph.edges_directed(node.0, Direction::Outgoing).count()
    }

    pub fn num_entering_edges(&self, node: CfaNode) -> usize {
        self.graph.edges_directed(node.0, Direction::Incoming).count()
    }

    pub fn successors(&self, node: CfaNode) -> impl Iterator<Item = CfaNode> + '_ {
        self.leaving_edges(node).filter_map(|edge| self.target(edge))
    }

    pub fn predecessors(&self, node: CfaNode) -> impl Iterator<Item = CfaNode> + '_ {
        self.entering_edges(node).filter_map(|edge| self.source(edge))
    }

    /// The call-to-return edge entering a return site, if `node` is one.
    pub fn entering_summary_edge(&self, node: CfaNode) -> Option<CfaEdge> {
        self.entering_edges(node)
            .find(|&edge| self.edge_kind(edge) == EdgeKind::CallToReturn)
    }

    /// The call-to-return edge that accompanies a function call edge.
    pub fn summary_edge_of_call(&self, call: CfaEdge) -> Option<CfaEdge> {
        if self.graph.edge_weight(call.0)?.kind != EdgeKind::FunctionCall {
            return None;
        }
        self.leaving_edges(self.source(call)?)
            .find(|&edge| self.edge_kind(edge) == EdgeKind::CallToReturn)
    }

    pub fn loop_structure(&self) -> &LoopStructure {
        &self.loops
    }
}
