use std::fmt;

use petgraph::graph::NodeIndex;

/// A program location.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CfaNode(pub(crate) NodeIndex);

impl CfaNode {
    /// return raw node number as usize
    pub fn raw(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for CfaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0.index())
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum NodeKind {
    Plain,
    FunctionEntry,
    FunctionExit,
}

#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub(crate) function: String,
    pub(crate) kind: NodeKind,
}

impl NodeInfo {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}
