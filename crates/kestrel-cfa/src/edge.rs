use std::fmt;

use petgraph::graph::EdgeIndex;
use smallvec::SmallVec;

/// An instruction between two program locations.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CfaEdge(pub(crate) EdgeIndex);

impl CfaEdge {
    pub fn raw(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0.index())
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum EdgeKind {
    Blank,
    Statement,
    Assume,
    Declaration,
    /// Call site to callee entry.
    FunctionCall,
    /// Callee exit to return site.
    FunctionReturn,
    /// Call site to return site, bypassing the callee.
    CallToReturn,
}

impl EdgeKind {
    /// Whether the edge crosses a function boundary.
    pub fn is_interprocedural(self) -> bool {
        matches!(self, EdgeKind::FunctionCall | EdgeKind::FunctionReturn)
    }
}

/// A program variable referenced by an edge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReferencedVariable {
    name: String,
}

impl ReferencedVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ReferencedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for ReferencedVariable {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Clone, Debug)]
pub struct EdgeInfo {
    pub(crate) kind: EdgeKind,
    pub(crate) description: String,
    pub(crate) variables: SmallVec<[ReferencedVariable; 2]>,
}

impl EdgeInfo {
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Variables read or written by this edge. For a call edge these are the
    /// variables occurring in the arguments.
    pub fn variables(&self) -> &[ReferencedVariable] {
        &self.variables
    }
}
