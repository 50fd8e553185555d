use std::collections::BTreeSet;
use std::fmt;

use kestrel_cfa::{CfaNode, ReferencedVariable};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A reduction unit: a function body or a loop body together with everything
/// it reaches through inner function calls.
///
/// The call-node set is never empty. Blocks are only created by
/// [`BlockPartitioningBuilder`](crate::BlockPartitioningBuilder).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) register_node: CfaNode,
    pub(crate) referenced_variables: BTreeSet<ReferencedVariable>,
    pub(crate) call_nodes: BTreeSet<CfaNode>,
    pub(crate) return_nodes: BTreeSet<CfaNode>,
    pub(crate) inner_function_calls: BTreeSet<CfaNode>,
    pub(crate) nodes: BTreeSet<CfaNode>,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The node this block was registered under.
    pub fn register_node(&self) -> CfaNode {
        self.register_node
    }

    /// Variables touched anywhere in the block, including inner calls.
    pub fn referenced_variables(&self) -> &BTreeSet<ReferencedVariable> {
        &self.referenced_variables
    }

    pub fn references(&self, variable: &str) -> bool {
        self.referenced_variables
            .iter()
            .any(|var| var.name() == variable)
    }

    pub fn call_nodes(&self) -> &BTreeSet<CfaNode> {
        &self.call_nodes
    }

    pub fn return_nodes(&self) -> &BTreeSet<CfaNode> {
        &self.return_nodes
    }

    /// Entry nodes of the functions called from inside the block.
    pub fn inner_function_calls(&self) -> &BTreeSet<CfaNode> {
        &self.inner_function_calls
    }

    pub fn nodes(&self) -> &BTreeSet<CfaNode> {
        &self.nodes
    }

    pub fn contains(&self, node: CfaNode) -> bool {
        self.nodes.contains(&node)
    }

    pub fn is_call_node(&self, node: CfaNode) -> bool {
        self.call_nodes.contains(&node)
    }

    pub fn is_return_node(&self, node: CfaNode) -> bool {
        self.return_nodes.contains(&node)
    }
}

struct Listed<'a, T>(&'a BTreeSet<T>);

impl<T: fmt::Display> fmt::Display for Listed<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{}: call={} return={} vars={} nodes={}",
            self.id,
            self.register_node,
            Listed(&self.call_nodes),
            Listed(&self.return_nodes),
            Listed(&self.referenced_variables),
            Listed(&self.nodes),
        )?;
        if !self.inner_function_calls.is_empty() {
            write!(f, " calls={}", Listed(&self.inner_function_calls))?;
        }
        Ok(())
    }
}
