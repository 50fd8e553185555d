//! Control-flow automaton model shared by the partitioner, the engine and the
//! refinement controller.
//!
//! The CFA is built once through [`CfaBuilder`] and is immutable afterwards.

mod builder;
mod cfa;
mod edge;
mod error;
mod loops;
mod node;
mod traversal;

pub use builder::CfaBuilder;
pub use cfa::{Cfa, FunctionInfo};
pub use edge::{CfaEdge, EdgeInfo, EdgeKind, ReferencedVariable};
pub use error::CfaError;
pub use loops::{Loop, LoopId, LoopStructure};
pub use node::{CfaNode, NodeInfo, NodeKind};
pub use traversal::CfaTraversal;
