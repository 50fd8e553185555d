//! Block partitioning: splits a program into the function and loop bodies
//! that block-modular analysis summarizes.

mod block;
mod builder;
mod error;
mod heuristic;
mod partitioning;
mod registry;

pub use block::{Block, BlockId};
pub use builder::BlockPartitioningBuilder;
pub use error::PartitionError;
pub use heuristic::{
    FunctionAndLoopPartitioning, FunctionPartitioning, LoopPartitioning, PartitioningHeuristic,
    select_block_starts,
};
pub use partitioning::BlockPartitioning;
pub use registry::{HeuristicConstructor, HeuristicRegistry, PartitioningOptions, partition};
