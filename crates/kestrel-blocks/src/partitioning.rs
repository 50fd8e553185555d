use std::fmt;

use kestrel_cfa::CfaNode;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{Block, BlockId};

/// The immutable set of blocks of one program.
///
/// Blocks are numbered in register-node order, so rendering and iteration are
/// deterministic for a given CFA.
#[derive(Clone, Debug)]
pub struct BlockPartitioning {
    blocks: Vec<Block>,
    main_entry: CfaNode,
    main_block: Option<BlockId>,
    call_node_to_block: FxHashMap<CfaNode, BlockId>,
    return_node_to_blocks: FxHashMap<CfaNode, SmallVec<[BlockId; 2]>>,
}

impl BlockPartitioning {
    /// Number the given blocks and index their boundary nodes.
    ///
    /// A node that is a call node of several blocks maps to the smallest of
    /// them, so entering it starts the innermost reduction.
    pub(crate) fn new(mut blocks: Vec<Block>, main_entry: CfaNode) -> Self {
        blocks.sort_by_key(|block| block.register_node);
        let mut call_node_to_block: FxHashMap<CfaNode, BlockId> = FxHashMap::default();
        let mut return_node_to_blocks: FxHashMap<CfaNode, SmallVec<[BlockId; 2]>> =
            FxHashMap::default();
        let mut main_block = None;

        for (index, block) in blocks.iter_mut().enumerate() {
            block.id = BlockId(index);
        }
        for block in &blocks {
            if block.is_call_node(main_entry) && main_block.is_none() {
                main_block = Some(block.id);
            }
            for &node in &block.call_nodes {
                let slot = call_node_to_block.entry(node).or_insert(block.id);
                if blocks[slot.0].nodes.len() > block.nodes.len() {
                    *slot = block.id;
                }
            }
            for &node in &block.return_nodes {
                return_node_to_blocks.entry(node).or_default().push(block.id);
            }
        }

        Self {
            blocks,
            main_entry,
            main_block,
            call_node_to_block,
            return_node_to_blocks,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    pub fn main_entry(&self) -> CfaNode {
        self.main_entry
    }

    /// The block entered at the program entry.
    pub fn main_block(&self) -> Option<&Block> {
        self.main_block.map(|id| &self.blocks[id.0])
    }

    /// Whether `node` starts a block.
    pub fn is_call_node(&self, node: CfaNode) -> bool {
        self.call_node_to_block.contains_key(&node)
    }

    pub fn block_for_call_node(&self, node: CfaNode) -> Option<&Block> {
        self.call_node_to_block
            .get(&node)
            .map(|id| &self.blocks[id.0])
    }

    pub fn is_return_node(&self, node: CfaNode) -> bool {
        self.return_node_to_blocks.contains_key(&node)
    }

    pub fn blocks_for_return_node(&self, node: CfaNode) -> impl Iterator<Item = &Block> {
        self.return_node_to_blocks
            .get(&node)
            .into_iter()
            .flatten()
            .map(|id| &self.blocks[id.0])
    }

    /// The smallest block containing `node`.
    pub fn block_containing(&self, node: CfaNode) -> Option<&Block> {
        self.blocks
            .iter()
            .filter(|block| block.contains(node))
            .min_by_key(|block| (block.nodes.len(), block.id))
    }
}

impl fmt::Display for BlockPartitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{block}")?;
            if self.main_block == Some(block.id) {
                f.write_str(" (main)")?;
            }
        }
        Ok(())
    }
}
