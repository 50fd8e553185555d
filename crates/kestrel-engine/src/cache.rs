use kestrel_blocks::BlockId;
use rustc_hash::FxHashMap;

use crate::{AbstractState, MemoKey, Precision};

/// Block exits already computed for a reduced entry, per block.
#[derive(Clone, Debug)]
pub struct BlockSummaryCache<S, P> {
    entries: FxHashMap<BlockId, FxHashMap<MemoKey<S, P>, Vec<(S, P)>>>,
}

impl<S, P> Default for BlockSummaryCache<S, P> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<S: AbstractState, P: Precision> BlockSummaryCache<S, P> {
    pub fn get(&self, block: BlockId, key: &MemoKey<S, P>) -> Option<&[(S, P)]> {
        self.entries
            .get(&block)
            .and_then(|per_block| per_block.get(key))
            .map(Vec::as_slice)
    }

    pub fn put(&mut self, block: BlockId, key: MemoKey<S, P>, exits: Vec<(S, P)>) {
        self.entries.entry(block).or_default().insert(key, exits);
    }

    pub fn contains(&self, block: BlockId, key: &MemoKey<S, P>) -> bool {
        self.get(block, key).is_some()
    }

    /// Number of cached entries over all blocks.
    pub fn len(&self) -> usize {
        self.entries.values().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_blocks::{PartitioningOptions, partition};
    use kestrel_cfa::{CfaBuilder, CfaNode};

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct Value(CfaNode, i64);

    impl AbstractState for Value {
        fn location(&self) -> CfaNode {
            self.0
        }

        fn is_target(&self) -> bool {
            false
        }

        fn is_less_or_equal(&self, other: &Self) -> bool {
            self == other
        }
    }

    #[test]
    fn test_entries_are_kept_per_block() {
        let mut b = CfaBuilder::new();
        let main = b.function("main").unwrap();
        let f = b.function("f").unwrap();
        let ret = b.node("main");
        b.call(main.entry, ret, "f", &[]);
        b.blank(ret, main.exit);
        b.blank(f.entry, f.exit);
        let cfa = b.build("main").unwrap();
        let partitioning = partition(&cfa, &PartitioningOptions::default()).unwrap();
        let ids: Vec<BlockId> = partitioning.blocks().map(|block| block.id()).collect();
        assert_eq!(ids.len(), 2);

        let mut cache = BlockSummaryCache::<Value, ()>::default();
        let key = MemoKey::new(Value(f.entry, 1), ());
        cache.put(ids[0], key.clone(), vec![(Value(f.exit, 1), ())]);
        assert!(cache.contains(ids[0], &key));
        assert!(!cache.contains(ids[1], &key));
        assert_eq!(cache.get(ids[0], &key), Some(&[(Value(f.exit, 1), ())][..]));

        cache.put(ids[1], key.clone(), Vec::new());
        assert_eq!(cache.len(), 2);
        // an entry without exits is still a hit
        assert_eq!(cache.get(ids[1], &key).map(<[_]>::len), Some(0));

        cache.clear();
        assert!(cache.is_empty());
    }
}
