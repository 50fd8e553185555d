use super::id::{Id, Identifier};
use super::item::Item;

/// Append-only storage addressed by typed handles, with tombstone deletion.
#[derive(Debug, Clone)]
pub struct Arena<I: Identifier, T> {
    items: Vec<Item<T>>,
    live: usize,
    marker: std::marker::PhantomData<I>,
}

impl<I: Identifier, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            live: 0,
            marker: std::marker::PhantomData,
        }
    }
}

impl<I: Identifier, T> Arena<I, T> {
    pub fn next_id(&self) -> I {
        I::from(Id(self.items.len()))
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Allocate a new item in the arena and return its identifier.
    pub fn alloc(&mut self, item: T) -> I {
        let id = self.next_id();
        self.items.push(Item::builder().data(item).build());
        self.live += 1;
        id
    }

    /// The slot for `id`, deleted or not.
    pub fn slot(&self, id: I) -> Option<&Item<T>> {
        self.items.get(id.into().raw())
    }

    /// The live item for `id`.
    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(id.into().raw()).and_then(Item::get)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.items.get_mut(id.into().raw()).and_then(Item::get_mut)
    }

    pub fn is_deleted(&self, id: I) -> bool {
        self.slot(id).is_none_or(Item::deleted)
    }

    /// Delete the item for `id` and hand back its value. The slot stays
    /// reserved.
    pub fn delete(&mut self, id: I) -> Option<T> {
        let data = self.items.get_mut(id.into().raw())?.take()?;
        self.live -= 1;
        Some(data)
    }

    /// Live items in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, arena_item)| Some((I::from(Id(index)), arena_item.get()?)))
    }
}
