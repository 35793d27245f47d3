use indexmap::IndexMap;
use std::hash::Hash;

/// Implemented by every element that carries a dense positional index.
pub trait Indexed {
    fn index(&self) -> usize;

    fn set_index(&mut self, index: usize);
}

/// Dense storage for one element category.
///
/// Elements are kept in insertion order and addressed by id. The position of an element in the
/// table is its index: after a removal every later element moves up one slot and its stored
/// index is rewritten before `remove` returns, so indices always read `0..len`.
#[derive(Debug, Clone)]
pub struct ElementTable<K, V> {
    items: IndexMap<K, V>,
}

impl<K, V> ElementTable<K, V>
where
    K: Copy + Eq + Hash,
    V: Indexed,
{
    pub fn new() -> Self {
        Self { items: IndexMap::new() }
    }

    /// Appends `value` under `key`, assigning it the last index.
    pub fn insert(&mut self, key: K, mut value: V) {
        value.set_index(self.items.len());
        self.items.insert(key, value);
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        let (position, _, value) = self.items.shift_remove_full(&key)?;
        self.reindex_from(position);
        Some(value)
    }

    /// Recomputes the indices of the whole table.
    pub fn reindex(&mut self) {
        self.reindex_from(0);
    }

    /// Reorders the table by `key` and rewrites every index.
    pub fn sort_by_key<T: Ord>(&mut self, mut key: impl FnMut(&K) -> T) {
        self.items.sort_by(|a, _, b, _| key(a).cmp(&key(b)));
        self.reindex();
    }

    fn reindex_from(&mut self, start: usize) {
        for (position, (_, value)) in self.items.iter_mut().enumerate().skip(start) {
            value.set_index(position);
        }
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.items.get(&key)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.items.get_mut(&key)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&V> {
        self.items.get_index(index).map(|(_, value)| value)
    }

    pub fn contains(&self, key: K) -> bool {
        self.items.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keys in index order.
    pub fn ids(&self) -> Vec<K> {
        self.items.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.items.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.items.values_mut()
    }
}

impl<K, V> Default for ElementTable<K, V>
where
    K: Copy + Eq + Hash,
    V: Indexed,
{
    fn default() -> Self {
        Self::new()
    }
}
