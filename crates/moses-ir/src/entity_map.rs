//! Entity-to-data storage.
//!
//! [`PrimaryMap`] is a dense, append-only map used for entities that are never
//! freed (types). [`Arena`] is a slot map with generation checks used for
//! values and uses, whose slots are recycled after an erase.

use alloc::vec::Vec;
use core::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use crate::entity::{ArenaKey, EntityRef};

/// Dense map from entity to data
///
/// This is essentially a Vec with entity-based indexing.
#[derive(Debug, Clone)]
pub struct PrimaryMap<K: EntityRef, V> {
    data: Vec<V>,
    _phantom: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    /// Create a new empty PrimaryMap
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Push a value and return its entity key
    pub fn push(&mut self, value: V) -> K {
        let index = self.data.len();
        self.data.push(value);
        K::from_index(index)
    }

    /// Get a value by entity key
    pub fn get(&self, key: K) -> Option<&V> {
        self.data.get(key.index())
    }

    /// Get a mutable value by entity key
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.data.get_mut(key.index())
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over entries as (entity, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (K::from_index(i), v))
    }
}

impl<K: EntityRef, V> Default for PrimaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V> Index<K> for PrimaryMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        &self.data[key.index()]
    }
}

#[derive(Debug, Clone)]
struct Slot<V> {
    generation: u32,
    data: Option<V>,
}

/// Generational slot map
///
/// Removing an entry bumps the slot's generation, so every handle issued for
/// the old occupant stops resolving.
#[derive(Debug, Clone)]
pub struct Arena<K: ArenaKey, V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    len: usize,
    _phantom: PhantomData<K>,
}

impl<K: ArenaKey, V> Arena<K, V> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _phantom: PhantomData,
        }
    }

    /// Store `value` and return its handle
    pub fn insert(&mut self, value: V) -> K {
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.data = Some(value);
            return K::new(slot, entry.generation);
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            data: Some(value),
        });
        K::new(slot, 0)
    }

    /// Remove the entry for `key`, invalidating every copy of the handle
    pub fn remove(&mut self, key: K) -> Option<V> {
        let entry = self.slots.get_mut(key.slot() as usize)?;
        if entry.generation != key.generation() {
            return None;
        }
        let data = entry.data.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(key.slot());
        self.len -= 1;
        Some(data)
    }

    /// Whether `key` refers to a live entry
    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Get a live entry
    pub fn get(&self, key: K) -> Option<&V> {
        let entry = self.slots.get(key.slot() as usize)?;
        if entry.generation != key.generation() {
            return None;
        }
        entry.data.as_ref()
    }

    /// Get a live entry mutably
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        let entry = self.slots.get_mut(key.slot() as usize)?;
        if entry.generation != key.generation() {
            return None;
        }
        entry.data.as_mut()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter().enumerate().filter_map(|(i, entry)| {
            entry
                .data
                .as_ref()
                .map(|data| (K::new(i as u32, entry.generation), data))
        })
    }
}

impl<K: ArenaKey, V> Default for Arena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V> Index<K> for Arena<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        match self.get(key) {
            Some(data) => data,
            None => panic!("stale or invalid handle {:?}", key),
        }
    }
}

impl<K: ArenaKey, V> IndexMut<K> for Arena<K, V> {
    fn index_mut(&mut self, key: K) -> &mut V {
        match self.get_mut(key) {
            Some(data) => data,
            None => panic!("stale or invalid handle {:?}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::entity::{Type, Value};

    #[test]
    fn test_primary_map_basic() {
        let mut map: PrimaryMap<Type, i32> = PrimaryMap::new();

        let a = map.push(10);
        let b = map.push(20);

        assert_eq!(map.get(a), Some(&10));
        assert_eq!(map[b], 20);
        assert_eq!(map.len(), 2);
        let values: Vec<_> = map.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 20]);
    }

    #[test]
    fn test_arena_insert_get() {
        let mut arena: Arena<Value, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena[b], "b");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_arena_stale_handle_after_remove() {
        let mut arena: Arena<Value, i32> = Arena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1));
        assert!(!arena.contains(a));

        // The slot is reused, but the old handle must not see the new entry
        let b = arena.insert(2);
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a, b);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn test_arena_iter_skips_free_slots() {
        let mut arena: Arena<Value, i32> = Arena::new();
        let a = arena.insert(1);
        let _b = arena.insert(2);
        let _c = arena.insert(3);
        arena.remove(a);

        let live: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec![2, 3]);
        assert!(!arena.is_empty());
    }

    #[test]
    #[should_panic(expected = "stale or invalid handle")]
    fn test_arena_index_stale_panics() {
        let mut arena: Arena<Value, i32> = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let _ = arena[a];
    }
}
