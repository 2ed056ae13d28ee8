// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hashed containers with stable slot indices.
//!
//! Items live in a backing slot vector that may contain holes after removals.
//! `max_index()` is the backing length; `is_valid_index()` tells whether a slot
//! is alive. Delta computation indexes bitsets by slot, so slot order is the
//! natural save order of these containers.

use super::bits::BitSet;
use super::{MapEntry, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Item stored in a [`Sparse`] container.
pub trait SparseItem: Clone + PartialEq + fmt::Debug {
    /// Identity used for hashing and uniqueness.
    fn key(&self) -> &Value;
    /// Filler for dead slots.
    fn vacant() -> Self;
}

impl SparseItem for Value {
    fn key(&self) -> &Value {
        self
    }

    fn vacant() -> Self {
        Value::Bool(false)
    }
}

impl SparseItem for MapEntry {
    fn key(&self) -> &Value {
        &self.key
    }

    fn vacant() -> Self {
        MapEntry {
            key: Value::Bool(false),
            value: Value::Bool(false),
        }
    }
}

pub(crate) fn hash_key(key: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Set-like container keyed by `T::key()`.
#[derive(Clone, Default)]
pub struct Sparse<T> {
    slots: Vec<T>,
    alive: BitSet,
    free: Vec<usize>,
    index: HashMap<u64, Vec<usize>>,
    len: usize,
}

/// Unique values.
pub type SparseSet = Sparse<Value>;
/// Unique keys with values.
pub type SparseMap = Sparse<MapEntry>;

impl<T: SparseItem> Sparse<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            alive: BitSet::default(),
            free: Vec::new(),
            index: HashMap::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut out = Self::new();
        out.slots.reserve(capacity);
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing storage length, including dead slots.
    pub fn max_index(&self) -> usize {
        self.slots.len()
    }

    pub fn is_valid_index(&self, idx: usize) -> bool {
        self.alive.get(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        if self.is_valid_index(idx) {
            self.slots.get(idx)
        } else {
            None
        }
    }

    /// Alive items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| self.alive.get(*i))
            .map(|(_, item)| item)
    }

    /// Contiguous runs of alive slots.
    pub fn runs(&self) -> Runs<'_, T> {
        Runs { sparse: self, pos: 0 }
    }

    pub fn find(&self, key: &Value) -> Option<usize> {
        self.index
            .get(&hash_key(key))?
            .iter()
            .copied()
            .find(|&i| self.slots[i].key() == key)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.find(key).is_some()
    }

    /// Whether an item with the same key and the same content is present.
    pub fn contains_item(&self, item: &T) -> bool {
        self.find(item.key())
            .is_some_and(|i| self.slots[i] == *item)
    }

    pub fn get_by_key(&self, key: &Value) -> Option<&T> {
        self.find(key).map(|i| &self.slots[i])
    }

    /// Insert or overwrite in place. Returns the replaced item.
    pub fn insert(&mut self, item: T) -> Option<T> {
        if let Some(i) = self.find(item.key()) {
            return Some(std::mem::replace(&mut self.slots[i], item));
        }
        let hash = hash_key(item.key());
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = item;
                self.alive.set(idx, true);
                idx
            }
            None => {
                self.slots.push(item);
                self.alive.push(true);
                self.slots.len() - 1
            }
        };
        self.index.entry(hash).or_default().push(idx);
        self.len += 1;
        None
    }

    /// Insert only if the key is absent. Returns whether it was inserted.
    pub fn insert_new(&mut self, item: T) -> bool {
        if self.contains_key(item.key()) {
            return false;
        }
        self.insert(item);
        true
    }

    pub fn remove(&mut self, key: &Value) -> Option<T> {
        let idx = self.find(key)?;
        let hash = hash_key(key);
        if let Some(bucket) = self.index.get_mut(&hash) {
            bucket.retain(|&i| i != idx);
            if bucket.is_empty() {
                self.index.remove(&hash);
            }
        }
        self.alive.set(idx, false);
        self.free.push(idx);
        self.len -= 1;
        Some(std::mem::replace(&mut self.slots[idx], T::vacant()))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.alive.clear();
        self.free.clear();
        self.index.clear();
        self.len = 0;
    }

    /// Append `n` alive slots without hashing them; call [`Self::rehash`] afterwards.
    pub(crate) fn extend_unindexed(&mut self, n: usize, mut make: impl FnMut() -> T) -> &mut [T] {
        let start = self.slots.len();
        self.slots.reserve(n);
        for _ in 0..n {
            self.slots.push(make());
            self.alive.push(true);
        }
        self.len += n;
        &mut self.slots[start..]
    }

    /// Rebuild the hash index. Later duplicates of an already seen key are dropped.
    pub(crate) fn rehash(&mut self) {
        self.index.clear();
        self.free.clear();
        self.len = 0;
        for idx in 0..self.slots.len() {
            if !self.alive.get(idx) {
                self.free.push(idx);
                continue;
            }
            let hash = hash_key(self.slots[idx].key());
            let bucket = self.index.entry(hash).or_default();
            let duplicate = bucket
                .iter()
                .any(|&i| self.slots[i].key() == self.slots[idx].key());
            if duplicate {
                log::debug!("[plainprops] dropping duplicate key at slot {}", idx);
                self.alive.set(idx, false);
                self.slots[idx] = T::vacant();
                self.free.push(idx);
            } else {
                bucket.push(idx);
                self.len += 1;
            }
        }
    }
}

impl<T: SparseItem> PartialEq for Sparse<T> {
    /// Unordered comparison: same cardinality and every item present in `other`.
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|item| other.contains_item(item))
    }
}

impl<T: SparseItem> Eq for Sparse<T> {}

impl<T: SparseItem> fmt::Debug for Sparse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: SparseItem> FromIterator<T> for Sparse<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

impl<T: SparseItem> Extend<T> for Sparse<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl SparseMap {
    pub fn get_value(&self, key: &Value) -> Option<&Value> {
        self.get_by_key(key).map(|e| &e.value)
    }
}

/// Iterator over contiguous alive slot runs.
pub struct Runs<'a, T> {
    sparse: &'a Sparse<T>,
    pos: usize,
}

impl<'a, T: SparseItem> Iterator for Runs<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let slots = &self.sparse.slots;
        while self.pos < slots.len() && !self.sparse.alive.get(self.pos) {
            self.pos += 1;
        }
        if self.pos >= slots.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < slots.len() && self.sparse.alive.get(self.pos) {
            self.pos += 1;
        }
        Some(&slots[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(items: &[&str]) -> SparseSet {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    #[test]
    fn test_insert_remove_reuses_slots() {
        let mut set = set_of(&["a", "b", "c"]);
        assert_eq!(set.len(), 3);
        assert!(set.remove(&Value::from("b")).is_some());
        assert_eq!(set.max_index(), 3);
        assert!(!set.is_valid_index(1));
        assert!(set.insert(Value::from("d")).is_none());
        assert_eq!(set.find(&Value::from("d")), Some(1));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_runs_skip_holes() {
        let mut set = set_of(&["a", "b", "c", "d", "e"]);
        set.remove(&Value::from("b"));
        set.remove(&Value::from("c"));
        let runs: Vec<usize> = set.runs().map(<[Value]>::len).collect();
        assert_eq!(runs, vec![1, 2]);
    }

    #[test]
    fn test_unordered_equality() {
        let a = set_of(&["x", "y", "z"]);
        let b = set_of(&["z", "x", "y"]);
        assert_eq!(a, b);
        assert_ne!(a, set_of(&["x", "y"]));
    }

    #[test]
    fn test_map_overwrite_in_place() {
        let mut map = SparseMap::new();
        map.insert(MapEntry::new(Value::I32(1), Value::from("one")));
        let old = map.insert(MapEntry::new(Value::I32(1), Value::from("uno")));
        assert_eq!(old.map(|e| e.value), Some(Value::from("one")));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_value(&Value::I32(1)), Some(&Value::from("uno")));
        assert!(map.contains_item(&MapEntry::new(Value::I32(1), Value::from("uno"))));
        assert!(!map.contains_item(&MapEntry::new(Value::I32(1), Value::from("one"))));
    }

    #[test]
    fn test_bulk_extend_then_rehash_dedups() {
        let mut set = SparseSet::new();
        let mut next = 0;
        let slots = set.extend_unindexed(4, || Value::I32(0));
        for slot in slots.iter_mut() {
            *slot = Value::I32(next % 3);
            next += 1;
        }
        set.rehash();
        assert_eq!(set.len(), 3);
        assert!(set.contains_key(&Value::I32(0)));
        assert!(!set.is_valid_index(3));
    }

    #[test]
    fn test_float_keys_hash_by_bits() {
        let mut set = SparseSet::new();
        set.insert(Value::F32(f32::NAN));
        set.insert(Value::F32(0.0));
        set.insert(Value::F32(-0.0));
        assert_eq!(set.len(), 3);
        assert!(set.contains_key(&Value::F32(f32::NAN)));
    }
}
