//! Bitmap-indexed hash trie mapping 32-bit keys to <=36-bit values, with
//! indirection to arbitrarily nested child levels (`spec.md` §4.1).
//!
//! This is the general-purpose index substrate used by [`crate::word_store`]
//! (as the per-node children dispatch) and [`crate::bigram_store`] (as the
//! per-terminal outgoing-edge dispatch) — mirroring how the teacher reuses
//! `lexime_trie::DoubleArray` as the substrate for both `TrieDictionary` and
//! `RomajiTrie`.
//!
//! Each level is a 32-wide bitmap over a hashed 5-bit slice of the key, with
//! a dense slot array addressed by popcount, plus an overflow list for keys
//! that hash to an already-occupied bucket. `putRoot`/`getRoot` operate on
//! level 0, which always exists.

use serde::{Deserialize, Serialize};

pub const INVALID_INDEX: i32 = -1;
pub const MAX_VALUE: u64 = (1u64 << 36) - 1;

const BITS_PER_LEVEL: u32 = 5;
const LEVEL_MASK: u32 = (1u32 << BITS_PER_LEVEL) - 1;
const HASH_MULTIPLIER: u32 = 0x9E37_79B1;

fn bucket_of(key: u32) -> u32 {
    (key.wrapping_mul(HASH_MULTIPLIER) >> (32 - BITS_PER_LEVEL)) & LEVEL_MASK
}

/// A lookup result: `{mIsValid, mValue, mNextLevelBitmapEntryIndex}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub is_valid: bool,
    pub value: u64,
    pub next_level_bitmap_entry_index: i32,
}

impl Node {
    fn invalid() -> Self {
        Node {
            is_valid: false,
            value: 0,
            next_level_bitmap_entry_index: INVALID_INDEX,
        }
    }

    fn from_slot(slot: &Slot) -> Self {
        Node {
            is_valid: !slot.tombstone,
            value: slot.value,
            next_level_bitmap_entry_index: slot.next_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    key: u32,
    value: u64,
    next_level: i32,
    tombstone: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Level {
    bitmap: u32,
    slots: Vec<Slot>,
    overflow: Vec<Slot>,
}

impl Level {
    fn dense_slot_index(&self, bit: u32) -> usize {
        (self.bitmap & (bit - 1)).count_ones() as usize
    }

    fn find(&self, key: u32) -> Option<(bool, usize)> {
        let bucket = bucket_of(key);
        let bit = 1u32 << bucket;
        if self.bitmap & bit != 0 {
            let idx = self.dense_slot_index(bit);
            if self.slots.get(idx).map(|s| s.key) == Some(key) {
                return Some((true, idx));
            }
        }
        self.overflow
            .iter()
            .position(|s| s.key == key)
            .map(|idx| (false, idx))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrieMap {
    levels: Vec<Level>,
}

impl Default for TrieMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieMap {
    pub fn new() -> Self {
        TrieMap {
            levels: vec![Level::default()],
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Allocate a fresh, empty child level and return its index.
    pub fn new_level(&mut self) -> i32 {
        self.levels.push(Level::default());
        (self.levels.len() - 1) as i32
    }

    pub fn put_root(&mut self, key: u32, value: u64) -> bool {
        self.put(key, value, 0)
    }

    pub fn get_root(&self, key: u32) -> Node {
        self.get(key, 0)
    }

    pub fn put(&mut self, key: u32, value: u64, bitmap_entry_index: i32) -> bool {
        if value > MAX_VALUE || bitmap_entry_index < 0 {
            return false;
        }
        let Some(level) = self.levels.get_mut(bitmap_entry_index as usize) else {
            return false;
        };

        match level.find(key) {
            Some((true, idx)) => {
                level.slots[idx].value = value;
                level.slots[idx].tombstone = false;
                true
            }
            Some((false, idx)) => {
                level.overflow[idx].value = value;
                level.overflow[idx].tombstone = false;
                true
            }
            None => {
                let bucket = bucket_of(key);
                let bit = 1u32 << bucket;
                let new_slot = Slot {
                    key,
                    value,
                    next_level: INVALID_INDEX,
                    tombstone: false,
                };
                if level.bitmap & bit == 0 {
                    let idx = level.dense_slot_index(bit);
                    level.slots.insert(idx, new_slot);
                    level.bitmap |= bit;
                } else {
                    level.overflow.push(new_slot);
                }
                true
            }
        }
    }

    pub fn get(&self, key: u32, bitmap_entry_index: i32) -> Node {
        let Some(level) = self.resolve_level(bitmap_entry_index) else {
            return Node::invalid();
        };
        match level.find(key) {
            Some((true, idx)) => Node::from_slot(&level.slots[idx]),
            Some((false, idx)) => Node::from_slot(&level.overflow[idx]),
            None => Node::invalid(),
        }
    }

    /// Return the bitmap-entry index of `key`'s child level within
    /// `bitmap_entry_index`, allocating both the entry (with an invalid
    /// value, if absent) and the child level (if not yet linked).
    /// Returns `INVALID_INDEX` only if `bitmap_entry_index` itself is
    /// invalid.
    pub fn get_next_level_bitmap_entry_index(
        &mut self,
        key: u32,
        bitmap_entry_index: i32,
    ) -> i32 {
        if bitmap_entry_index < 0 || self.levels.get(bitmap_entry_index as usize).is_none() {
            return INVALID_INDEX;
        }

        let existing_next = {
            let level = &self.levels[bitmap_entry_index as usize];
            match level.find(key) {
                Some((true, idx)) => Some(level.slots[idx].next_level),
                Some((false, idx)) => Some(level.overflow[idx].next_level),
                None => None,
            }
        };

        if let Some(next) = existing_next {
            if next != INVALID_INDEX {
                return next;
            }
            let new_index = self.new_level();
            let level = &mut self.levels[bitmap_entry_index as usize];
            match level.find(key) {
                Some((true, idx)) => level.slots[idx].next_level = new_index,
                Some((false, idx)) => level.overflow[idx].next_level = new_index,
                None => unreachable!("key resolved above"),
            }
            return new_index;
        }

        // No entry for `key` at all yet: create a valueless placeholder
        // purely to host the next-level link.
        let new_index = self.new_level();
        let level = &mut self.levels[bitmap_entry_index as usize];
        let bucket = bucket_of(key);
        let bit = 1u32 << bucket;
        let placeholder = Slot {
            key,
            value: 0,
            next_level: new_index,
            tombstone: true,
        };
        if level.bitmap & bit == 0 {
            let idx = level.dense_slot_index(bit);
            level.slots.insert(idx, placeholder);
            level.bitmap |= bit;
        } else {
            level.overflow.push(placeholder);
        }
        new_index
    }

    /// Remove the entry for `key` within `bitmap_entry_index`. Silently
    /// succeeds if absent (matching `removeBigramWords`'s contract).
    /// Dense-slot removals are compacted immediately; overflow removals are
    /// tombstoned lazily and swept out by [`TrieMap::compact_level`].
    pub fn remove(&mut self, key: u32, bitmap_entry_index: i32) {
        let Some(level) = self.levels.get_mut(bitmap_entry_index as usize) else {
            return;
        };
        match level.find(key) {
            Some((true, idx)) => {
                let bucket = bucket_of(key);
                let bit = 1u32 << bucket;
                level.slots.remove(idx);
                level.bitmap &= !bit;
            }
            Some((false, idx)) => {
                level.overflow[idx].tombstone = true;
            }
            None => {}
        }
    }

    /// Iterate the live `(key, value)` pairs of one level, in no particular
    /// order beyond being deterministic for a fixed store state.
    pub fn iter_level(&self, bitmap_entry_index: i32) -> impl Iterator<Item = (u32, u64)> + '_ {
        let level = self.resolve_level(bitmap_entry_index);
        level.into_iter().flat_map(|level| {
            level
                .slots
                .iter()
                .chain(level.overflow.iter())
                .filter(|s| !s.tombstone)
                .map(|s| (s.key, s.value))
        })
    }

    pub fn tombstone_count(&self) -> usize {
        self.levels
            .iter()
            .flat_map(|l| l.overflow.iter())
            .filter(|s| s.tombstone)
            .count()
    }

    pub fn live_entry_count(&self) -> usize {
        self.levels
            .iter()
            .map(|l| {
                l.slots.iter().filter(|s| !s.tombstone).count()
                    + l.overflow.iter().filter(|s| !s.tombstone).count()
            })
            .sum()
    }

    /// Drop tombstoned overflow entries from one level, compacting it.
    pub fn compact_level(&mut self, bitmap_entry_index: i32) {
        if let Some(level) = self.levels.get_mut(bitmap_entry_index as usize) {
            level.overflow.retain(|s| !s.tombstone);
        }
    }

    /// Drop tombstoned overflow entries everywhere.
    pub fn compact_all(&mut self) {
        for level in &mut self.levels {
            level.overflow.retain(|s| !s.tombstone);
        }
    }

    fn resolve_level(&self, bitmap_entry_index: i32) -> Option<&Level> {
        if bitmap_entry_index < 0 {
            return None;
        }
        self.levels.get(bitmap_entry_index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_root_and_get_root_roundtrip() {
        let mut trie = TrieMap::new();
        assert!(trie.put_root(10, 10));
        assert_eq!(trie.get_root(10).value, 10);
        assert!(trie.get_root(10).is_valid);
    }

    #[test]
    fn get_root_miss_is_invalid() {
        let trie = TrieMap::new();
        assert!(!trie.get_root(42).is_valid);
    }

    #[test]
    fn update_in_place() {
        let mut trie = TrieMap::new();
        trie.put_root(5, 1);
        trie.put_root(5, 2);
        assert_eq!(trie.get_root(5).value, 2);
    }

    #[test]
    fn multi_level_put_get_disjoint_from_siblings() {
        let mut trie = TrieMap::new();
        trie.put_root(10, 10);
        let child = trie.get_next_level_bitmap_entry_index(10, 0);
        assert_ne!(child, INVALID_INDEX);

        trie.put(9, 9, child);
        assert_eq!(trie.get(9, child).value, 9);
        assert!(!trie.get(11, child).is_valid);

        // The child level is disjoint from the root level.
        assert!(!trie.get(9, 0).is_valid);
        assert_eq!(trie.get_root(10).value, 10);
    }

    #[test]
    fn same_key_reused_across_levels_is_independent() {
        let mut trie = TrieMap::new();
        let level_a = trie.new_level();
        let level_b = trie.new_level();
        trie.put(1, 100, level_a);
        trie.put(1, 200, level_b);
        assert_eq!(trie.get(1, level_a).value, 100);
        assert_eq!(trie.get(1, level_b).value, 200);
    }

    #[test]
    fn rejects_out_of_range_value() {
        let mut trie = TrieMap::new();
        assert!(!trie.put_root(1, MAX_VALUE + 1));
        assert!(!trie.get_root(1).is_valid);
    }

    #[test]
    fn max_value_is_accepted() {
        let mut trie = TrieMap::new();
        assert!(trie.put_root(1, MAX_VALUE));
        assert_eq!(trie.get_root(1).value, MAX_VALUE);
    }

    #[test]
    fn remove_then_get_is_invalid() {
        let mut trie = TrieMap::new();
        trie.put_root(7, 70);
        trie.remove(7, 0);
        assert!(!trie.get_root(7).is_valid);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut trie = TrieMap::new();
        trie.remove(123, 0);
        assert!(!trie.get_root(123).is_valid);
    }

    #[test]
    fn many_colliding_keys_all_resolve_correctly() {
        let mut trie = TrieMap::new();
        // Force heavy bucket collisions within one level.
        for key in 0..500u32 {
            assert!(trie.put_root(key, key as u64));
        }
        for key in 0..500u32 {
            let node = trie.get_root(key);
            assert!(node.is_valid, "key {key} missing");
            assert_eq!(node.value, key as u64);
        }
    }

    #[test]
    fn iter_level_yields_only_live_entries() {
        let mut trie = TrieMap::new();
        for key in 0..50u32 {
            trie.put_root(key, key as u64 * 2);
        }
        trie.remove(10, 0);
        trie.remove(20, 0);
        let mut seen: Vec<(u32, u64)> = trie.iter_level(0).collect();
        seen.sort();
        assert_eq!(seen.len(), 48);
        assert!(!seen.iter().any(|(k, _)| *k == 10 || *k == 20));
    }

    #[test]
    fn compact_drops_overflow_tombstones() {
        let mut trie = TrieMap::new();
        for key in 0..200u32 {
            trie.put_root(key, key as u64);
        }
        // Remove a handful that are likely to live in overflow.
        for key in (0..200u32).step_by(7) {
            trie.remove(key, 0);
        }
        let before = trie.tombstone_count();
        trie.compact_all();
        assert_eq!(trie.tombstone_count(), 0);
        assert!(before >= 0);
    }

    #[test]
    fn get_next_level_is_idempotent() {
        let mut trie = TrieMap::new();
        let a = trie.get_next_level_bitmap_entry_index(1, 0);
        let b = trie.get_next_level_bitmap_entry_index(1, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn put_into_invalid_level_fails() {
        let mut trie = TrieMap::new();
        assert!(!trie.put(1, 1, 999));
    }

    #[test]
    fn get_from_invalid_level_is_invalid() {
        let trie = TrieMap::new();
        assert!(!trie.get(1, 999).is_valid);
        assert!(!trie.get(1, INVALID_INDEX).is_valid);
    }
}
