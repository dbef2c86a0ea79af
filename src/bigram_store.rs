//! Outgoing-bigram dispatch keyed per source terminal (`spec.md` §4.3
//! "Bigram store").
//!
//! Each source terminal owns a [`TrieMap`] level (allocated lazily and
//! recorded back onto the word store's terminal via
//! [`crate::word_store::WordStore::set_bigram_level`]) mapping target
//! terminal position to an index into this store's side array of
//! [`BigramProperty`] records — `BigramProperty` carries historical
//! counters beyond the 36-bit value a `TrieMap` slot can hold directly, the
//! same reason the teacher keeps `UserHistoryData` records in a side `Vec`
//! indexed by a compact key rather than packed into the trie itself.

use serde::{Deserialize, Serialize};

use crate::trie_map::{TrieMap, INVALID_INDEX};
use crate::types::{BigramProperty, Codepoint, HistoricalInfo, TerminalPosition, NOT_A_PROBABILITY};
use crate::word_store::WordStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BigramSlot {
    property: BigramProperty,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BigramStore {
    trie: TrieMap,
    slots: Vec<Option<BigramSlot>>,
}

impl BigramStore {
    pub fn new() -> Self {
        BigramStore {
            trie: TrieMap::new(),
            slots: Vec::new(),
        }
    }

    /// Insert or update the bigram `source -> target`.
    pub fn add_bigram(
        &mut self,
        word_store: &mut WordStore,
        source: TerminalPosition,
        target: TerminalPosition,
        probability: u8,
        now: u32,
    ) {
        let level = self.level_for(word_store, source);
        let found = self.trie.get(target, level);
        if found.is_valid {
            if let Some(slot) = self.slots[found.value as usize].as_mut() {
                slot.property.probability = probability;
                slot.property.historical = slot.property.historical.merge(HistoricalInfo {
                    level: 0,
                    count: 1,
                    timestamp: now,
                });
                return;
            }
        }
        let mut property = BigramProperty::new(probability);
        property.historical.timestamp = now;
        property.historical.count = 1;
        let idx = self.slots.len();
        self.slots.push(Some(BigramSlot { property }));
        self.trie.put(target, idx as u64, level);
    }

    pub fn remove_bigram(
        &mut self,
        word_store: &WordStore,
        source: TerminalPosition,
        target: TerminalPosition,
    ) -> bool {
        let level = word_store.bigram_level(source);
        if level == INVALID_INDEX {
            return false;
        }
        let found = self.trie.get(target, level);
        if !found.is_valid {
            return false;
        }
        self.slots[found.value as usize] = None;
        self.trie.remove(target, level);
        true
    }

    pub fn probability(
        &self,
        word_store: &WordStore,
        source: TerminalPosition,
        target: TerminalPosition,
    ) -> i32 {
        let level = word_store.bigram_level(source);
        if level == INVALID_INDEX {
            return NOT_A_PROBABILITY;
        }
        let found = self.trie.get(target, level);
        if !found.is_valid {
            return NOT_A_PROBABILITY;
        }
        match &self.slots[found.value as usize] {
            Some(slot) => slot.property.probability as i32,
            None => NOT_A_PROBABILITY,
        }
    }

    /// All live outgoing bigrams from `source`, spelled out for display.
    pub fn predictions(
        &self,
        word_store: &WordStore,
        source: TerminalPosition,
    ) -> Vec<(Vec<Codepoint>, BigramProperty)> {
        let level = word_store.bigram_level(source);
        if level == INVALID_INDEX {
            return Vec::new();
        }
        self.trie
            .iter_level(level)
            .filter_map(|(target, slot_idx)| {
                let slot = self.slots.get(slot_idx as usize)?.as_ref()?;
                let spelling = word_store.spelling(target)?;
                Some((spelling, slot.property))
            })
            .collect()
    }

    fn level_for(&mut self, word_store: &mut WordStore, source: TerminalPosition) -> i32 {
        let existing = word_store.bigram_level(source);
        if existing != INVALID_INDEX {
            return existing;
        }
        let level = self.trie.new_level();
        word_store.set_bigram_level(source, level);
        level
    }

    pub fn tombstone_count(&self) -> usize {
        self.trie.tombstone_count()
    }

    pub fn total_entry_count(&self) -> usize {
        self.trie.live_entry_count() + self.trie.tombstone_count()
    }

    /// Purge tombstoned TrieMap entries. The side-array slots they pointed
    /// at remain as `None` holes; a full migration is what actually
    /// reclaims that space by rebuilding the store from scratch.
    pub fn compact(&mut self) {
        self.trie.compact_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnigramProperty;

    fn cps(s: &str) -> Vec<Codepoint> {
        s.chars().map(|c| c as u32).collect()
    }

    fn seeded_pair(word_store: &mut WordStore) -> (TerminalPosition, TerminalPosition) {
        let a = word_store
            .add_unigram_word(&cps("good"), UnigramProperty::new(100), 1)
            .unwrap();
        let b = word_store
            .add_unigram_word(&cps("morning"), UnigramProperty::new(90), 1)
            .unwrap();
        (a, b)
    }

    #[test]
    fn add_and_query_probability() {
        let mut word_store = WordStore::new();
        let mut bigrams = BigramStore::new();
        let (a, b) = seeded_pair(&mut word_store);
        bigrams.add_bigram(&mut word_store, a, b, 200, 1);
        assert_eq!(bigrams.probability(&word_store, a, b), 200);
    }

    #[test]
    fn missing_bigram_is_not_a_probability() {
        let mut word_store = WordStore::new();
        let bigrams = BigramStore::new();
        let (a, b) = seeded_pair(&mut word_store);
        assert_eq!(bigrams.probability(&word_store, a, b), NOT_A_PROBABILITY);
    }

    #[test]
    fn remove_then_query_is_not_a_probability() {
        let mut word_store = WordStore::new();
        let mut bigrams = BigramStore::new();
        let (a, b) = seeded_pair(&mut word_store);
        bigrams.add_bigram(&mut word_store, a, b, 200, 1);
        assert!(bigrams.remove_bigram(&word_store, a, b));
        assert_eq!(bigrams.probability(&word_store, a, b), NOT_A_PROBABILITY);
    }

    #[test]
    fn remove_absent_bigram_returns_false() {
        let mut word_store = WordStore::new();
        let mut bigrams = BigramStore::new();
        let (a, b) = seeded_pair(&mut word_store);
        assert!(!bigrams.remove_bigram(&word_store, a, b));
    }

    #[test]
    fn predictions_lists_live_targets_only() {
        let mut word_store = WordStore::new();
        let mut bigrams = BigramStore::new();
        let source = word_store
            .add_unigram_word(&cps("i"), UnigramProperty::new(50), 1)
            .unwrap();
        let am = word_store
            .add_unigram_word(&cps("am"), UnigramProperty::new(50), 1)
            .unwrap();
        let was = word_store
            .add_unigram_word(&cps("was"), UnigramProperty::new(50), 1)
            .unwrap();
        bigrams.add_bigram(&mut word_store, source, am, 100, 1);
        bigrams.add_bigram(&mut word_store, source, was, 80, 1);
        bigrams.remove_bigram(&word_store, source, was);

        let preds = bigrams.predictions(&word_store, source);
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].0, cps("am"));
    }

    #[test]
    fn reinsertion_updates_existing_slot_in_place() {
        let mut word_store = WordStore::new();
        let mut bigrams = BigramStore::new();
        let (a, b) = seeded_pair(&mut word_store);
        bigrams.add_bigram(&mut word_store, a, b, 50, 1);
        bigrams.add_bigram(&mut word_store, a, b, 99, 2);
        assert_eq!(bigrams.probability(&word_store, a, b), 99);
        assert_eq!(bigrams.slots.iter().filter(|s| s.is_some()).count(), 1);
    }
}
