//! Mutable patricia trie over codepoint sequences: the word store
//! (`spec.md` §4.2 "Word store").
//!
//! Each arena node (`PtNode`) carries an edge label (a run of codepoints,
//! not a single one) and dispatches to its children through a
//! [`TrieMap`] level keyed on the first codepoint of each child's edge —
//! the same pattern the teacher uses for `RomajiTrie` node fan-out, but
//! generalized to variable-length edges with splitting on divergent
//! insertion instead of the teacher's fixed single-codepoint steps.

use serde::{Deserialize, Serialize};

use crate::error::DictError;
use crate::trie_map::{TrieMap, INVALID_INDEX};
use crate::types::{validate_word_length, Codepoint, TerminalPosition, UnigramProperty};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminal {
    pub unigram: UnigramProperty,
    /// TrieMap level dispatching this terminal's outgoing bigram targets;
    /// `INVALID_INDEX` until the first bigram is added.
    pub bigram_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PtNode {
    parent: Option<usize>,
    edge: Vec<Codepoint>,
    terminal: Option<Terminal>,
    children_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordStore {
    nodes: Vec<PtNode>,
    trie: TrieMap,
}

impl Default for WordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WordStore {
    pub fn new() -> Self {
        let trie = TrieMap::new();
        let root = PtNode {
            parent: None,
            edge: Vec::new(),
            terminal: None,
            children_level: 0, // TrieMap's pre-allocated root level
        };
        WordStore {
            nodes: vec![root],
            trie,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert or update a word's unigram record, splitting edges as needed.
    /// Returns the word's (possibly new) terminal position. Accepts a full
    /// `UnigramProperty` (flags, shortcuts, historical counters included)
    /// so callers that need more than a bare probability can set it;
    /// `now` stamps the historical timestamp regardless of what the
    /// caller passed in.
    pub fn add_unigram_word(
        &mut self,
        word: &[Codepoint],
        mut property: UnigramProperty,
        now: u32,
    ) -> Result<TerminalPosition, DictError> {
        validate_word_length(word.len())?;
        property.historical.timestamp = now;
        if property.historical.count == 0 {
            property.historical.count = 1;
        }
        let pos = self.insert(0, word, property, now);
        Ok(pos as u32)
    }

    fn insert(&mut self, node_id: usize, suffix: &[Codepoint], incoming: UnigramProperty, now: u32) -> usize {
        if suffix.is_empty() {
            self.make_terminal(node_id, incoming, now);
            return node_id;
        }

        let mut children_level = self.nodes[node_id].children_level;
        let first = suffix[0];
        let found = self.trie.get(first, children_level);

        if !found.is_valid {
            if children_level == INVALID_INDEX {
                children_level = self.trie.new_level();
                self.nodes[node_id].children_level = children_level;
            }
            let leaf_id = self.alloc_node(Some(node_id), suffix.to_vec());
            self.trie.put(first, leaf_id as u64, children_level);
            self.make_terminal(leaf_id, incoming, now);
            return leaf_id;
        }

        let child_id = found.value as usize;
        let child_edge = self.nodes[child_id].edge.clone();
        let common = common_prefix_len(&child_edge, suffix);

        if common == child_edge.len() && common == suffix.len() {
            self.make_terminal(child_id, incoming, now);
            return child_id;
        }
        if common == child_edge.len() {
            return self.insert(child_id, &suffix[common..], incoming, now);
        }

        // Divergence partway through the child's edge: split it.
        let remaining_child_edge = child_edge[common..].to_vec();
        let prefix_edge = suffix[..common].to_vec();
        let intermediate_id = self.alloc_node(Some(node_id), prefix_edge);
        let new_level = self.trie.new_level();

        self.nodes[intermediate_id].children_level = new_level;
        self.nodes[child_id].parent = Some(intermediate_id);
        self.nodes[child_id].edge = remaining_child_edge.clone();
        self.trie.put(remaining_child_edge[0], child_id as u64, new_level);
        // Rewire the original parent to point at the intermediate node.
        self.trie.put(first, intermediate_id as u64, children_level);

        if common == suffix.len() {
            self.make_terminal(intermediate_id, incoming, now);
            intermediate_id
        } else {
            let leaf_suffix = suffix[common..].to_vec();
            let leaf_id = self.alloc_node(Some(intermediate_id), leaf_suffix.clone());
            self.trie.put(leaf_suffix[0], leaf_id as u64, new_level);
            self.make_terminal(leaf_id, incoming, now);
            leaf_id
        }
    }

    fn make_terminal(&mut self, node_id: usize, incoming: UnigramProperty, now: u32) {
        match &mut self.nodes[node_id].terminal {
            Some(existing) => existing.unigram.merge_update(&incoming, now),
            None => {
                self.nodes[node_id].terminal = Some(Terminal {
                    unigram: incoming,
                    bigram_level: INVALID_INDEX,
                });
            }
        }
    }

    fn alloc_node(&mut self, parent: Option<usize>, edge: Vec<Codepoint>) -> usize {
        self.nodes.push(PtNode {
            parent,
            edge,
            terminal: None,
            children_level: INVALID_INDEX,
        });
        self.nodes.len() - 1
    }

    /// Exact lookup, with an optional case-insensitive fallback.
    pub fn terminal_position_of_word(
        &self,
        word: &[Codepoint],
        force_lower_case: bool,
    ) -> Option<TerminalPosition> {
        if let Some(pos) = self.find(word) {
            return Some(pos as u32);
        }
        if force_lower_case {
            let lowered: Vec<Codepoint> = word.iter().copied().map(to_lower_codepoint).collect();
            if lowered != word {
                return self.find(&lowered).map(|p| p as u32);
            }
        }
        None
    }

    fn find(&self, word: &[Codepoint]) -> Option<usize> {
        let mut node_id = 0usize;
        let mut remaining = word;
        loop {
            if remaining.is_empty() {
                return if self.nodes[node_id].terminal.is_some() {
                    Some(node_id)
                } else {
                    None
                };
            }
            let children_level = self.nodes[node_id].children_level;
            if children_level == INVALID_INDEX {
                return None;
            }
            let found = self.trie.get(remaining[0], children_level);
            if !found.is_valid {
                return None;
            }
            let child_id = found.value as usize;
            let edge = &self.nodes[child_id].edge;
            if remaining.len() < edge.len() || &remaining[..edge.len()] != edge.as_slice() {
                return None;
            }
            remaining = &remaining[edge.len()..];
            node_id = child_id;
        }
    }

    pub fn terminal(&self, pos: TerminalPosition) -> Option<&Terminal> {
        self.nodes.get(pos as usize).and_then(|n| n.terminal.as_ref())
    }

    pub fn unigram_probability(&self, pos: TerminalPosition) -> i32 {
        match self.terminal(pos) {
            Some(t) if !t.unigram.is_not_a_word && !t.unigram.is_blacklisted => {
                t.unigram.probability as i32
            }
            _ => crate::types::NOT_A_PROBABILITY,
        }
    }

    pub fn bigram_level(&self, pos: TerminalPosition) -> i32 {
        self.terminal(pos).map(|t| t.bigram_level).unwrap_or(INVALID_INDEX)
    }

    /// Record the bigram-dispatch level allocated for `pos`'s terminal by
    /// the bigram store, which owns the TrieMap that level indexes into.
    pub fn set_bigram_level(&mut self, pos: TerminalPosition, level: i32) {
        if let Some(terminal) = self.nodes[pos as usize].terminal.as_mut() {
            terminal.bigram_level = level;
        }
    }

    pub fn spelling(&self, pos: TerminalPosition) -> Option<Vec<Codepoint>> {
        if self.nodes.get(pos as usize)?.terminal.is_none() {
            return None;
        }
        Some(self.spell(pos as usize))
    }

    fn spell(&self, node_id: usize) -> Vec<Codepoint> {
        let mut segments = Vec::new();
        let mut cur = node_id;
        loop {
            segments.push(&self.nodes[cur].edge);
            match self.nodes[cur].parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        segments.into_iter().rev().flatten().copied().collect()
    }

    /// Deterministic forward-iteration step for `getNextWordAndNextToken`.
    /// Tokens walk the node arena in insertion order; a token's meaning is
    /// undefined after a GC or migration on the same dictionary.
    pub fn next_word(&self, token: u32) -> Option<(Vec<Codepoint>, u32)> {
        let mut idx = token as usize;
        while idx < self.nodes.len() {
            if self.nodes[idx].terminal.is_some() {
                return Some((self.spell(idx), (idx + 1) as u32));
            }
            idx += 1;
        }
        None
    }

    fn is_mergeable(&self, node_id: usize) -> bool {
        let node = &self.nodes[node_id];
        if node.terminal.is_some() || node.edge.is_empty() {
            return false;
        }
        let level = node.children_level;
        if level == INVALID_INDEX {
            return false;
        }
        self.trie.iter_level(level).count() == 1
    }

    /// Count of non-terminal single-child nodes eligible for path
    /// compression, used by the GC trigger heuristic.
    pub fn mergeable_node_count(&self) -> usize {
        (1..self.nodes.len()).filter(|&id| self.is_mergeable(id)).count()
    }

    /// Splice out every mergeable single-child node, concatenating its edge
    /// onto its only child. Spliced nodes are left as empty, disconnected
    /// arena slots rather than renumbered, so surviving terminal positions
    /// are unaffected by this pass (document in callers that positions can
    /// still move across a full migration, which does renumber).
    pub fn compact(&mut self) {
        for node_id in 1..self.nodes.len() {
            if !self.is_mergeable(node_id) {
                continue;
            }
            let level = self.nodes[node_id].children_level;
            let Some((_, child_val)) = self.trie.iter_level(level).next() else {
                continue;
            };
            let child_id = child_val as usize;
            let Some(parent_id) = self.nodes[node_id].parent else {
                continue;
            };
            let merged_edge: Vec<Codepoint> = self.nodes[node_id]
                .edge
                .iter()
                .copied()
                .chain(self.nodes[child_id].edge.iter().copied())
                .collect();
            let first_of_node = self.nodes[node_id].edge[0];
            let parent_level = self.nodes[parent_id].children_level;

            self.trie.put(first_of_node, child_id as u64, parent_level);
            self.nodes[child_id].edge = merged_edge;
            self.nodes[child_id].parent = Some(parent_id);
            self.nodes[node_id].children_level = INVALID_INDEX;
            self.nodes[node_id].edge.clear();
        }
    }
}

fn common_prefix_len(a: &[Codepoint], b: &[Codepoint]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn to_lower_codepoint(cp: Codepoint) -> Codepoint {
    char::from_u32(cp)
        .and_then(|c| c.to_lowercase().next())
        .map(|c| c as u32)
        .unwrap_or(cp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cps(s: &str) -> Vec<Codepoint> {
        s.chars().map(|c| c as u32).collect()
    }

    #[test]
    fn insert_and_lookup_single_word() {
        let mut store = WordStore::new();
        let pos = store.add_unigram_word(&cps("cat"), UnigramProperty::new(120), 1).unwrap();
        assert_eq!(store.spelling(pos), Some(cps("cat")));
        assert_eq!(store.unigram_probability(pos), 120);
    }

    #[test]
    fn shared_prefix_splits_edge() {
        let mut store = WordStore::new();
        let cat = store.add_unigram_word(&cps("cat"), UnigramProperty::new(10), 1).unwrap();
        let car = store.add_unigram_word(&cps("car"), UnigramProperty::new(20), 1).unwrap();
        assert_ne!(cat, car);
        assert_eq!(store.spelling(cat), Some(cps("cat")));
        assert_eq!(store.spelling(car), Some(cps("car")));
        assert_eq!(store.unigram_probability(cat), 10);
        assert_eq!(store.unigram_probability(car), 20);
    }

    #[test]
    fn prefix_word_becomes_intermediate_terminal() {
        let mut store = WordStore::new();
        let cats = store.add_unigram_word(&cps("cats"), UnigramProperty::new(10), 1).unwrap();
        let cat = store.add_unigram_word(&cps("cat"), UnigramProperty::new(20), 1).unwrap();
        assert_ne!(cats, cat);
        assert_eq!(store.spelling(cat), Some(cps("cat")));
        assert_eq!(store.spelling(cats), Some(cps("cats")));
    }

    #[test]
    fn reinsertion_updates_in_place() {
        let mut store = WordStore::new();
        let pos1 = store.add_unigram_word(&cps("dog"), UnigramProperty::new(5), 1).unwrap();
        let pos2 = store.add_unigram_word(&cps("dog"), UnigramProperty::new(9), 2).unwrap();
        assert_eq!(pos1, pos2);
        assert_eq!(store.unigram_probability(pos1), 9);
        assert_eq!(store.terminal(pos1).unwrap().unigram.historical.count, 2);
    }

    #[test]
    fn missing_word_returns_none() {
        let mut store = WordStore::new();
        store.add_unigram_word(&cps("hello"), UnigramProperty::new(50), 1).unwrap();
        assert_eq!(store.terminal_position_of_word(&cps("help"), false), None);
    }

    #[test]
    fn force_lower_case_fallback() {
        let mut store = WordStore::new();
        let pos = store.add_unigram_word(&cps("hello"), UnigramProperty::new(50), 1).unwrap();
        let found = store
            .terminal_position_of_word(&cps("HELLO"), true)
            .unwrap();
        assert_eq!(found, pos);
        assert_eq!(store.terminal_position_of_word(&cps("HELLO"), false), None);
    }

    #[test]
    fn next_word_iterates_all_terminals() {
        let mut store = WordStore::new();
        store.add_unigram_word(&cps("a"), UnigramProperty::new(1), 1).unwrap();
        store.add_unigram_word(&cps("ab"), UnigramProperty::new(1), 1).unwrap();
        store.add_unigram_word(&cps("abc"), UnigramProperty::new(1), 1).unwrap();

        let mut found = Vec::new();
        let mut token = 0u32;
        while let Some((word, next)) = store.next_word(token) {
            found.push(word);
            token = next;
        }
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn compact_is_noop_on_a_single_leaf() {
        let mut store = WordStore::new();
        let pos = store.add_unigram_word(&cps("abcdef"), UnigramProperty::new(42), 1).unwrap();
        let before = store.spelling(pos);
        store.compact();
        assert_eq!(store.spelling(pos), before);
    }

    #[test]
    fn compact_merges_single_child_chain() {
        let mut store = WordStore::new();
        let cat = store.add_unigram_word(&cps("cat"), UnigramProperty::new(10), 1).unwrap();
        store.add_unigram_word(&cps("care"), UnigramProperty::new(20), 1).unwrap();

        // "cat"/"care" diverge after "ca", producing a non-terminal branch
        // node with two children ('t' and 'r'): not yet mergeable.
        let branch_id = store.nodes[cat as usize].parent.unwrap();
        assert!(!store.is_mergeable(branch_id));

        // Prune the "care" side's divergence directly, as a word-level
        // delete eventually would, leaving the branch with a single child.
        let level = store.nodes[branch_id].children_level;
        store.trie.remove(cps("care")[2], level);
        assert!(store.is_mergeable(branch_id));
        assert_eq!(store.mergeable_node_count(), 1);

        let before = store.spelling(cat);
        store.compact();
        assert_eq!(store.spelling(cat), before);
        assert_eq!(store.unigram_probability(cat), 10);
        assert_eq!(store.mergeable_node_count(), 0);
    }

    #[test]
    fn word_length_validation_rejects_empty_and_overlong() {
        let mut store = WordStore::new();
        assert!(store.add_unigram_word(&[], UnigramProperty::new(1), 1).is_err());
        let long = vec![65u32; crate::types::MAX_WORD_LENGTH + 1];
        assert!(store.add_unigram_word(&long, UnigramProperty::new(1), 1).is_err());
    }

    #[test]
    fn blacklisted_word_reports_not_a_probability() {
        let mut store = WordStore::new();
        let pos = store.add_unigram_word(&cps("spam"), UnigramProperty::new(10), 1).unwrap();
        store.nodes[pos as usize]
            .terminal
            .as_mut()
            .unwrap()
            .unigram
            .is_blacklisted = true;
        assert_eq!(store.unigram_probability(pos), crate::types::NOT_A_PROBABILITY);
    }
}
