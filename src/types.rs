//! Shared data-model types: words, terminal positions, and the per-word /
//! per-edge statistics records carried by the word store and bigram store.

use serde::{Deserialize, Serialize};

/// Maximum number of codepoints a stored word may hold.
pub const MAX_WORD_LENGTH: usize = 48;

/// Sentinel returned by probability lookups when no record exists.
pub const NOT_A_PROBABILITY: i32 = -1;

/// Sentinel identifying the absence of a terminal.
pub const NOT_A_DICT_POS: u32 = u32::MAX;

/// A single Unicode scalar, stored as a 32-bit value throughout the file
/// format and the in-memory trie.
pub type Codepoint = u32;

/// An opaque handle to a word's terminal node.
///
/// Stable only until the next `flushWithGC` or migration on the same
/// dictionary handle — see `spec.md` §3 "Terminal position".
pub type TerminalPosition = u32;

/// Validate a candidate word's length against `MAX_WORD_LENGTH`.
pub fn validate_word_length(len: usize) -> Result<(), crate::error::DictError> {
    if len == 0 || len > MAX_WORD_LENGTH {
        return Err(crate::error::DictError::InvalidWordLength {
            got: len,
            max: MAX_WORD_LENGTH,
        });
    }
    Ok(())
}

/// An alternative surface form suggested from a source word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutProperty {
    pub target: Vec<Codepoint>,
    pub probability: u8,
}

/// Historical counters shared by unigram and bigram records.
///
/// Update policy (per `spec.md` §4.2/§9, resolved here — see `DESIGN.md`):
/// on re-insertion, `count` saturates upward, `level` takes the max of old
/// and new, and `timestamp` is replaced with the dictionary's current
/// logical-clock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoricalInfo {
    pub level: u8,
    pub count: u16,
    pub timestamp: u32,
}

impl HistoricalInfo {
    pub fn merge(self, incoming: HistoricalInfo) -> HistoricalInfo {
        HistoricalInfo {
            level: self.level.max(incoming.level),
            count: self.count.saturating_add(incoming.count.max(1)),
            timestamp: incoming.timestamp,
        }
    }
}

/// Per-terminal unigram record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnigramProperty {
    pub probability: u8,
    pub historical: HistoricalInfo,
    pub is_not_a_word: bool,
    pub is_blacklisted: bool,
    pub shortcuts: Vec<ShortcutProperty>,
}

impl UnigramProperty {
    pub fn new(probability: u8) -> Self {
        Self {
            probability,
            historical: HistoricalInfo::default(),
            is_not_a_word: false,
            is_blacklisted: false,
            shortcuts: Vec::new(),
        }
    }

    /// Merge policy applied when `addUnigramWord` targets an existing terminal.
    pub fn merge_update(&mut self, incoming: &UnigramProperty, now: u32) {
        self.probability = incoming.probability;
        self.is_not_a_word = incoming.is_not_a_word;
        self.is_blacklisted = incoming.is_blacklisted;
        self.historical = self.historical.merge(HistoricalInfo {
            level: incoming.historical.level,
            count: incoming.historical.count,
            timestamp: now,
        });
        if !incoming.shortcuts.is_empty() {
            self.shortcuts = incoming.shortcuts.clone();
        }
    }
}

/// A single outgoing bigram edge's statistics (target is implicit — it is
/// the TrieMap key the record is stored under).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigramProperty {
    pub probability: u8,
    pub historical: HistoricalInfo,
}

impl BigramProperty {
    pub fn new(probability: u8) -> Self {
        Self {
            probability,
            historical: HistoricalInfo::default(),
        }
    }
}

/// Read-only, dense export of a terminal — never references internal memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordProperty {
    pub codepoints: Vec<Codepoint>,
    pub unigram: UnigramProperty,
    pub bigrams: Vec<(Vec<Codepoint>, BigramProperty)>,
}

impl WordProperty {
    pub fn shortcuts(&self) -> &[ShortcutProperty] {
        &self.unigram.shortcuts
    }
}
