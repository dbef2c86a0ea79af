//! The public dictionary façade (`spec.md` §3 "Dictionary handle", §5
//! "Concurrency model").
//!
//! Owns the header, the word/bigram stores, and a per-handle logical
//! clock. Mirrors the shape of the teacher's `TrieDictionary`: a thin
//! struct wrapping storage plus stats/GC/flush, with lookups delegating
//! straight to the underlying stores and never raising `DictError` —
//! that type is reserved for `open`/`flush`/`migrate`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::bigram_store::BigramStore;
use crate::buffer::Buffer;
use crate::clock::LogicalClock;
use crate::combiner::combine;
use crate::error::DictError;
use crate::gc::{needs_to_run_gc as gc_needs_to_run, run_gc, GcThresholds};
use crate::header::{Header, CURRENT_FORMAT_VERSION};
use crate::types::{
    validate_word_length, Codepoint, TerminalPosition, WordProperty, NOT_A_PROBABILITY,
};
use crate::word_store::WordStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Body {
    word_store: WordStore,
    bigram_store: BigramStore,
}

/// An open predictive-text dictionary.
///
/// Not `Sync`: concurrent readers must each open their own handle (cheap,
/// since a read-only open just mmaps the file), and a single handle's
/// mutating operations are not safe to call concurrently with its own
/// reads — see `spec.md` §5.
pub struct Dictionary {
    header: Header,
    body: Body,
    clock: LogicalClock,
    thresholds: GcThresholds,
    corrupted: bool,
}

/// Snapshot counters for introspection and tests (`spec.md` §4.11,
/// expanded here from the teacher's `TrieDictionary::stats()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictStats {
    pub word_count: usize,
    pub node_count: usize,
    pub bigram_count: usize,
    pub bigram_tombstone_count: usize,
    pub mergeable_node_count: usize,
    pub format_version: u16,
}

impl Dictionary {
    pub fn create(locale: &str) -> Self {
        Dictionary {
            header: Header::new(CURRENT_FORMAT_VERSION, locale),
            body: Body::default(),
            clock: LogicalClock::new(),
            thresholds: GcThresholds::default(),
            corrupted: false,
        }
    }

    pub fn with_thresholds(mut self, thresholds: GcThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Open a dictionary file read-only, memory-mapped.
    pub fn open(path: &Path) -> Result<Self, DictError> {
        let span = debug_span!("dict_open", path = %path.display());
        let _enter = span.enter();
        Self::from_buffer(Buffer::open_mmap(path)?)
    }

    /// Open a dictionary file for mutation; the whole body is read into
    /// memory up front, matching the teacher's `TrieDictionary::open_mut`.
    pub fn open_writable(path: &Path) -> Result<Self, DictError> {
        let bytes = fs::read(path)?;
        Self::from_buffer(Buffer::from_bytes(bytes))
    }

    fn from_buffer(buffer: Buffer) -> Result<Self, DictError> {
        let data = buffer.as_slice();
        let (header, body_start) = Header::from_bytes(data)?;
        let raw_body = &data[body_start..];
        if raw_body.len() < 4 {
            return Err(DictError::Corrupted("body shorter than its checksum".into()));
        }
        let (body_bytes, checksum_bytes) = raw_body.split_at(raw_body.len() - 4);
        let expected = u32::from_le_bytes(checksum_bytes.try_into().unwrap());
        let corrupted = crc32fast::hash(body_bytes) != expected;
        if corrupted {
            debug!("dictionary body checksum mismatch");
        }

        let body: Body = bincode::deserialize(body_bytes).map_err(|e| {
            debug!(error = %e, "dictionary body failed to deserialize");
            DictError::Deserialize(e)
        })?;
        Ok(Dictionary {
            header,
            body,
            clock: LogicalClock::new(),
            thresholds: GcThresholds::default(),
            corrupted,
        })
    }

    /// Whether the last `open`/`open_writable` detected a checksum
    /// mismatch on the body. A corrupted dictionary still opens (its body
    /// deserialized successfully) but callers should treat its contents as
    /// suspect, per `spec.md` §4.6's migration/corruption notes.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    pub fn format_version(&self) -> u16 {
        self.header.format_version
    }

    pub fn locale(&self) -> &str {
        self.header.locale()
    }

    pub fn header_attribute(&self, key: &str) -> Option<&str> {
        self.header.attribute(key)
    }

    pub fn set_header_attribute(&mut self, key: &str, value: &str) {
        self.header.set_attribute(key, value);
    }

    pub fn add_unigram_word(
        &mut self,
        word: &[Codepoint],
        probability: u8,
    ) -> Result<TerminalPosition, DictError> {
        self.add_unigram_word_with_property(word, crate::types::UnigramProperty::new(probability))
    }

    /// Full-control insert, accepting flags/shortcuts/historical counters
    /// directly rather than just a probability.
    pub fn add_unigram_word_with_property(
        &mut self,
        word: &[Codepoint],
        property: crate::types::UnigramProperty,
    ) -> Result<TerminalPosition, DictError> {
        let now = self.clock.advance();
        self.body.word_store.add_unigram_word(word, property, now)
    }

    pub fn add_bigram_words(
        &mut self,
        source_word: &[Codepoint],
        target_word: &[Codepoint],
        probability: u8,
        force_lower_case: bool,
    ) -> Result<(), DictError> {
        validate_word_length(source_word.len())?;
        validate_word_length(target_word.len())?;
        let source = self
            .body
            .word_store
            .terminal_position_of_word(source_word, force_lower_case)
            .ok_or_else(|| DictError::Corrupted("bigram source word not in dictionary".into()))?;
        let target = self
            .body
            .word_store
            .terminal_position_of_word(target_word, force_lower_case)
            .ok_or_else(|| DictError::Corrupted("bigram target word not in dictionary".into()))?;
        let now = self.clock.advance();
        self.body
            .bigram_store
            .add_bigram(&mut self.body.word_store, source, target, probability, now);
        Ok(())
    }

    pub fn remove_bigram_words(
        &mut self,
        source_word: &[Codepoint],
        target_word: &[Codepoint],
    ) -> bool {
        let Some(source) = self
            .body
            .word_store
            .terminal_position_of_word(source_word, false)
        else {
            return false;
        };
        let Some(target) = self
            .body
            .word_store
            .terminal_position_of_word(target_word, false)
        else {
            return false;
        };
        self.body
            .bigram_store
            .remove_bigram(&self.body.word_store, source, target)
    }

    pub fn probability(&self, word: &[Codepoint], force_lower_case: bool) -> i32 {
        match self
            .body
            .word_store
            .terminal_position_of_word(word, force_lower_case)
        {
            Some(pos) => self.body.word_store.unigram_probability(pos),
            None => NOT_A_PROBABILITY,
        }
    }

    pub fn bigram_probability(
        &self,
        source_word: &[Codepoint],
        target_word: &[Codepoint],
        force_lower_case: bool,
    ) -> i32 {
        let Some(source) = self
            .body
            .word_store
            .terminal_position_of_word(source_word, force_lower_case)
        else {
            return NOT_A_PROBABILITY;
        };
        let Some(target) = self
            .body
            .word_store
            .terminal_position_of_word(target_word, force_lower_case)
        else {
            return NOT_A_PROBABILITY;
        };
        let unigram = self.body.word_store.unigram_probability(target);
        let bigram = self
            .body
            .bigram_store
            .probability(&self.body.word_store, source, target);
        combine(unigram, bigram)
    }

    /// Predicted next words following `source_word`, each combined with its
    /// own unigram probability. Suggestion ranking/filtering beyond this
    /// raw combined score is an external collaborator's job (out of scope,
    /// per `spec.md`'s Non-goals).
    pub fn get_predictions(&self, source_word: &[Codepoint]) -> Vec<(Vec<Codepoint>, i32)> {
        let Some(source) = self
            .body
            .word_store
            .terminal_position_of_word(source_word, false)
        else {
            return Vec::new();
        };
        self.body
            .bigram_store
            .predictions(&self.body.word_store, source)
            .into_iter()
            .map(|(word, bigram)| {
                let unigram = self
                    .body
                    .word_store
                    .terminal_position_of_word(&word, false)
                    .map(|pos| self.body.word_store.unigram_probability(pos))
                    .unwrap_or(NOT_A_PROBABILITY);
                (word, combine(unigram, bigram.probability as i32))
            })
            .collect()
    }

    pub fn get_word_property(
        &self,
        word: &[Codepoint],
        force_lower_case: bool,
    ) -> Option<WordProperty> {
        let pos = self
            .body
            .word_store
            .terminal_position_of_word(word, force_lower_case)?;
        let terminal = self.body.word_store.terminal(pos)?;
        let bigrams = self
            .body
            .bigram_store
            .predictions(&self.body.word_store, pos);
        Some(WordProperty {
            codepoints: self.body.word_store.spelling(pos).unwrap_or_default(),
            unigram: terminal.unigram.clone(),
            bigrams,
        })
    }

    /// One step of the iteration protocol: `token == 0` starts from the
    /// beginning. Returned tokens are valid only until the next GC or
    /// migration on this handle (`spec.md` §3 "Iteration token").
    pub fn get_next_word_and_next_token(&self, token: u32) -> Option<(Vec<Codepoint>, u32)> {
        self.body.word_store.next_word(token)
    }

    pub fn needs_to_run_gc(&self, minds_block_by_gc: bool) -> bool {
        gc_needs_to_run(
            &self.body.word_store,
            &self.body.bigram_store,
            &self.thresholds,
            minds_block_by_gc,
        )
    }

    pub fn flush(&self, path: &Path) -> Result<(), DictError> {
        let span = debug_span!("dict_flush", path = %path.display());
        let _enter = span.enter();
        self.write_atomic(path)
    }

    pub fn flush_with_gc(&mut self, path: &Path) -> Result<(), DictError> {
        let span = debug_span!("dict_flush_with_gc", path = %path.display());
        let _enter = span.enter();
        debug!(
            node_count = self.body.word_store.node_count(),
            mergeable = self.body.word_store.mergeable_node_count(),
            tombstones = self.body.bigram_store.tombstone_count(),
            "running GC before flush"
        );
        run_gc(&mut self.body.word_store, &mut self.body.bigram_store);
        self.write_atomic(path)
    }

    /// Atomic write: serialize to a sibling `.tmp` file, then rename over
    /// the target, so a crash mid-write never leaves a half-written
    /// dictionary at `path` — the same pattern the teacher uses to persist
    /// `user_dict`/`user_history`.
    fn write_atomic(&self, path: &Path) -> Result<(), DictError> {
        let body_bytes = bincode::serialize(&self.body).map_err(DictError::Serialize)?;
        let checksum = crc32fast::hash(&body_bytes);

        let mut out = self.header.to_bytes();
        out.extend(body_bytes);
        out.extend(checksum.to_le_bytes());

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &out)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Reinsert every live word and bigram into a freshly constructed
    /// dictionary at `target_format_version`, via the public iteration
    /// surface, as `spec.md` §4.6 requires. `self` is never mutated; on
    /// failure the partially built target is simply dropped.
    pub fn migrate(&self, target_format_version: u16) -> Result<Dictionary, DictError> {
        let span = debug_span!(
            "dict_migrate",
            from = self.header.format_version,
            to = target_format_version
        );
        let _enter = span.enter();

        let mut migrated = Dictionary {
            header: Header::new(target_format_version, self.header.locale()),
            body: Body::default(),
            clock: LogicalClock::new(),
            thresholds: self.thresholds,
            corrupted: false,
        };
        for (key, value) in &self.header.attributes {
            migrated.header.set_attribute(key, value);
        }

        let mut token = 0u32;
        while let Some((word, next_token)) = self.body.word_store.next_word(token) {
            token = next_token;
            let Some(terminal) = self
                .body
                .word_store
                .terminal_position_of_word(&word, false)
                .and_then(|pos| self.body.word_store.terminal(pos))
            else {
                continue;
            };
            migrated.add_unigram_word_with_property(&word, terminal.unigram.clone())?;
        }

        let mut token = 0u32;
        while let Some((source_word, next_token)) = self.body.word_store.next_word(token) {
            token = next_token;
            let Some(source_pos) = self
                .body
                .word_store
                .terminal_position_of_word(&source_word, false)
            else {
                continue;
            };
            for (target_word, bigram) in self
                .body
                .bigram_store
                .predictions(&self.body.word_store, source_pos)
            {
                migrated.add_bigram_words(&source_word, &target_word, bigram.probability, false)?;
            }
        }

        debug!(
            words = migrated.count_words(),
            "migration complete"
        );
        Ok(migrated)
    }

    /// Apply a batch of unigram/bigram writes starting at `start_index`
    /// (`spec.md` §6 `addMultipleDictionaryEntries`). If GC is warranted
    /// under latency-sensitive thresholds partway through, processing stops
    /// without running GC itself and the index of the next unprocessed
    /// entry is returned so the caller can `flush_with_gc` and resume from
    /// there; a return equal to `entries.len()` means the whole batch
    /// landed. An insertion failure aborts the batch at that entry.
    pub fn add_multiple_dictionary_entries(
        &mut self,
        entries: &[DictionaryEntry],
        start_index: usize,
    ) -> Result<usize, DictError> {
        for (index, entry) in entries.iter().enumerate().skip(start_index) {
            if self.needs_to_run_gc(true) {
                debug!(index, "batch paused for GC");
                return Ok(index);
            }
            match entry {
                DictionaryEntry::Unigram { word, probability } => {
                    self.add_unigram_word(word, *probability).map_err(|e| {
                        debug!(index, error = %e, "batch entry failed");
                        e
                    })?;
                }
                DictionaryEntry::Bigram {
                    source,
                    target,
                    probability,
                } => {
                    self.add_bigram_words(source, target, *probability, false)
                        .map_err(|e| {
                            debug!(index, error = %e, "batch entry failed");
                            e
                        })?;
                }
            }
        }
        Ok(entries.len())
    }

    pub fn stats(&self) -> DictStats {
        DictStats {
            word_count: self.count_words(),
            node_count: self.body.word_store.node_count(),
            bigram_count: self.body.bigram_store.total_entry_count(),
            bigram_tombstone_count: self.body.bigram_store.tombstone_count(),
            mergeable_node_count: self.body.word_store.mergeable_node_count(),
            format_version: self.header.format_version,
        }
    }

    fn count_words(&self) -> usize {
        let mut count = 0;
        let mut token = 0u32;
        while let Some((_, next_token)) = self.body.word_store.next_word(token) {
            count += 1;
            token = next_token;
        }
        count
    }
}

/// One entry in a batched write (`spec.md` §6 `addMultipleDictionaryEntries`).
pub enum DictionaryEntry {
    Unigram {
        word: Vec<Codepoint>,
        probability: u8,
    },
    Bigram {
        source: Vec<Codepoint>,
        target: Vec<Codepoint>,
        probability: u8,
    },
}
