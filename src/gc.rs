//! Garbage collection thresholds and the compaction pass itself
//! (`spec.md` §4.6 "GC and migration").
//!
//! `flushWithGC`'s actual work is two independent compactions: dropping
//! tombstoned bigram entries and re-merging non-terminal single-child
//! chains in the word store's patricia trie (path compression). Both are
//! cheap to measure as ratios, which is what `needsToRunGC` trades on.

use crate::bigram_store::BigramStore;
use crate::word_store::WordStore;

/// Trigger thresholds for `needsToRunGC`. Constructed explicitly by the
/// caller (unlike the teacher's `Settings`, which is a process-wide
/// `OnceLock` loaded from TOML) since GC policy is a per-dictionary-handle
/// concern, not global configuration — see `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcThresholds {
    pub tombstone_ratio: f64,
    pub tombstone_ratio_strict: f64,
    pub mergeable_node_ratio: f64,
    pub mergeable_node_ratio_strict: f64,
}

impl Default for GcThresholds {
    fn default() -> Self {
        GcThresholds {
            tombstone_ratio: 0.30,
            tombstone_ratio_strict: 0.10,
            mergeable_node_ratio: 0.25,
            mergeable_node_ratio_strict: 0.08,
        }
    }
}

/// Whether a GC pass is warranted right now. `minds_block_by_gc` indicates
/// the caller is latency-sensitive (e.g. mid-keystroke) and so should
/// trigger GC earlier, at the stricter thresholds, to avoid a single huge
/// blocking compaction building up later.
pub fn needs_to_run_gc(
    word_store: &WordStore,
    bigram_store: &BigramStore,
    thresholds: &GcThresholds,
    minds_block_by_gc: bool,
) -> bool {
    let node_count = word_store.node_count().max(1);
    let mergeable_ratio = word_store.mergeable_node_count() as f64 / node_count as f64;

    let total_bigrams = bigram_store.total_entry_count().max(1);
    let tombstone_ratio = bigram_store.tombstone_count() as f64 / total_bigrams as f64;

    let (tombstone_threshold, mergeable_threshold) = if minds_block_by_gc {
        (thresholds.tombstone_ratio_strict, thresholds.mergeable_node_ratio_strict)
    } else {
        (thresholds.tombstone_ratio, thresholds.mergeable_node_ratio)
    };

    tombstone_ratio >= tombstone_threshold || mergeable_ratio >= mergeable_threshold
}

/// Run the compaction pass: purge bigram tombstones and path-compress the
/// word store. Pure in-memory; callers are responsible for the subsequent
/// `flush` to disk.
pub fn run_gc(word_store: &mut WordStore, bigram_store: &mut BigramStore) {
    word_store.compact();
    bigram_store.compact();
}
