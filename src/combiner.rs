//! Deterministic unigram/bigram probability combiner (`spec.md` §4.5).
//!
//! Pure integer arithmetic so that the same two inputs always blend to the
//! same score across platforms and over time — this mirrors the teacher's
//! `converter/cost.rs`, which keeps all scoring in fixed-point integers for
//! the same reason (floating point would make viterbi path comparisons
//! non-reproducible across builds).

use crate::types::NOT_A_PROBABILITY;

const SCALE: i32 = 255;

/// Blend a unigram probability (0..=255) with an optional bigram
/// probability (0..=255, or `NOT_A_PROBABILITY`) into one score.
///
/// - `unigram_probability == NOT_A_PROBABILITY` always yields
///   `NOT_A_PROBABILITY` (a word that doesn't exist can't be scored).
/// - `bigram_probability == NOT_A_PROBABILITY` yields `unigram_probability`
///   unchanged (no bigram context to boost with).
/// - Otherwise the bigram probability boosts the unigram probability
///   toward the maximum, strictly monotonic in both inputs.
pub fn combine(unigram_probability: i32, bigram_probability: i32) -> i32 {
    if unigram_probability == NOT_A_PROBABILITY {
        return NOT_A_PROBABILITY;
    }
    if bigram_probability == NOT_A_PROBABILITY {
        return unigram_probability;
    }

    let u = unigram_probability.clamp(0, SCALE);
    let b = bigram_probability.clamp(0, SCALE);
    let headroom = SCALE - u;
    let boost = (b * headroom) / SCALE;
    (u + boost).clamp(0, SCALE)
}
