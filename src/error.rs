use std::io;

/// Unified error type for the dictionary container's I/O and format boundary.
///
/// Lookups and in-memory mutations never raise this — they return the
/// documented sentinel (`NOT_A_PROBABILITY`, `NOT_A_DICT_POS`) or a `bool`.
/// `DictError` is reserved for `open`, `flush`/`flushWithGC`, and migration.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short or malformed attribute block)")]
    InvalidHeader,

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("dictionary body is corrupted: {0}")]
    Corrupted(String),

    #[error("dictionary is not updatable")]
    NotUpdatable,

    #[error("word length out of range (1..={max}), got {got}")]
    InvalidWordLength { got: usize, max: usize },
}
