#[cfg(not(target_endian = "little"))]
compile_error!("dict-core requires a little-endian platform");

pub mod bigram_store;
pub mod buffer;
pub mod clock;
pub mod codec;
pub mod combiner;
pub mod dictionary;
pub mod error;
pub mod gc;
pub mod header;
pub mod trie_map;
pub mod types;
pub mod word_store;

pub use dictionary::{Dictionary, DictionaryEntry, DictStats};
pub use error::DictError;
