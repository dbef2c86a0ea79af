//! Random-access byte region backing a dictionary file.
//!
//! Mirrors the owned-vs-mapped split the teacher uses for its trie storage
//! (`dict/trie_dict.rs`'s `TrieStore`/`ValuesStore`): a freshly-created or
//! loaded-for-mutation dictionary owns a growable `Vec<u8>`, while a
//! dictionary opened read-only maps the file directly and serves reads
//! without copying it into the heap.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::DictError;

/// A random-access byte region, either a mutable owned buffer or an
/// immutable memory-mapped file.
pub enum Buffer {
    ReadWrite(Vec<u8>),
    ReadOnly(Mmap),
}

impl Buffer {
    pub fn empty() -> Self {
        Buffer::ReadWrite(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Buffer::ReadWrite(bytes)
    }

    /// Memory-map `path` read-only.
    pub fn open_mmap(path: &Path) -> Result<Self, DictError> {
        let file = File::open(path)?;
        // SAFETY: the file is opened read-only for the lifetime of this
        // mapping and is not concurrently truncated by this process.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Buffer::ReadOnly(mmap))
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::ReadWrite(v) => v.as_slice(),
            Buffer::ReadOnly(m) => &m[..],
        }
    }

    pub fn is_updatable(&self) -> bool {
        matches!(self, Buffer::ReadWrite(_))
    }

    /// Bounds-checked read of `len` bytes starting at `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8], DictError> {
        let data = self.as_slice();
        let end = offset
            .checked_add(len)
            .ok_or(DictError::Corrupted("offset overflow".into()))?;
        data.get(offset..end)
            .ok_or(DictError::Corrupted(format!(
                "read out of range: offset={offset} len={len} buffer_len={}",
                data.len()
            )))
    }

    /// Append `data` to the buffer, returning the offset it was written at.
    /// Only valid on a `ReadWrite` buffer.
    pub fn append(&mut self, data: &[u8]) -> Result<usize, DictError> {
        match self {
            Buffer::ReadWrite(v) => {
                let offset = v.len();
                v.extend_from_slice(data);
                Ok(offset)
            }
            Buffer::ReadOnly(_) => Err(DictError::NotUpdatable),
        }
    }

    /// Overwrite `len` bytes at `offset` in place. Only valid on a
    /// `ReadWrite` buffer and when the region already exists.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), DictError> {
        match self {
            Buffer::ReadWrite(v) => {
                let end = offset
                    .checked_add(data.len())
                    .ok_or(DictError::Corrupted("offset overflow".into()))?;
                if end > v.len() {
                    return Err(DictError::Corrupted(format!(
                        "write out of range: offset={offset} len={} buffer_len={}",
                        data.len(),
                        v.len()
                    )));
                }
                v[offset..end].copy_from_slice(data);
                Ok(())
            }
            Buffer::ReadOnly(_) => Err(DictError::NotUpdatable),
        }
    }

    /// Promote a read-only (mmap) buffer to an owned, writable copy.
    pub fn to_owned_writable(&self) -> Buffer {
        Buffer::ReadWrite(self.as_slice().to_vec())
    }
}
