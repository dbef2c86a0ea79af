//! File header: magic, format version, option flags, locale, and the
//! string-valued attribute map (`spec.md` §6).
//!
//! ```text
//! Header := Magic(4B) | FormatVersion(2B LE) | OptionFlags(2B LE)
//!         | HeaderSize(4B LE) | AttributeBlock(HeaderSize-12 bytes)
//! AttributeBlock := repeated { KeyZStr | ValueZStr } terminated by empty key
//! ```
//!
//! `locale` is not a distinct field in the wire grammar above; it is
//! carried as the well-known attribute key `"locale"` (see `DESIGN.md`,
//! resolving the §3/§6 tension over where locale lives on the wire).

use std::collections::BTreeMap;

use crate::codec::{decode_zstr_to_string, encode_str_zstr};
use crate::error::DictError;

pub const MAGIC: &[u8; 4] = b"PTDX";

/// Format versions this crate can open. The highest is the version newly
/// constructed dictionaries are written at.
pub const SUPPORTED_VERSIONS: &[u16] = &[3, 4];
pub const CURRENT_FORMAT_VERSION: u16 = 4;

pub const LOCALE_KEY: &str = "locale";
pub const DICTIONARY_KEY: &str = "dictionary";
pub const VERSION_KEY: &str = "version";
pub const DATE_KEY: &str = "date";

const FIXED_HEADER_PREFIX: usize = 4 + 2 + 2 + 4; // magic + version + flags + header_size

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionFlags(pub u16);

impl OptionFlags {
    pub const NONE: OptionFlags = OptionFlags(0);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub format_version: u16,
    pub flags: OptionFlags,
    pub attributes: BTreeMap<String, String>,
}

impl Header {
    pub fn new(format_version: u16, locale: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(LOCALE_KEY.to_string(), locale.to_string());
        Header {
            format_version,
            flags: OptionFlags::NONE,
            attributes,
        }
    }

    pub fn locale(&self) -> &str {
        self.attributes
            .get(LOCALE_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Serialize the header (magic through the attribute block's
    /// terminating empty key).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut attr_block = Vec::new();
        for (key, value) in &self.attributes {
            // Keys/values are disallowed from containing NUL codepoints by
            // construction (encode_str_zstr rejects them); attribute keys
            // and values set through `set_attribute` with embedded NULs are
            // silently dropped from the persisted block, matching the
            // "question-mark policy" leniency on the read side.
            let (Some(k), Some(v)) = (encode_str_zstr(key), encode_str_zstr(value)) else {
                continue;
            };
            attr_block.extend(k);
            attr_block.extend(v);
        }
        attr_block.push(0); // empty key terminates the block

        let header_size = (FIXED_HEADER_PREFIX + attr_block.len()) as u32;

        let mut out = Vec::with_capacity(header_size as usize);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.format_version.to_le_bytes());
        out.extend_from_slice(&self.flags.0.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&attr_block);
        out
    }

    /// Parse a header from the start of `data`. Returns the header and the
    /// byte offset immediately following it (the start of the body).
    pub fn from_bytes(data: &[u8]) -> Result<(Header, usize), DictError> {
        if data.len() < FIXED_HEADER_PREFIX {
            return Err(DictError::InvalidHeader);
        }
        if &data[0..4] != MAGIC {
            return Err(DictError::InvalidMagic);
        }
        let format_version = u16::from_le_bytes(data[4..6].try_into().unwrap());
        if !SUPPORTED_VERSIONS.contains(&format_version) {
            return Err(DictError::UnsupportedVersion(format_version));
        }
        let flags = OptionFlags(u16::from_le_bytes(data[6..8].try_into().unwrap()));
        let header_size = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
        if header_size < FIXED_HEADER_PREFIX || data.len() < header_size {
            return Err(DictError::InvalidHeader);
        }

        let attr_block = &data[FIXED_HEADER_PREFIX..header_size];
        let attributes = parse_attribute_block(attr_block)?;

        Ok((
            Header {
                format_version,
                flags,
                attributes,
            },
            header_size,
        ))
    }
}

fn parse_attribute_block(block: &[u8]) -> Result<BTreeMap<String, String>, DictError> {
    let mut attributes = BTreeMap::new();
    let mut pos = 0;
    loop {
        if pos >= block.len() {
            return Err(DictError::InvalidHeader);
        }
        if block[pos] == 0 {
            // Empty key terminates the block.
            return Ok(attributes);
        }
        let key = decode_zstr_to_string(block, &mut pos).ok_or(DictError::InvalidHeader)?;
        let value = decode_zstr_to_string(block, &mut pos)
            .unwrap_or_else(|| "?".to_string());
        attributes.insert(key, value);
    }
}
