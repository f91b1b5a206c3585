//! Self-describing tagged encoding.
//!
//! Every value starts with a tag byte naming its kind, so it can be read
//! without a schema. Small integers, short strings and short collections
//! fold their payload or length into the tag:
//!
//! ```text
//! 0x00..0x05   int 0..5          0x0f 0x0e 0x0d   int -1 -2 -3
//! 0x08 varint  int n             0x09 varint      int -(n + 1)
//! 0x10 null    0x11 true         0x12 false
//! 0x14..0x17   id, 2/4/8/16 big-endian bytes (smallest that fits)
//! 0x1a f32     0x1b f64          (f32 when exact)
//! 0x20..0x23   array of 0..3     0x28 varint      array of n
//! 0x30..0x33   map of 0..3       0x38 varint      map of n, string keys
//! 0x48 varint  blob of n bytes
//! 0x50..0x57   string of 0..7    0x58 varint      string of n bytes
//! 0x60..0x63   seed of 0..3      0x68 varint      seed of n fields
//! 0x80..0x87   struct, tags 0..k 0x88 varint tags struct of n fields
//! 0xa0 value   registers value   0xa1 varint      the value n+1 back
//! ```
//!
//! A seed is its header value followed by its string-keyed fields. A struct
//! is its tag list (see the `nibbles` module) followed by one value per tag.
//! `0xa0` numbers values in the order they start, so a reference may only
//! name a value that is already finished.
//!
//! Schema-guided payloads embed this encoding for `any` nodes, and schema
//! descriptors use it for field defaults.

mod constants;
mod decoder;
mod encoder;
mod nibbles;

pub use decoder::TaggedDecoder;
pub use encoder::{narrow_float, TaggedEncoder};

use crate::error::{Error, Result};
use crate::value::Value;

/// How string payloads are read. Strings are always written as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl StringEncoding {
    fn decode(self, bytes: &[u8], offset: usize) -> Result<String> {
        match self {
            StringEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| Error::InvalidUtf8 { offset }),
            StringEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Encodes `value` with default limits.
pub fn encode_tagged(value: &Value) -> Result<Vec<u8>> {
    TaggedEncoder::new().encode(value)
}

/// Decodes one value with default limits.
pub fn decode_tagged(data: &[u8]) -> Result<Value> {
    TaggedDecoder::new().decode(data)
}
