//! Tunable limits and stream settings.
//!
//! Both structs deserialize with every field optional, so a config file only
//! needs to name what it overrides:
//!
//! ```
//! use plankton::StreamOptions;
//!
//! let opts: StreamOptions = serde_json::from_str(r#"{"checksums": false}"#).unwrap();
//! assert!(!opts.checksums);
//! assert_eq!(opts.codec.max_depth, 64);
//! ```

use serde::{Deserialize, Serialize};

/// Limits applied while encoding and decoding a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Deepest allowed nesting of sequences, mappings and records.
    pub max_depth: usize,
    /// Largest element count accepted for a single sequence, mapping,
    /// string or byte blob.
    pub max_collection_len: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_collection_len: 16 * 1024 * 1024,
        }
    }
}

/// Settings for [`StreamWriter`](crate::stream::StreamWriter) and
/// [`StreamReader`](crate::stream::StreamReader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Append a CRC-32 of every record payload. Only read by writers; readers
    /// follow the stream header.
    pub checksums: bool,
    /// Largest record payload or schema descriptor a reader accepts.
    pub max_frame_len: usize,
    pub codec: CodecOptions,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            checksums: true,
            max_frame_len: 64 * 1024 * 1024,
            codec: CodecOptions::default(),
        }
    }
}
