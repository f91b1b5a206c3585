//! Framed record streams.
//!
//! ```text
//! header   "PLNK" | format version (1) | flags (bit 0: checksums)
//! define   0xC0 | version varint | descriptor length varint | descriptor
//!               | 28-byte SHA-224 fingerprint
//! record   0xF1 | version varint | payload length varint | payload
//!               | CRC-32 of payload, little-endian (when checksums are on)
//! ```
//!
//! The header is followed by the definition of the stream's initial
//! schema; more definitions may appear between records. Records refer to
//! their writer schema by version.

mod checksum;
mod frame;
mod reader;
mod writer;

pub use checksum::compute_checksum;
pub use reader::StreamReader;
pub use writer::StreamWriter;

use crate::schema::SchemaVersion;
use crate::value::Value;

pub const MAGIC: [u8; 4] = *b"PLNK";
pub const FORMAT_VERSION: u8 = 1;
pub const FLAG_CHECKSUMS: u8 = 0x01;

pub(crate) const OP_DEFINE_SCHEMA: u8 = 0xc0;
pub(crate) const OP_RECORD: u8 = 0xf1;

/// One decoded record and the version of the schema it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub version: SchemaVersion,
    pub value: Value,
}
