//! Byte buffers used by the plankton codecs.
//!
//! [`Writer`] is an auto-growing output buffer, [`Reader`] a cursor over a
//! borrowed byte slice whose reads never go past the end of the input.
//! All multi-byte numbers are little-endian.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

/// Error raised when a read would run past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("end of buffer: needed {needed} byte(s) at offset {offset}, {available} available")]
    EndOfBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },
}
