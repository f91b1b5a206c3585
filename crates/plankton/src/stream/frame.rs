//! Frame encoding and incremental frame reading.

use std::io::{self, Read};

use plankton_buffers::{Reader, Writer};

use super::checksum::compute_checksum;
use super::{OP_DEFINE_SCHEMA, OP_RECORD};
use crate::codec::varint::{read_varint, write_varint, MAX_VARINT_LEN};
use crate::error::{Error, Result};
use crate::schema::{Schema, SchemaVersion, FINGERPRINT_LEN};

#[derive(Debug)]
pub(crate) enum Frame {
    Define {
        version: SchemaVersion,
        descriptor: Vec<u8>,
        fingerprint: [u8; FINGERPRINT_LEN],
    },
    Record {
        version: SchemaVersion,
        payload: Vec<u8>,
        /// Stored checksum, when the stream carries them.
        checksum: Option<u32>,
    },
}

pub(crate) fn write_define(w: &mut Writer, schema: &Schema) {
    let descriptor = schema.descriptor();
    w.u8(OP_DEFINE_SCHEMA);
    write_varint(w, schema.version().0);
    write_varint(w, descriptor.len() as u64);
    w.buf(descriptor);
    w.buf(schema.fingerprint().as_bytes());
}

pub(crate) fn write_record(w: &mut Writer, version: SchemaVersion, payload: &[u8], checksums: bool) {
    w.u8(OP_RECORD);
    write_varint(w, version.0);
    write_varint(w, payload.len() as u64);
    w.buf(payload);
    if checksums {
        w.u32(compute_checksum(payload));
    }
}

/// Reads frames from a byte source, tracking the stream offset for error
/// reports.
pub(crate) struct FrameReader<R> {
    source: R,
    offset: usize,
    max_frame_len: usize,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(source: R, max_frame_len: usize) -> Self {
        Self {
            source,
            offset: 0,
            max_frame_len,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn get_ref(&self) -> &R {
        &self.source
    }

    pub(crate) fn into_inner(self) -> R {
        self.source
    }

    /// `Ok(None)` at a clean end of input.
    fn try_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    pub(crate) fn byte(&mut self) -> Result<u8> {
        self.try_byte()?.ok_or(Error::TruncatedInput {
            offset: self.offset,
            needed: 1,
        })
    }

    pub(crate) fn exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::TruncatedInput {
                        offset: self.offset,
                        needed: buf.len() - filled,
                    })
                }
                Ok(n) => {
                    filled += n;
                    self.offset += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    fn varint(&mut self) -> Result<u64> {
        let start = self.offset;
        let mut raw = [0u8; MAX_VARINT_LEN];
        for i in 0..MAX_VARINT_LEN {
            raw[i] = self.byte()?;
            if raw[i] < 0x80 {
                let mut reader = Reader::new(&raw[..=i]);
                return read_varint(&mut reader).map_err(|_| Error::MalformedVarint { offset: start });
            }
        }
        Err(Error::MalformedVarint { offset: start })
    }

    /// Reads a length-prefixed body. An oversized body is skipped together
    /// with the `trailer` bytes that follow it, so the next read starts at
    /// the next frame.
    fn sized(&mut self, trailer: usize) -> Result<Vec<u8>> {
        let start = self.offset;
        let len = usize::try_from(self.varint()?)
            .map_err(|_| Error::MalformedVarint { offset: start })?;
        if len > self.max_frame_len {
            self.skip(len as u64 + trailer as u64)?;
            tracing::warn!(len, limit = self.max_frame_len, offset = start, "skipped oversized frame");
            return Err(Error::LimitExceeded {
                what: "frame length",
                limit: self.max_frame_len,
            });
        }
        let mut buf = vec![0u8; len];
        self.exact(&mut buf)?;
        Ok(buf)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let skipped = io::copy(&mut self.source.by_ref().take(n), &mut io::sink())?;
        self.offset += skipped as usize;
        if skipped < n {
            return Err(Error::TruncatedInput {
                offset: self.offset,
                needed: (n - skipped) as usize,
            });
        }
        Ok(())
    }

    /// Reads the next frame whole. `Ok(None)` when the input ends exactly at
    /// a frame boundary.
    pub(crate) fn next(&mut self, checksums: bool) -> Result<Option<Frame>> {
        let offset = self.offset;
        let Some(op) = self.try_byte()? else {
            return Ok(None);
        };
        let frame = match op {
            OP_DEFINE_SCHEMA => {
                let version = SchemaVersion(self.varint()?);
                let descriptor = self.sized(FINGERPRINT_LEN)?;
                let mut fingerprint = [0u8; FINGERPRINT_LEN];
                self.exact(&mut fingerprint)?;
                Frame::Define {
                    version,
                    descriptor,
                    fingerprint,
                }
            }
            OP_RECORD => {
                let version = SchemaVersion(self.varint()?);
                let payload = self.sized(if checksums { 4 } else { 0 })?;
                let checksum = if checksums {
                    let mut raw = [0u8; 4];
                    self.exact(&mut raw)?;
                    Some(u32::from_le_bytes(raw))
                } else {
                    None
                };
                Frame::Record {
                    version,
                    payload,
                    checksum,
                }
            }
            other => {
                return Err(Error::UnknownTag {
                    tag: other as u64,
                    offset,
                })
            }
        };
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;

    #[test]
    fn record_frame_layout() {
        let mut w = Writer::new();
        write_record(&mut w, SchemaVersion(2), &[0xaa, 0xbb], false);
        assert_eq!(w.flush(), [0xf1, 0x02, 0x02, 0xaa, 0xbb]);
        write_record(&mut w, SchemaVersion(2), b"123456789", true);
        let bytes = w.flush();
        assert_eq!(bytes[bytes.len() - 4..], 0xcbf4_3926u32.to_le_bytes());
    }

    #[test]
    fn frames_read_back() {
        let schema = Schema::with_version(SchemaNode::Str, 5).unwrap();
        let mut w = Writer::new();
        write_define(&mut w, &schema);
        write_record(&mut w, SchemaVersion(5), &[0x00], true);
        let bytes = w.flush();
        let mut frames = FrameReader::new(bytes.as_slice(), 1024);
        match frames.next(true).unwrap() {
            Some(Frame::Define {
                version,
                descriptor,
                fingerprint,
            }) => {
                assert_eq!(version, SchemaVersion(5));
                assert_eq!(descriptor, schema.descriptor());
                assert_eq!(&fingerprint, schema.fingerprint().as_bytes());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            frames.next(true).unwrap(),
            Some(Frame::Record { checksum: Some(_), .. })
        ));
        assert!(frames.next(true).unwrap().is_none());
        assert_eq!(frames.offset(), bytes.len());
    }

    #[test]
    fn truncated_and_unknown_frames() {
        let mut frames = FrameReader::new([0xf1u8, 0x01, 0x05, 0x00].as_slice(), 1024);
        assert!(matches!(frames.next(false), Err(Error::TruncatedInput { needed: 4, .. })));
        let mut frames = FrameReader::new([0x42u8].as_slice(), 1024);
        assert!(matches!(
            frames.next(false),
            Err(Error::UnknownTag { tag: 0x42, offset: 0 })
        ));
        let mut frames = FrameReader::new([0xf1u8, 0x01, 0x7f].as_slice(), 16);
        assert!(matches!(frames.next(false), Err(Error::TruncatedInput { needed: 0x7f, .. })));
    }

    #[test]
    fn oversized_frames_are_skipped_whole() {
        let mut w = Writer::new();
        write_record(&mut w, SchemaVersion(1), &[7; 20], true);
        write_record(&mut w, SchemaVersion(1), &[8; 2], true);
        let bytes = w.flush();
        let mut frames = FrameReader::new(bytes.as_slice(), 16);
        assert!(matches!(
            frames.next(true),
            Err(Error::LimitExceeded { limit: 16, .. })
        ));
        assert_eq!(frames.offset(), 1 + 1 + 1 + 20 + 4);
        match frames.next(true).unwrap() {
            Some(Frame::Record { payload, .. }) => assert_eq!(payload, [8, 8]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(frames.next(true).unwrap().is_none());
    }
}
