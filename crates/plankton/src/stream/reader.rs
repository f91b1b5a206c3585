use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use super::checksum::compute_checksum;
use super::frame::{Frame, FrameReader};
use super::{StreamRecord, FLAG_CHECKSUMS, FORMAT_VERSION, MAGIC};
use crate::codec::Decoder;
use crate::error::{Error, Result};
use crate::options::StreamOptions;
use crate::resolver::{PlanCache, Resolver};
use crate::schema::{Fingerprint, Schema, SchemaVersion, FINGERPRINT_LEN};

/// Reads records from a framed stream.
///
/// Schemas defined in the stream are kept for its whole lifetime. With a
/// reader schema set, every record is resolved into that schema's shape.
pub struct StreamReader<R: Read> {
    frames: FrameReader<R>,
    checksums: bool,
    decoder: Decoder,
    schemas: HashMap<SchemaVersion, Schema>,
    target: Option<(Schema, Arc<PlanCache>)>,
}

impl<R: Read> StreamReader<R> {
    /// Reads the header and the initial schema definition.
    pub fn open(source: R, options: StreamOptions) -> Result<Self> {
        let mut frames = FrameReader::new(source, options.max_frame_len);
        let mut magic = [0u8; 4];
        frames.exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::UnknownTag {
                tag: u32::from_be_bytes(magic) as u64,
                offset: 0,
            });
        }
        let version = frames.byte()?;
        if version != FORMAT_VERSION {
            return Err(Error::UnknownTag {
                tag: version as u64,
                offset: 4,
            });
        }
        let flags = frames.byte()?;
        if flags & !FLAG_CHECKSUMS != 0 {
            return Err(Error::UnknownTag {
                tag: flags as u64,
                offset: 5,
            });
        }
        let mut reader = Self {
            frames,
            checksums: flags & FLAG_CHECKSUMS != 0,
            decoder: Decoder::with_options(options.codec),
            schemas: HashMap::new(),
            target: None,
        };
        let offset = reader.frames.offset();
        match reader.frames.next(reader.checksums)? {
            Some(Frame::Define {
                version,
                descriptor,
                fingerprint,
            }) => reader.register(version, &descriptor, fingerprint)?,
            Some(Frame::Record { .. }) => {
                return Err(Error::InvalidSchema(format!(
                    "stream starts with a record at offset {offset}, expected a schema definition"
                )))
            }
            None => {
                return Err(Error::TruncatedInput {
                    offset,
                    needed: 1,
                })
            }
        }
        Ok(reader)
    }

    /// Resolves every record into `schema`'s shape, with plans cached for
    /// this stream only.
    pub fn with_reader_schema(self, schema: Schema, resolver: Resolver) -> Self {
        self.with_plan_cache(schema, Arc::new(PlanCache::new(resolver)))
    }

    /// Like [`with_reader_schema`](Self::with_reader_schema), sharing plans
    /// with other streams through `cache`.
    pub fn with_plan_cache(mut self, schema: Schema, cache: Arc<PlanCache>) -> Self {
        self.target = Some((schema, cache));
        self
    }

    /// Whether records in this stream carry checksums.
    pub fn checksums(&self) -> bool {
        self.checksums
    }

    pub fn schema(&self, version: SchemaVersion) -> Option<&Schema> {
        self.schemas.get(&version)
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> usize {
        self.frames.offset()
    }

    pub fn get_ref(&self) -> &R {
        self.frames.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.frames.into_inner()
    }

    /// Reads the next record. Schema definitions met on the way are
    /// registered. `Ok(None)` at a clean end of stream.
    ///
    /// An [`Error::UnknownSchemaVersion`], [`Error::ChecksumMismatch`] or an
    /// oversized frame's [`Error::LimitExceeded`] leaves the stream
    /// positioned after the bad frame, so the caller may keep reading.
    pub fn read_record(&mut self) -> Result<Option<StreamRecord>> {
        loop {
            match self.frames.next(self.checksums)? {
                None => return Ok(None),
                Some(Frame::Define {
                    version,
                    descriptor,
                    fingerprint,
                }) => self.register(version, &descriptor, fingerprint)?,
                Some(Frame::Record {
                    version,
                    payload,
                    checksum,
                }) => return self.decode_record(version, &payload, checksum).map(Some),
            }
        }
    }

    fn register(
        &mut self,
        version: SchemaVersion,
        descriptor: &[u8],
        fingerprint: [u8; FINGERPRINT_LEN],
    ) -> Result<()> {
        let stored = Fingerprint(fingerprint);
        let computed = Fingerprint::of(descriptor);
        if stored != computed {
            return Err(Error::InvalidSchema(format!(
                "fingerprint of schema {version} does not match its descriptor"
            )));
        }
        if let Some(existing) = self.schemas.get(&version) {
            if existing.fingerprint() == stored {
                return Ok(());
            }
            return Err(Error::InvalidSchema(format!(
                "schema {version} redefined with fingerprint {stored}, was {}",
                existing.fingerprint()
            )));
        }
        let schema = Schema::from_descriptor(descriptor, Some(version))?;
        tracing::debug!(%version, fingerprint = %stored, "registered stream schema");
        self.schemas.insert(version, schema);
        Ok(())
    }

    fn decode_record(
        &self,
        version: SchemaVersion,
        payload: &[u8],
        checksum: Option<u32>,
    ) -> Result<StreamRecord> {
        let Some(writer) = self.schemas.get(&version) else {
            tracing::warn!(%version, offset = self.frames.offset(), "record references unknown schema version");
            return Err(Error::UnknownSchemaVersion(version));
        };
        if let Some(stored) = checksum {
            let computed = compute_checksum(payload);
            if stored != computed {
                tracing::warn!(%version, stored, computed, "record checksum mismatch");
                return Err(Error::ChecksumMismatch { stored, computed });
            }
        }
        let value = match &self.target {
            Some((reader, cache)) => cache.get(writer, reader)?.decode(payload)?,
            None => self.decoder.decode(payload, writer)?,
        };
        Ok(StreamRecord { version, value })
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<StreamRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
