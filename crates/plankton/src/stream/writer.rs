use std::collections::HashMap;
use std::io::Write;

use plankton_buffers::Writer;

use super::frame::{write_define, write_record};
use super::{FLAG_CHECKSUMS, FORMAT_VERSION, MAGIC};
use crate::codec::Encoder;
use crate::error::{Error, Result};
use crate::options::StreamOptions;
use crate::schema::{Fingerprint, Schema, SchemaVersion};
use crate::value::Value;

/// Writes a framed stream of records to a byte sink.
///
/// Every schema a record is written with is defined in the stream before
/// its first record, so a reader never needs out-of-band schemas.
pub struct StreamWriter<W: Write> {
    sink: W,
    options: StreamOptions,
    encoder: Encoder,
    defined: HashMap<SchemaVersion, Fingerprint>,
    buf: Writer,
    records: u64,
}

impl<W: Write> StreamWriter<W> {
    /// Writes the stream header and the definition of `initial`.
    pub fn new(sink: W, initial: &Schema, options: StreamOptions) -> Result<Self> {
        let mut writer = Self {
            sink,
            options,
            encoder: Encoder::with_options(options.codec),
            defined: HashMap::new(),
            buf: Writer::new(),
            records: 0,
        };
        writer.buf.buf(&MAGIC);
        writer.buf.u8(FORMAT_VERSION);
        writer
            .buf
            .u8(if options.checksums { FLAG_CHECKSUMS } else { 0 });
        writer.define_schema(initial)?;
        Ok(writer)
    }

    /// Defines `schema` in the stream. Defining the same schema twice is a
    /// no-op; reusing a version for a different schema is an error.
    pub fn define_schema(&mut self, schema: &Schema) -> Result<()> {
        match self.defined.get(&schema.version()) {
            Some(fp) if *fp == schema.fingerprint() => return Ok(()),
            Some(fp) => {
                return Err(Error::InvalidSchema(format!(
                    "version {} is already defined with fingerprint {fp}",
                    schema.version()
                )))
            }
            None => {}
        }
        write_define(&mut self.buf, schema);
        self.flush_buf()?;
        self.defined.insert(schema.version(), schema.fingerprint());
        tracing::debug!(version = %schema.version(), fingerprint = %schema.fingerprint(), "defined schema");
        Ok(())
    }

    /// Encodes `value` with `schema` and appends it as one record. Nothing
    /// is written when encoding fails.
    pub fn write_record(&mut self, value: &Value, schema: &Schema) -> Result<()> {
        let payload = self.encoder.encode(value, schema)?;
        self.define_schema(schema)?;
        write_record(&mut self.buf, schema.version(), &payload, self.options.checksums);
        self.flush_buf()?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Flushes the sink and hands it back.
    pub fn finish(mut self) -> Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn flush_buf(&mut self) -> Result<()> {
        let bytes = self.buf.flush();
        self.sink.write_all(&bytes)?;
        Ok(())
    }
}
