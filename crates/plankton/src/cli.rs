//! Core logic of the `plankton-pack`, `plankton-unpack` and `plankton-cat`
//! binaries.
//!
//! - `plankton-pack`: JSON -> tagged bytes, schema payload, or stream
//! - `plankton-unpack`: tagged bytes or schema payload -> JSON
//! - `plankton-cat`: stream -> JSON lines

use std::io::{BufRead, Read, Write};
use std::path::Path;

use crate::codec::{Decoder, Encoder};
use crate::error::Error;
use crate::options::StreamOptions;
use crate::resolver::Resolver;
use crate::schema::{conform, Schema};
use crate::stream::{StreamReader, StreamWriter};
use crate::tagged::{TaggedDecoder, TaggedEncoder};
use crate::value::Value;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CliError {
    Json(serde_json::Error),
    Io(std::io::Error),
    Plankton(Error),
    Usage(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Json(e) => write!(f, "invalid JSON: {e}"),
            CliError::Io(e) => write!(f, "{e}"),
            CliError::Plankton(e) => write!(f, "{e}"),
            CliError::Usage(e) => write!(f, "usage: {e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Plankton(e)
    }
}

// ── Setup ─────────────────────────────────────────────────────────────────

/// Installs a stderr subscriber filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

pub fn load_schema(path: &Path) -> Result<Schema, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(Schema::from_json(&text)?)
}

/// Reads stream options from a JSON file; fields left out keep their
/// defaults.
pub fn load_options(path: &Path) -> Result<StreamOptions, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Flags shared by the binaries: `--schema FILE`, `--options FILE` and
/// switches such as `--stream`.
#[derive(Debug, Default)]
pub struct Args {
    pub schema: Option<String>,
    pub options: Option<String>,
    pub stream: bool,
}

impl Args {
    /// Parses `args` (without the program name). `value_flags` name the
    /// flags that take a file argument, `switches` the boolean ones.
    pub fn parse(args: &[String], value_flags: &[&str], switches: &[&str]) -> Result<Args, CliError> {
        let mut out = Args::default();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if value_flags.contains(&flag) {
                i += 1;
                let value = args
                    .get(i)
                    .cloned()
                    .ok_or_else(|| CliError::Usage(format!("{flag} needs a file argument")))?;
                match flag {
                    "--options" => out.options = Some(value),
                    _ => out.schema = Some(value),
                }
            } else if switches.contains(&flag) {
                out.stream = true;
            } else {
                return Err(CliError::Usage(format!("unknown argument {flag}")));
            }
            i += 1;
        }
        Ok(out)
    }

    pub fn load(&self) -> Result<(Option<Schema>, StreamOptions), CliError> {
        let schema = self.schema.as_deref().map(|p| load_schema(Path::new(p))).transpose()?;
        let options = match &self.options {
            Some(p) => load_options(Path::new(p))?,
            None => StreamOptions::default(),
        };
        Ok((schema, options))
    }
}

// ── plankton-pack ─────────────────────────────────────────────────────────

/// Encodes one JSON document. With a schema the result is a schema-guided
/// payload; without one it is the tagged encoding.
pub fn pack(json: &str, schema: Option<&Schema>, options: &StreamOptions) -> Result<Vec<u8>, CliError> {
    let value = Value::from(serde_json::from_str::<serde_json::Value>(json)?);
    let bytes = match schema {
        Some(schema) => {
            let value = conform(schema.root(), &value, "$")?;
            Encoder::with_options(options.codec).encode(&value, schema)?
        }
        None => TaggedEncoder::with_options(options.codec).encode(&value)?,
    };
    Ok(bytes)
}

/// Writes every non-blank JSON line of `input` as one stream record.
/// Returns the number of records written.
pub fn pack_stream<R: BufRead, W: Write>(
    input: R,
    sink: W,
    schema: &Schema,
    options: StreamOptions,
) -> Result<u64, CliError> {
    let mut writer = StreamWriter::new(sink, schema, options)?;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = Value::from(serde_json::from_str::<serde_json::Value>(&line)?);
        let value = conform(schema.root(), &value, "$")?;
        writer.write_record(&value, schema)?;
    }
    let written = writer.records();
    writer.finish()?;
    Ok(written)
}

// ── plankton-unpack ───────────────────────────────────────────────────────

/// Decodes bytes written by [`pack`] back into a JSON string.
pub fn unpack(bytes: &[u8], schema: Option<&Schema>, options: &StreamOptions) -> Result<String, CliError> {
    let value = match schema {
        Some(schema) => Decoder::with_options(options.codec).decode(bytes, schema)?,
        None => TaggedDecoder::with_options(options.codec).decode(bytes)?,
    };
    Ok(serde_json::to_string(&serde_json::Value::from(value))?)
}

// ── plankton-cat ──────────────────────────────────────────────────────────

/// Prints every record of a stream as a JSON line
/// `{"version": N, "value": ...}`. Records with an unknown schema version
/// or a bad checksum are reported and skipped. Returns the number of
/// records printed.
pub fn cat<R: Read, W: Write>(
    source: R,
    out: &mut W,
    reader_schema: Option<Schema>,
    options: StreamOptions,
) -> Result<u64, CliError> {
    let mut reader = StreamReader::open(source, options)?;
    if let Some(schema) = reader_schema {
        reader = reader.with_reader_schema(schema, Resolver::new().with_options(options.codec));
    }
    let mut printed = 0;
    loop {
        match reader.read_record() {
            Ok(Some(record)) => {
                let line = serde_json::json!({
                    "version": record.version.0,
                    "value": serde_json::Value::from(record.value),
                });
                writeln!(out, "{line}")?;
                printed += 1;
            }
            Ok(None) => return Ok(printed),
            Err(e @ (Error::UnknownSchemaVersion(_) | Error::ChecksumMismatch { .. })) => {
                tracing::warn!(error = %e, offset = reader.offset(), "skipping record");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
