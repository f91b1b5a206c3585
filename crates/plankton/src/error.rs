use std::io;

use plankton_buffers::BufferError;
use thiserror::Error;

use crate::schema::SchemaVersion;
use crate::value::ValueKind;

/// Every failure the codec, resolver and stream layers can report.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("value does not match schema at {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },
    #[error("truncated input: needed {needed} byte(s) at offset {offset}")]
    TruncatedInput { offset: usize, needed: usize },
    #[error("malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },
    #[error("unknown tag {tag:#x} at offset {offset}")]
    UnknownTag { tag: u64, offset: usize },
    #[error("incompatible field type at {path}: writer has {writer}, reader expects {reader}")]
    IncompatibleFieldType {
        path: String,
        writer: String,
        reader: String,
    },
    #[error("reader requires field {path} which the writer may not provide")]
    MissingRequiredField { path: String },
    #[error("unknown schema version {0}")]
    UnknownSchemaVersion(SchemaVersion),
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("{remaining} trailing byte(s) after value")]
    TrailingBytes { remaining: usize },
    #[error("back-reference at offset {offset} names no finished value")]
    BadReference { offset: usize },
    #[error("syntax error at offset {offset}: {reason}")]
    Syntax { offset: usize, reason: String },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("{what} exceeds limit of {limit}")]
    LimitExceeded { what: &'static str, limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::EndOfBuffer {
                offset,
                needed,
                available,
            } => Error::TruncatedInput {
                offset,
                needed: needed - available,
            },
        }
    }
}

impl Error {
    pub(crate) fn mismatch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
