//! Plankton: a compact binary serialization format with schema evolution.
//!
//! - [`value`]: the [`Value`] model every codec reads and writes.
//! - [`schema`]: schema trees, their JSON description, binary descriptor
//!   and fingerprint.
//! - [`codec`]: the schema-guided encoder and decoder.
//! - [`resolver`]: reading data written with an older or newer schema.
//! - [`stream`]: framed record streams that carry their own schemas.
//! - [`tagged`]: the self-describing encoding used for `any` values.
//! - [`text`]: a small text notation for values.
//!
//! ```
//! use plankton::{decode, encode, Field, Schema, SchemaNode, Value};
//!
//! let schema = Schema::new(SchemaNode::record(vec![
//!     Field::new("id", SchemaNode::uint32()),
//!     Field::new("name", SchemaNode::string()).with_default("anon"),
//! ]))
//! .unwrap();
//! let bytes = encode(&Value::map([("id", Value::from(7u32))]), &schema).unwrap();
//! let value = decode(&bytes, &schema).unwrap();
//! assert_eq!(value.get("name").unwrap(), Some(&Value::from("anon")));
//! ```

mod error;
mod options;

pub mod cli;
pub mod codec;
pub mod json;
pub mod resolver;
pub mod schema;
pub mod stream;
pub mod tagged;
pub mod text;
pub mod value;

pub use error::{Error, Result};
pub use options::{CodecOptions, StreamOptions};

pub use codec::{decode, encode, Decoder, Encoder};
pub use resolver::{
    CompatibilityPlan, FieldOutcome, FieldReport, Incompatibility, PlanCache, Resolver,
};
pub use schema::{
    Field, FieldTagging, Fingerprint, FloatWidth, IntEncoding, IntType, IntWidth, RecordSchema,
    Schema, SchemaNode, SchemaVersion,
};
pub use stream::{StreamReader, StreamRecord, StreamWriter};
pub use tagged::{decode_tagged, encode_tagged, StringEncoding, TaggedDecoder, TaggedEncoder};
pub use text::{decode_text, encode_text, TextDecoder};
pub use value::{Seed, Value, ValueKind};
