//! Schema-guided binary codec.
//!
//! The payload of a value carries no type information; the schema supplies
//! it. Encoding walks the schema depth-first:
//!
//! | node     | payload                                                  |
//! |----------|----------------------------------------------------------|
//! | null     | nothing                                                  |
//! | bool     | one byte, 0 or 1                                         |
//! | int      | little-endian of the declared width, or a varint         |
//! | float    | IEEE-754 little-endian, 4 or 8 bytes                     |
//! | bytes    | varint length + bytes                                    |
//! | string   | varint length + UTF-8                                    |
//! | id       | 16 bytes little-endian                                   |
//! | any      | tagged encoding                                          |
//! | sequence | varint count + items                                     |
//! | enum     | varint symbol index                                      |
//! | record   | varint count of present fields + (tag, value) pairs      |
//!
//! A record field's tag is its position in the writer schema, or its name
//! for records with [`FieldTagging::Named`](crate::schema::FieldTagging).

mod decoder;
mod encoder;
pub mod varint;

pub use decoder::Decoder;
pub use encoder::Encoder;

pub(crate) use decoder::{capacity_for, min_size, read_count, read_field_tag, read_utf8};

use std::fmt;

use crate::error::Result;
use crate::schema::Schema;
use crate::value::Value;

/// Encodes `value` against `schema` with default limits.
pub fn encode(value: &Value, schema: &Schema) -> Result<Vec<u8>> {
    Encoder::new().encode(value, schema)
}

/// Decodes a payload written against `schema` with default limits.
pub fn decode(data: &[u8], schema: &Schema) -> Result<Value> {
    Decoder::new().decode(data, schema)
}

/// Location inside a value, rendered only when an error is reported.
#[derive(Clone, Copy)]
pub(crate) enum Path<'a> {
    Root,
    Field(&'a Path<'a>, &'a str),
    Index(&'a Path<'a>, usize),
}

impl<'a> Path<'a> {
    pub(crate) fn field(&'a self, name: &'a str) -> Path<'a> {
        Path::Field(self, name)
    }

    pub(crate) fn index(&'a self, i: usize) -> Path<'a> {
        Path::Index(self, i)
    }
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Root => f.write_str("$"),
            Path::Field(parent, name) => write!(f, "{parent}.{name}"),
            Path::Index(parent, i) => write!(f, "{parent}[{i}]"),
        }
    }
}
