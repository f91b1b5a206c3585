//! Canonical binary form of a schema tree.
//!
//! ```text
//! 0x00 null     0x01 bool     0x02 int + spec byte     0x03 float + 4|8
//! 0x04 bytes    0x05 string   0x06 id                  0x07 any
//! 0x08 sequence + item node
//! 0x09 enum + varint count + symbols
//! 0x0a record + tagging byte + varint count + fields
//! ```
//!
//! The int spec byte holds the width code in bits 0-1 (8/16/32/64), the
//! signed flag in bit 2 and the varint flag in bit 3. A field is its name,
//! a flags byte (bit 0 optional, bit 1 has default), a varint alias count
//! and the aliases, its node, and finally the default in the tagged
//! encoding. Strings are a varint length followed by UTF-8.

use plankton_buffers::{Reader, Writer};
use sha2::{Digest, Sha224};

use crate::codec::varint::{read_len, write_varint};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::types::{
    Field, FieldTagging, FloatWidth, IntEncoding, IntType, IntWidth, RecordSchema, SchemaNode,
};
use crate::tagged::{TaggedDecoder, TaggedEncoder};

const NULL: u8 = 0x00;
const BOOL: u8 = 0x01;
const INT: u8 = 0x02;
const FLOAT: u8 = 0x03;
const BYTES: u8 = 0x04;
const STRING: u8 = 0x05;
const ID: u8 = 0x06;
const ANY: u8 = 0x07;
const SEQUENCE: u8 = 0x08;
const ENUM: u8 = 0x09;
const RECORD: u8 = 0x0a;

const INT_SIGNED: u8 = 0b0100;
const INT_VARINT: u8 = 0b1000;

const FIELD_OPTIONAL: u8 = 0b01;
const FIELD_DEFAULT: u8 = 0b10;

/// Length of a [`fingerprint`] digest.
pub const FINGERPRINT_LEN: usize = 28;

/// SHA-224 digest of a descriptor.
pub fn fingerprint(descriptor: &[u8]) -> [u8; FINGERPRINT_LEN] {
    Sha224::digest(descriptor).into()
}

pub fn write_descriptor(node: &SchemaNode) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    write_node(&mut writer, node, &TaggedEncoder::new())?;
    Ok(writer.flush())
}

fn write_node(w: &mut Writer, node: &SchemaNode, tagged: &TaggedEncoder) -> Result<()> {
    match node {
        SchemaNode::Null => w.u8(NULL),
        SchemaNode::Bool => w.u8(BOOL),
        SchemaNode::Int(t) => {
            w.u8(INT);
            let mut spec = t.width.code();
            if t.signed {
                spec |= INT_SIGNED;
            }
            if t.encoding == IntEncoding::Varint {
                spec |= INT_VARINT;
            }
            w.u8(spec);
        }
        SchemaNode::Float(width) => {
            w.u8(FLOAT);
            w.u8(match width {
                FloatWidth::F32 => 4,
                FloatWidth::F64 => 8,
            });
        }
        SchemaNode::Bytes => w.u8(BYTES),
        SchemaNode::Str => w.u8(STRING),
        SchemaNode::Id => w.u8(ID),
        SchemaNode::Any => w.u8(ANY),
        SchemaNode::Seq(item) => {
            w.u8(SEQUENCE);
            write_node(w, item, tagged)?;
        }
        SchemaNode::Enum(symbols) => {
            w.u8(ENUM);
            write_varint(w, symbols.len() as u64);
            for symbol in symbols {
                write_str(w, symbol);
            }
        }
        SchemaNode::Record(record) => {
            w.u8(RECORD);
            w.u8(match record.tagging {
                FieldTagging::Positional => 0,
                FieldTagging::Named => 1,
            });
            write_varint(w, record.fields.len() as u64);
            for field in &record.fields {
                write_str(w, &field.name);
                let mut flags = 0;
                if field.optional {
                    flags |= FIELD_OPTIONAL;
                }
                if field.default.is_some() {
                    flags |= FIELD_DEFAULT;
                }
                w.u8(flags);
                write_varint(w, field.aliases.len() as u64);
                for alias in &field.aliases {
                    write_str(w, alias);
                }
                write_node(w, &field.node, tagged)?;
                if let Some(default) = &field.default {
                    tagged.write_value(w, default, 0)?;
                }
            }
        }
    }
    Ok(())
}

fn write_str(w: &mut Writer, s: &str) {
    write_varint(w, s.len() as u64);
    w.utf8(s);
}

/// Parses a descriptor. The result still has to be validated.
pub fn read_descriptor(data: &[u8]) -> Result<SchemaNode> {
    let options = CodecOptions::default();
    let mut reader = Reader::new(data);
    let node = read_node(&mut reader, &TaggedDecoder::with_options(options), &options, 0)?;
    if !reader.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "{} trailing byte(s) after descriptor",
            reader.size()
        )));
    }
    Ok(node)
}

fn read_node(
    r: &mut Reader<'_>,
    tagged: &TaggedDecoder,
    options: &CodecOptions,
    depth: usize,
) -> Result<SchemaNode> {
    if depth > options.max_depth {
        return Err(Error::LimitExceeded {
            what: "schema depth",
            limit: options.max_depth,
        });
    }
    let offset = r.position();
    let kind = r.try_u8()?;
    let node = match kind {
        NULL => SchemaNode::Null,
        BOOL => SchemaNode::Bool,
        INT => {
            let spec_offset = r.position();
            let spec = r.try_u8()?;
            if spec & !(0b11 | INT_SIGNED | INT_VARINT) != 0 {
                return Err(Error::UnknownTag {
                    tag: spec as u64,
                    offset: spec_offset,
                });
            }
            let width = IntWidth::from_code(spec & 0b11).ok_or(Error::UnknownTag {
                tag: spec as u64,
                offset: spec_offset,
            })?;
            SchemaNode::Int(IntType {
                width,
                signed: spec & INT_SIGNED != 0,
                encoding: if spec & INT_VARINT != 0 {
                    IntEncoding::Varint
                } else {
                    IntEncoding::Fixed
                },
            })
        }
        FLOAT => {
            let width_offset = r.position();
            match r.try_u8()? {
                4 => SchemaNode::Float(FloatWidth::F32),
                8 => SchemaNode::Float(FloatWidth::F64),
                other => {
                    return Err(Error::UnknownTag {
                        tag: other as u64,
                        offset: width_offset,
                    })
                }
            }
        }
        BYTES => SchemaNode::Bytes,
        STRING => SchemaNode::Str,
        ID => SchemaNode::Id,
        ANY => SchemaNode::Any,
        SEQUENCE => SchemaNode::seq(read_node(r, tagged, options, depth + 1)?),
        ENUM => {
            let count = read_count(r, options)?;
            let mut symbols = Vec::with_capacity(count);
            for _ in 0..count {
                symbols.push(read_str(r, options)?);
            }
            SchemaNode::Enum(symbols)
        }
        RECORD => {
            let tagging_offset = r.position();
            let tagging = match r.try_u8()? {
                0 => FieldTagging::Positional,
                1 => FieldTagging::Named,
                other => {
                    return Err(Error::UnknownTag {
                        tag: other as u64,
                        offset: tagging_offset,
                    })
                }
            };
            let count = read_count(r, options)?;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let name = read_str(r, options)?;
                let flags_offset = r.position();
                let flags = r.try_u8()?;
                if flags & !(FIELD_OPTIONAL | FIELD_DEFAULT) != 0 {
                    return Err(Error::UnknownTag {
                        tag: flags as u64,
                        offset: flags_offset,
                    });
                }
                let alias_count = read_count(r, options)?;
                let mut aliases = Vec::with_capacity(alias_count);
                for _ in 0..alias_count {
                    aliases.push(read_str(r, options)?);
                }
                let node = read_node(r, tagged, options, depth + 1)?;
                let default = if flags & FIELD_DEFAULT != 0 {
                    Some(tagged.read_value(r, 0)?)
                } else {
                    None
                };
                fields.push(Field {
                    name,
                    node,
                    optional: flags & FIELD_OPTIONAL != 0,
                    default,
                    aliases,
                });
            }
            SchemaNode::Record(RecordSchema { fields, tagging })
        }
        other => {
            return Err(Error::UnknownTag {
                tag: other as u64,
                offset,
            })
        }
    };
    Ok(node)
}

fn read_count(r: &mut Reader<'_>, options: &CodecOptions) -> Result<usize> {
    let count = read_len(r)?;
    if count > options.max_collection_len {
        return Err(Error::LimitExceeded {
            what: "collection length",
            limit: options.max_collection_len,
        });
    }
    if count > r.size() {
        return Err(Error::TruncatedInput {
            offset: r.position(),
            needed: count - r.size(),
        });
    }
    Ok(count)
}

fn read_str(r: &mut Reader<'_>, options: &CodecOptions) -> Result<String> {
    let len = read_count(r, options)?;
    let offset = r.position();
    let bytes = r.try_buf(len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| Error::InvalidUtf8 { offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn primitive_bytes() {
        assert_eq!(write_descriptor(&SchemaNode::Null).unwrap(), [0x00]);
        assert_eq!(write_descriptor(&SchemaNode::uint32()).unwrap(), [0x02, 0x02]);
        assert_eq!(write_descriptor(&SchemaNode::int16()).unwrap(), [0x02, 0x05]);
        assert_eq!(
            write_descriptor(&SchemaNode::varint(IntWidth::W64, true)).unwrap(),
            [0x02, 0x0f]
        );
        assert_eq!(write_descriptor(&SchemaNode::float32()).unwrap(), [0x03, 0x04]);
        assert_eq!(
            write_descriptor(&SchemaNode::seq(SchemaNode::Str)).unwrap(),
            [0x08, 0x05]
        );
        assert_eq!(
            write_descriptor(&SchemaNode::enumeration(["a", "bc"])).unwrap(),
            [0x09, 0x02, 0x01, b'a', 0x02, b'b', b'c']
        );
    }

    #[test]
    fn record_bytes() {
        let node = SchemaNode::record(vec![
            Field::new("id", SchemaNode::uint8()),
            Field::new("n", SchemaNode::Str)
                .optional()
                .with_default("x")
                .alias("m"),
        ]);
        assert_eq!(
            write_descriptor(&node).unwrap(),
            [
                0x0a, 0x00, 0x02, // record, positional, two fields
                0x02, b'i', b'd', 0x00, 0x00, 0x02, 0x00, // id: uint8
                0x01, b'n', 0x03, 0x01, 0x01, b'm', 0x05, 0x51, b'x', // n
            ]
        );
    }

    #[test]
    fn nested_tree_reads_back() {
        let node = SchemaNode::named_record(vec![
            Field::new("when", SchemaNode::varint(IntWidth::W64, true)),
            Field::new("tags", SchemaNode::seq(SchemaNode::enumeration(["x", "y"])))
                .with_default(Value::Seq(vec![])),
            Field::new(
                "inner",
                SchemaNode::record(vec![
                    Field::new("f", SchemaNode::float64()).with_default(Value::Float(0.5)),
                    Field::new("raw", SchemaNode::Any).optional(),
                ]),
            ),
            Field::new("key", SchemaNode::Id),
        ]);
        let bytes = write_descriptor(&node).unwrap();
        assert_eq!(read_descriptor(&bytes).unwrap(), node);
    }

    #[test]
    fn bad_descriptors() {
        assert!(matches!(
            read_descriptor(&[0x0b]),
            Err(Error::UnknownTag { tag: 0x0b, offset: 0 })
        ));
        assert!(matches!(
            read_descriptor(&[0x03, 0x02]),
            Err(Error::UnknownTag { tag: 2, .. })
        ));
        assert!(matches!(
            read_descriptor(&[0x08]),
            Err(Error::TruncatedInput { .. })
        ));
        assert!(matches!(
            read_descriptor(&[0x00, 0x00]),
            Err(Error::InvalidSchema(_))
        ));
        assert!(matches!(
            read_descriptor(&[0x09, 0x05, 0x01]),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn fingerprint_is_sha224() {
        let digest = fingerprint(b"");
        assert_eq!(digest[..4], [0xd1, 0x4a, 0x02, 0x8c]);
    }
}
