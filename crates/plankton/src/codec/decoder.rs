use plankton_buffers::Reader;

use super::varint::{read_len, read_varint, read_varint_bits, unzigzag};
use super::Path;
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::{
    FieldTagging, FloatWidth, IntEncoding, IntType, IntWidth, RecordSchema, Schema, SchemaNode,
};
use crate::tagged::TaggedDecoder;
use crate::value::Value;

/// Schema-guided decoder.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: CodecOptions,
    tagged: TaggedDecoder,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            tagged: TaggedDecoder::with_options(options),
        }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Decodes one payload spanning all of `data`.
    pub fn decode(&self, data: &[u8], schema: &Schema) -> Result<Value> {
        let mut reader = Reader::new(data);
        let value = self.read(&mut reader, schema.root(), 0)?;
        if !reader.is_empty() {
            return Err(Error::TrailingBytes {
                remaining: reader.size(),
            });
        }
        Ok(value)
    }

    pub fn read(&self, r: &mut Reader<'_>, node: &SchemaNode, depth: usize) -> Result<Value> {
        self.read_node(r, node, &Path::Root, depth)
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::LimitExceeded {
                what: "nesting depth",
                limit: self.options.max_depth,
            });
        }
        Ok(())
    }

    fn read_node(
        &self,
        r: &mut Reader<'_>,
        node: &SchemaNode,
        path: &Path<'_>,
        depth: usize,
    ) -> Result<Value> {
        self.check_depth(depth)?;
        let value = match node {
            SchemaNode::Null => Value::Null,
            SchemaNode::Bool => Value::Bool(read_bool(r)?),
            SchemaNode::Int(t) => read_int(r, t)?,
            SchemaNode::Float(FloatWidth::F32) => Value::Float(r.try_f32()? as f64),
            SchemaNode::Float(FloatWidth::F64) => Value::Float(r.try_f64()?),
            SchemaNode::Bytes => {
                let len = read_count(r, &self.options, 1)?;
                Value::Bytes(r.try_buf(len)?.to_vec())
            }
            SchemaNode::Str => Value::Str(read_utf8(r, &self.options)?),
            SchemaNode::Id => Value::Id(r.try_u128()?),
            SchemaNode::Any => self.tagged.read_value(r, depth)?,
            SchemaNode::Seq(item) => {
                let len = read_count(r, &self.options, min_size(item))?;
                let mut items = Vec::with_capacity(capacity_for(len, r));
                for i in 0..len {
                    items.push(self.read_node(r, item, &path.index(i), depth + 1)?);
                }
                Value::Seq(items)
            }
            SchemaNode::Enum(symbols) => Value::Str(read_symbol(r, symbols)?.to_owned()),
            SchemaNode::Record(record) => self.read_record(r, record, path, depth)?,
        };
        Ok(value)
    }

    fn read_record(
        &self,
        r: &mut Reader<'_>,
        record: &RecordSchema,
        path: &Path<'_>,
        depth: usize,
    ) -> Result<Value> {
        let count = read_count(r, &self.options, 1)?;
        if count > record.fields.len() {
            return Err(Error::mismatch(
                path.to_string(),
                format!("{count} fields present, schema has {}", record.fields.len()),
            ));
        }
        let mut slots: Vec<Option<Value>> = vec![None; record.fields.len()];
        for _ in 0..count {
            let index = read_field_tag(r, record)?;
            let field = &record.fields[index];
            if slots[index].is_some() {
                return Err(Error::mismatch(
                    path.to_string(),
                    format!("field {:?} appears twice", field.name),
                ));
            }
            slots[index] = Some(self.read_node(r, &field.node, &path.field(&field.name), depth + 1)?);
        }
        let mut pairs = Vec::with_capacity(count);
        for (field, slot) in record.fields.iter().zip(slots) {
            match slot.or_else(|| field.default.clone()) {
                Some(v) => pairs.push((field.name.clone(), v)),
                None if field.optional => {}
                None => {
                    return Err(Error::mismatch(
                        path.field(&field.name).to_string(),
                        "required field is missing",
                    ))
                }
            }
        }
        Ok(Value::Map(pairs))
    }

    /// Advances past one payload of `node` without building a value.
    pub(crate) fn skip(&self, r: &mut Reader<'_>, node: &SchemaNode, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        match node {
            SchemaNode::Null => {}
            SchemaNode::Bool => {
                read_bool(r)?;
            }
            SchemaNode::Int(t) => match t.encoding {
                IntEncoding::Fixed => r.try_skip(t.width.bits() as usize / 8)?,
                IntEncoding::Varint => {
                    read_varint_bits(r, t.width.bits())?;
                }
            },
            SchemaNode::Float(FloatWidth::F32) => r.try_skip(4)?,
            SchemaNode::Float(FloatWidth::F64) => r.try_skip(8)?,
            SchemaNode::Bytes | SchemaNode::Str => {
                let len = read_count(r, &self.options, 1)?;
                r.try_skip(len)?;
            }
            SchemaNode::Id => r.try_skip(16)?,
            SchemaNode::Any => {
                self.tagged.read_value(r, depth)?;
            }
            SchemaNode::Seq(item) => {
                let len = read_count(r, &self.options, min_size(item))?;
                for _ in 0..len {
                    self.skip(r, item, depth + 1)?;
                }
            }
            SchemaNode::Enum(symbols) => {
                read_symbol(r, symbols)?;
            }
            SchemaNode::Record(record) => {
                let count = read_count(r, &self.options, 1)?;
                for _ in 0..count {
                    let index = read_field_tag(r, record)?;
                    self.skip(r, &record.fields[index].node, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn read_bool(r: &mut Reader<'_>) -> Result<bool> {
    let offset = r.position();
    match r.try_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::UnknownTag {
            tag: other as u64,
            offset,
        }),
    }
}

fn read_int(r: &mut Reader<'_>, t: &IntType) -> Result<Value> {
    let value = match (t.encoding, t.signed, t.width) {
        (IntEncoding::Varint, true, width) => {
            Value::Int(unzigzag(read_varint_bits(r, width.bits())?))
        }
        (IntEncoding::Varint, false, width) => Value::UInt(read_varint_bits(r, width.bits())?),
        (IntEncoding::Fixed, false, IntWidth::W8) => Value::UInt(r.try_u8()? as u64),
        (IntEncoding::Fixed, true, IntWidth::W8) => Value::Int(r.try_i8()? as i64),
        (IntEncoding::Fixed, false, IntWidth::W16) => Value::UInt(r.try_u16()? as u64),
        (IntEncoding::Fixed, true, IntWidth::W16) => Value::Int(r.try_i16()? as i64),
        (IntEncoding::Fixed, false, IntWidth::W32) => Value::UInt(r.try_u32()? as u64),
        (IntEncoding::Fixed, true, IntWidth::W32) => Value::Int(r.try_i32()? as i64),
        (IntEncoding::Fixed, false, IntWidth::W64) => Value::UInt(r.try_u64()?),
        (IntEncoding::Fixed, true, IntWidth::W64) => Value::Int(r.try_i64()?),
    };
    Ok(value)
}

fn read_symbol<'s>(r: &mut Reader<'_>, symbols: &'s [String]) -> Result<&'s str> {
    let offset = r.position();
    let index = read_varint(r)?;
    usize::try_from(index)
        .ok()
        .and_then(|i| symbols.get(i))
        .map(String::as_str)
        .ok_or(Error::UnknownTag { tag: index, offset })
}

/// Reads a record field tag and returns the field's position.
pub(crate) fn read_field_tag(r: &mut Reader<'_>, record: &RecordSchema) -> Result<usize> {
    let offset = r.position();
    match record.tagging {
        FieldTagging::Positional => {
            let tag = read_varint(r)?;
            usize::try_from(tag)
                .ok()
                .filter(|i| *i < record.fields.len())
                .ok_or(Error::UnknownTag { tag, offset })
        }
        FieldTagging::Named => {
            // An unknown name is reported with its length as the tag.
            let len = read_len(r)?;
            let name = r.try_buf(len)?;
            record
                .fields
                .iter()
                .position(|f| f.name.as_bytes() == name)
                .ok_or(Error::UnknownTag {
                    tag: len as u64,
                    offset,
                })
        }
    }
}

/// Smallest payload a node can have. Used to reject counts that the
/// remaining input cannot possibly hold.
pub(crate) fn min_size(node: &SchemaNode) -> usize {
    match node {
        SchemaNode::Null => 0,
        SchemaNode::Int(IntType {
            encoding: IntEncoding::Fixed,
            width,
            ..
        }) => width.bits() as usize / 8,
        SchemaNode::Float(FloatWidth::F32) => 4,
        SchemaNode::Float(FloatWidth::F64) => 8,
        SchemaNode::Id => 16,
        _ => 1,
    }
}

/// Reads a length or count, checking it against the collection limit and
/// against what `unit`-sized elements the remaining input could hold.
pub(crate) fn read_count(r: &mut Reader<'_>, options: &CodecOptions, unit: usize) -> Result<usize> {
    let count = read_len(r)?;
    if count > options.max_collection_len {
        return Err(Error::LimitExceeded {
            what: "collection length",
            limit: options.max_collection_len,
        });
    }
    let needed = count.saturating_mul(unit);
    if needed > r.size() {
        return Err(Error::TruncatedInput {
            offset: r.position(),
            needed: needed - r.size(),
        });
    }
    Ok(count)
}

/// Preallocation for `count` elements. Zero-sized elements let a short
/// input declare a large count, so the remaining input length bounds it.
pub(crate) fn capacity_for(count: usize, r: &Reader<'_>) -> usize {
    count.min(r.size())
}

pub(crate) fn read_utf8(r: &mut Reader<'_>, options: &CodecOptions) -> Result<String> {
    let len = read_count(r, options, 1)?;
    let offset = r.position();
    let bytes = r.try_buf(len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| Error::InvalidUtf8 { offset })
}
