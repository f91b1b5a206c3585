use plankton_buffers::Writer;

use super::varint::{write_varint, zigzag};
use super::Path;
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::schema::{
    FieldTagging, FloatWidth, IntEncoding, IntType, IntWidth, RecordSchema, Schema, SchemaNode,
};
use crate::tagged::TaggedEncoder;
use crate::value::Value;

/// Schema-guided encoder.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: CodecOptions,
    tagged: TaggedEncoder,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            tagged: TaggedEncoder::with_options(options),
        }
    }

    pub fn encode(&self, value: &Value, schema: &Schema) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.write(&mut writer, value, schema)?;
        Ok(writer.flush())
    }

    /// Appends the payload of `value` to `w`. On error `w` may hold a
    /// partial payload; callers discard it.
    pub fn write(&self, w: &mut Writer, value: &Value, schema: &Schema) -> Result<()> {
        self.write_node(w, schema.root(), value, &Path::Root, 0)
    }

    fn write_node(
        &self,
        w: &mut Writer,
        node: &SchemaNode,
        value: &Value,
        path: &Path<'_>,
        depth: usize,
    ) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::LimitExceeded {
                what: "nesting depth",
                limit: self.options.max_depth,
            });
        }
        let mismatch = || {
            Error::mismatch(
                path.to_string(),
                format!("expected {}, found {}", node.type_name(), value.kind()),
            )
        };
        match (node, value) {
            (SchemaNode::Null, Value::Null) => {}
            (SchemaNode::Bool, Value::Bool(b)) => w.u8(*b as u8),
            (SchemaNode::Int(t), Value::Int(_) | Value::UInt(_)) => {
                write_int(w, t, value.as_i128()?, path)?
            }
            (SchemaNode::Float(width), Value::Float(_) | Value::Int(_) | Value::UInt(_)) => {
                let f = width.exact(value).ok_or_else(|| {
                    Error::mismatch(
                        path.to_string(),
                        format!("{value:?} does not fit {} exactly", node.type_name()),
                    )
                })?;
                match width {
                    FloatWidth::F32 => w.f32(f as f32),
                    FloatWidth::F64 => w.f64(f),
                }
            }
            (SchemaNode::Bytes, Value::Bytes(bytes)) => {
                write_varint(w, bytes.len() as u64);
                w.buf(bytes);
            }
            (SchemaNode::Str, Value::Str(s)) => {
                write_varint(w, s.len() as u64);
                w.utf8(s);
            }
            (SchemaNode::Id, Value::Id(id)) => w.u128(*id),
            (SchemaNode::Any, _) => self.tagged.write_value(w, value, depth)?,
            (SchemaNode::Seq(item), Value::Seq(items)) => {
                write_varint(w, items.len() as u64);
                for (i, v) in items.iter().enumerate() {
                    self.write_node(w, item, v, &path.index(i), depth + 1)?;
                }
            }
            (SchemaNode::Enum(symbols), Value::Str(s)) => {
                let index = symbols.iter().position(|sym| sym == s).ok_or_else(|| {
                    Error::mismatch(path.to_string(), format!("unknown enum symbol {s:?}"))
                })?;
                write_varint(w, index as u64);
            }
            (SchemaNode::Record(record), Value::Map(pairs)) => {
                self.write_record(w, record, pairs, path, depth)?
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    fn write_record(
        &self,
        w: &mut Writer,
        record: &RecordSchema,
        pairs: &[(String, Value)],
        path: &Path<'_>,
        depth: usize,
    ) -> Result<()> {
        for (i, (key, _)) in pairs.iter().enumerate() {
            if record.field(key).is_none() {
                return Err(Error::mismatch(
                    path.to_string(),
                    format!("field {key:?} is not in the schema"),
                ));
            }
            if pairs[..i].iter().any(|(k, _)| k == key) {
                return Err(Error::mismatch(
                    path.to_string(),
                    format!("field {key:?} appears twice"),
                ));
            }
        }

        let mut present = Vec::with_capacity(record.fields.len());
        for (index, field) in record.fields.iter().enumerate() {
            let given = pairs.iter().find(|(k, _)| *k == field.name).map(|(_, v)| v);
            let value = match given {
                Some(Value::Null) if field.optional && field.node != SchemaNode::Null => None,
                Some(v) => Some(v),
                None => match &field.default {
                    Some(default) => Some(default),
                    None if field.optional => None,
                    None => {
                        return Err(Error::mismatch(
                            path.field(&field.name).to_string(),
                            "required field is missing",
                        ))
                    }
                },
            };
            if let Some(v) = value {
                present.push((index, field, v));
            }
        }

        write_varint(w, present.len() as u64);
        for (index, field, v) in present {
            match record.tagging {
                FieldTagging::Positional => write_varint(w, index as u64),
                FieldTagging::Named => {
                    write_varint(w, field.name.len() as u64);
                    w.utf8(&field.name);
                }
            }
            self.write_node(w, &field.node, v, &path.field(&field.name), depth + 1)?;
        }
        Ok(())
    }
}

fn write_int(w: &mut Writer, t: &IntType, n: i128, path: &Path<'_>) -> Result<()> {
    if !t.contains(n) {
        return Err(Error::mismatch(
            path.to_string(),
            format!("{n} is out of range for {t}"),
        ));
    }
    match (t.encoding, t.signed, t.width) {
        (IntEncoding::Varint, true, _) => write_varint(w, zigzag(n as i64)),
        (IntEncoding::Varint, false, _) => write_varint(w, n as u64),
        (IntEncoding::Fixed, false, IntWidth::W8) => w.u8(n as u8),
        (IntEncoding::Fixed, true, IntWidth::W8) => w.i8(n as i8),
        (IntEncoding::Fixed, false, IntWidth::W16) => w.u16(n as u16),
        (IntEncoding::Fixed, true, IntWidth::W16) => w.i16(n as i16),
        (IntEncoding::Fixed, false, IntWidth::W32) => w.u32(n as u32),
        (IntEncoding::Fixed, true, IntWidth::W32) => w.i32(n as i32),
        (IntEncoding::Fixed, false, IntWidth::W64) => w.u64(n as u64),
        (IntEncoding::Fixed, true, IntWidth::W64) => w.i64(n as i64),
    }
    Ok(())
}
