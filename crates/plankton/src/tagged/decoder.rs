use plankton_buffers::Reader;

use super::constants::*;
use super::nibbles::read_tags;
use super::StringEncoding;
use crate::codec::varint::{read_len, read_varint};
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::value::{Seed, Value, ValueKind};

/// Reads values in the self-describing tagged encoding.
#[derive(Debug, Clone, Default)]
pub struct TaggedDecoder {
    options: CodecOptions,
    strings: StringEncoding,
}

/// Values registered by `ADD_REF`, in order. `None` while the value is
/// still being read.
#[derive(Default)]
struct Refs {
    values: Vec<Option<(Value, usize)>>,
    expanded: usize,
}

impl TaggedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            strings: StringEncoding::default(),
        }
    }

    /// Sets how string payloads are read. Map and seed keys included.
    pub fn with_string_encoding(mut self, strings: StringEncoding) -> Self {
        self.strings = strings;
        self
    }

    /// Decodes exactly one value spanning all of `data`.
    pub fn decode(&self, data: &[u8]) -> Result<Value> {
        let mut reader = Reader::new(data);
        let value = self.read_value(&mut reader, 0)?;
        if !reader.is_empty() {
            return Err(Error::TrailingBytes {
                remaining: reader.size(),
            });
        }
        Ok(value)
    }

    /// Reads one value. Back-references resolve within this value only.
    pub fn read_value(&self, r: &mut Reader<'_>, depth: usize) -> Result<Value> {
        self.read(r, depth, &mut Refs::default())
    }

    fn read(&self, r: &mut Reader<'_>, depth: usize, refs: &mut Refs) -> Result<Value> {
        if depth > self.options.max_depth {
            return Err(Error::LimitExceeded {
                what: "nesting depth",
                limit: self.options.max_depth,
            });
        }
        let offset = r.position();
        let tag = r.try_u8()?;
        let value = match tag {
            INT_0..=INT_5 => Value::Int((tag - INT_0) as i64),
            INT_M1 => Value::Int(-1),
            INT_M2 => Value::Int(-2),
            INT_M3 => Value::Int(-3),
            INT_P => {
                let n = read_varint(r)?;
                match i64::try_from(n) {
                    Ok(n) => Value::Int(n),
                    Err(_) => Value::UInt(n),
                }
            }
            INT_M => {
                let start = r.position();
                let n = i64::try_from(read_varint(r)?)
                    .map_err(|_| Error::MalformedVarint { offset: start })?;
                Value::Int(-n - 1)
            }
            NULL => Value::Null,
            TRUE => Value::Bool(true),
            FALSE => Value::Bool(false),
            ID_16 => Value::Id(read_id(r, 2)?),
            ID_32 => Value::Id(read_id(r, 4)?),
            ID_64 => Value::Id(read_id(r, 8)?),
            ID_128 => Value::Id(read_id(r, 16)?),
            FLOAT_32 => Value::Float(r.try_f32()? as f64),
            FLOAT_64 => Value::Float(r.try_f64()?),
            ARRAY_0..=ARRAY_3 | ARRAY_N => {
                let len = self.read_count(r, tag, ARRAY_0, ARRAY_N)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read(r, depth + 1, refs)?);
                }
                Value::Seq(items)
            }
            MAP_0..=MAP_3 | MAP_N => {
                let len = self.read_count(r, tag, MAP_0, MAP_N)?;
                Value::Map(self.read_entries(r, len, depth, refs)?)
            }
            BLOB_N => {
                let len = self.read_count(r, tag, BLOB_N, BLOB_N)?;
                Value::Bytes(r.try_buf(len)?.to_vec())
            }
            STRING_0..=STRING_7 | STRING_N => {
                let len = self.read_count(r, tag, STRING_0, STRING_N)?;
                let start = r.position();
                Value::Str(self.strings.decode(r.try_buf(len)?, start)?)
            }
            SEED_0..=SEED_3 | SEED_N => {
                let len = self.read_count(r, tag, SEED_0, SEED_N)?;
                let header = self.read(r, depth + 1, refs)?;
                let fields = self.read_entries(r, len, depth, refs)?;
                Value::Seed(Box::new(Seed { header, fields }))
            }
            STRUCT_0..=STRUCT_7 | STRUCT_N => {
                let tags = if tag == STRUCT_N {
                    let len = self.read_count(r, tag, STRUCT_N, STRUCT_N)?;
                    read_tags(r, len)?
                } else {
                    (0..(tag - STRUCT_0) as u64).collect()
                };
                let mut fields = Vec::with_capacity(tags.len());
                for tag in tags {
                    fields.push((tag, self.read(r, depth + 1, refs)?));
                }
                Value::Struct(fields)
            }
            ADD_REF => {
                let key = refs.values.len();
                refs.values.push(None);
                let value = self.read(r, depth + 1, refs)?;
                refs.values[key] = Some((value.clone(), value.node_count()));
                value
            }
            GET_REF => {
                let distance = read_varint(r)?;
                let key = usize::try_from(distance)
                    .ok()
                    .and_then(|d| refs.values.len().checked_sub(d)?.checked_sub(1))
                    .ok_or(Error::BadReference { offset })?;
                let Some((value, count)) = &refs.values[key] else {
                    return Err(Error::BadReference { offset });
                };
                refs.expanded = refs.expanded.saturating_add(*count);
                if refs.expanded > self.options.max_collection_len {
                    return Err(Error::LimitExceeded {
                        what: "expanded back-references",
                        limit: self.options.max_collection_len,
                    });
                }
                value.clone()
            }
            _ => {
                return Err(Error::UnknownTag {
                    tag: tag as u64,
                    offset,
                })
            }
        };
        Ok(value)
    }

    /// Reads `len` string-keyed entries.
    fn read_entries(
        &self,
        r: &mut Reader<'_>,
        len: usize,
        depth: usize,
        refs: &mut Refs,
    ) -> Result<Vec<(String, Value)>> {
        let mut pairs = Vec::with_capacity(len);
        for _ in 0..len {
            let key = match self.read(r, depth + 1, refs)? {
                Value::Str(s) => s,
                other => {
                    return Err(Error::TypeMismatch {
                        expected: ValueKind::String,
                        found: other.kind(),
                    })
                }
            };
            let item = self.read(r, depth + 1, refs)?;
            pairs.push((key, item));
        }
        Ok(pairs)
    }

    /// Length of a collection whose short forms are `tag_0 + len` and whose
    /// long form `tag_n` is followed by a varint. Every element takes at
    /// least one byte, so a count beyond the remaining input is truncation.
    fn read_count(&self, r: &mut Reader<'_>, tag: u8, tag_0: u8, tag_n: u8) -> Result<usize> {
        let len = if tag == tag_n {
            read_len(r)?
        } else {
            (tag - tag_0) as usize
        };
        if len > self.options.max_collection_len {
            return Err(Error::LimitExceeded {
                what: "collection length",
                limit: self.options.max_collection_len,
            });
        }
        if len > r.size() {
            return Err(Error::TruncatedInput {
                offset: r.position(),
                needed: len - r.size(),
            });
        }
        Ok(len)
    }
}

fn read_id(r: &mut Reader<'_>, size: usize) -> Result<u128> {
    let bytes = r.try_buf(size)?;
    Ok(bytes.iter().fold(0u128, |acc, b| (acc << 8) | *b as u128))
}
