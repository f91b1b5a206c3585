use std::collections::HashMap;

use plankton_buffers::Writer;

use super::constants::*;
use super::nibbles::write_tags;
use crate::codec::varint::write_varint;
use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::value::Value;

/// Writes values in the self-describing tagged encoding.
#[derive(Debug, Clone, Default)]
pub struct TaggedEncoder {
    options: CodecOptions,
    share_repeats: bool,
}

/// Which composite values get written once and referenced afterwards.
#[derive(Default)]
struct Shared<'v> {
    seen: HashMap<&'v Value, usize>,
    keys: HashMap<&'v Value, u64>,
    next_key: u64,
}

impl<'v> Shared<'v> {
    /// Counts composites. A repeat is not descended into, so values that only
    /// occur inside a repeated composite are counted once.
    fn scan(&mut self, value: &'v Value, depth: usize, max_depth: usize) {
        if depth > max_depth || !shareable(value) {
            return;
        }
        let seen = self.seen.entry(value).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            return;
        }
        let mut inner = |v: &'v Value| self.scan(v, depth + 1, max_depth);
        match value {
            Value::Seq(items) => items.iter().for_each(inner),
            Value::Map(pairs) => pairs.iter().for_each(|(_, v)| inner(v)),
            Value::Seed(seed) => {
                inner(&seed.header);
                seed.fields.iter().for_each(|(_, v)| inner(v));
            }
            Value::Struct(fields) => fields.iter().for_each(|(_, v)| inner(v)),
            _ => {}
        }
    }

    fn repeated(&self, value: &Value) -> bool {
        self.seen.get(value).is_some_and(|n| *n > 1)
    }
}

/// Non-empty composites; an empty one is no longer than a reference to it.
fn shareable(value: &Value) -> bool {
    match value {
        Value::Seq(items) => !items.is_empty(),
        Value::Map(pairs) => !pairs.is_empty(),
        Value::Struct(fields) => !fields.is_empty(),
        Value::Seed(_) => true,
        _ => false,
    }
}

impl TaggedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            share_repeats: false,
        }
    }

    /// Writes each repeated composite once and back-references it after
    /// that. Decoding yields an equal value with the repeats expanded.
    pub fn sharing_repeats(mut self) -> Self {
        self.share_repeats = true;
        self
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.write_value(&mut writer, value, 0)?;
        Ok(writer.flush())
    }

    pub fn write_value(&self, w: &mut Writer, value: &Value, depth: usize) -> Result<()> {
        let mut shared = Shared::default();
        if self.share_repeats {
            shared.scan(value, depth, self.options.max_depth);
        }
        self.write(w, value, depth, &mut shared)
    }

    fn write<'v>(
        &self,
        w: &mut Writer,
        value: &'v Value,
        depth: usize,
        shared: &mut Shared<'v>,
    ) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::LimitExceeded {
                what: "nesting depth",
                limit: self.options.max_depth,
            });
        }
        if shared.repeated(value) {
            if let Some(key) = shared.keys.get(value) {
                w.u8(GET_REF);
                write_varint(w, shared.next_key - key - 1);
                return Ok(());
            }
            shared.keys.insert(value, shared.next_key);
            shared.next_key += 1;
            w.u8(ADD_REF);
        }
        match value {
            Value::Null => w.u8(NULL),
            Value::Bool(true) => w.u8(TRUE),
            Value::Bool(false) => w.u8(FALSE),
            Value::Int(n) => write_int(w, *n),
            Value::UInt(n) => match i64::try_from(*n) {
                Ok(n) => write_int(w, n),
                Err(_) => {
                    w.u8(INT_P);
                    write_varint(w, *n);
                }
            },
            Value::Float(f) => match narrow_float(*f) {
                Some(single) => {
                    w.u8(FLOAT_32);
                    w.f32(single);
                }
                None => {
                    w.u8(FLOAT_64);
                    w.f64(*f);
                }
            },
            Value::Id(id) => write_id(w, *id),
            Value::Bytes(bytes) => {
                w.u8(BLOB_N);
                write_varint(w, bytes.len() as u64);
                w.buf(bytes);
            }
            Value::Str(s) => write_str(w, s),
            Value::Seq(items) => {
                write_sized(w, items.len(), ARRAY_0, ARRAY_3, ARRAY_N);
                for item in items {
                    self.write(w, item, depth + 1, shared)?;
                }
            }
            Value::Map(pairs) => {
                write_sized(w, pairs.len(), MAP_0, MAP_3, MAP_N);
                self.write_entries(w, pairs, depth, shared)?;
            }
            Value::Seed(seed) => {
                write_sized(w, seed.fields.len(), SEED_0, SEED_3, SEED_N);
                self.write(w, &seed.header, depth + 1, shared)?;
                self.write_entries(w, &seed.fields, depth, shared)?;
            }
            Value::Struct(fields) => {
                if fields.windows(2).any(|pair| pair[1].0 < pair[0].0) {
                    return Err(Error::InvalidValue(
                        "struct tags must be in ascending order".to_string(),
                    ));
                }
                let linear = fields.len() <= (STRUCT_7 - STRUCT_0) as usize
                    && fields.iter().enumerate().all(|(i, (tag, _))| *tag == i as u64);
                if linear {
                    w.u8(STRUCT_0 + fields.len() as u8);
                } else {
                    w.u8(STRUCT_N);
                    write_varint(w, fields.len() as u64);
                    let tags: Vec<u64> = fields.iter().map(|(tag, _)| *tag).collect();
                    write_tags(w, &tags);
                }
                for (_, item) in fields {
                    self.write(w, item, depth + 1, shared)?;
                }
            }
        }
        Ok(())
    }

    fn write_entries<'v>(
        &self,
        w: &mut Writer,
        pairs: &'v [(String, Value)],
        depth: usize,
        shared: &mut Shared<'v>,
    ) -> Result<()> {
        for (key, item) in pairs {
            write_str(w, key);
            self.write(w, item, depth + 1, shared)?;
        }
        Ok(())
    }
}

fn write_int(w: &mut Writer, n: i64) {
    match n {
        0..=5 => w.u8(INT_0 + n as u8),
        -1 => w.u8(INT_M1),
        -2 => w.u8(INT_M2),
        -3 => w.u8(INT_M3),
        n if n < 0 => {
            w.u8(INT_M);
            write_varint(w, (-(n + 1)) as u64);
        }
        n => {
            w.u8(INT_P);
            write_varint(w, n as u64);
        }
    }
}

fn write_id(w: &mut Writer, id: u128) {
    let bytes = id.to_be_bytes();
    if id > u64::MAX as u128 {
        w.u8(ID_128);
        w.buf(&bytes);
    } else if id > u32::MAX as u128 {
        w.u8(ID_64);
        w.buf(&bytes[8..]);
    } else if id > u16::MAX as u128 {
        w.u8(ID_32);
        w.buf(&bytes[12..]);
    } else {
        w.u8(ID_16);
        w.buf(&bytes[14..]);
    }
}

fn write_str(w: &mut Writer, s: &str) {
    if s.len() <= 7 {
        w.u8(STRING_0 + s.len() as u8);
    } else {
        w.u8(STRING_N);
        write_varint(w, s.len() as u64);
    }
    w.utf8(s);
}

fn write_sized(w: &mut Writer, len: usize, tag_0: u8, tag_3: u8, tag_n: u8) {
    if len <= (tag_3 - tag_0) as usize {
        w.u8(tag_0 + len as u8);
    } else {
        w.u8(tag_n);
        write_varint(w, len as u64);
    }
}

/// Returns the single-precision form of `value` when it represents the
/// number exactly.
///
/// Zero, infinities and NaN always narrow. Otherwise the exponent must be in
/// the normal single-precision range and the low 29 significand bits zero.
pub fn narrow_float(value: f64) -> Option<f32> {
    if value == 0.0 || value.is_infinite() || value.is_nan() {
        return Some(value as f32);
    }
    let raw = value.to_bits();
    let significand = raw & 0x000f_ffff_ffff_ffff;
    let exponent = ((raw & 0x7ff0_0000_0000_0000) >> 52) as i64 - 1023;
    if (-126..=127).contains(&exponent) && significand & 0x1fff_ffff == 0 {
        Some(value as f32)
    } else {
        None
    }
}
