//! [`Value`]: the in-memory form of every plankton value.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};

/// A plankton value.
///
/// Integer width and float width are properties of the schema, not of the
/// value: `Int` and `UInt` are storage choices, and two integers are equal
/// whenever they denote the same number.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer, needed above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    /// 128-bit identifier.
    Id(u128),
    Seq(Vec<Value>),
    /// Ordered `(key, value)` pairs. Equality ignores order.
    Map(Vec<(String, Value)>),
    /// A typed object.
    Seed(Box<Seed>),
    /// Values identified by integer tags, in ascending tag order.
    Struct(Vec<(u64, Value)>),
}

/// An object whose header names its type, with named fields. Field order is
/// ignored by equality, as for maps.
#[derive(Debug, Clone)]
pub struct Seed {
    pub header: Value,
    pub fields: Vec<(String, Value)>,
}

impl PartialEq for Seed {
    fn eq(&self, other: &Seed) -> bool {
        self.header == other.header && same_entries(&self.fields, &other.fields)
    }
}

impl Eq for Seed {}

impl Hash for Seed {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.header.hash(state);
        hash_entries(&self.fields, state);
    }
}

/// The kind of a [`Value`], independent of width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    Bytes,
    String,
    Id,
    Sequence,
    Mapping,
    Seed,
    Struct,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Bytes => "bytes",
            ValueKind::String => "string",
            ValueKind::Id => "id",
            ValueKind::Sequence => "sequence",
            ValueKind::Mapping => "mapping",
            ValueKind::Seed => "seed",
            ValueKind::Struct => "struct",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) | Value::UInt(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Str(_) => ValueKind::String,
            Value::Id(_) => ValueKind::Id,
            Value::Seq(_) => ValueKind::Sequence,
            Value::Map(_) => ValueKind::Mapping,
            Value::Seed(_) => ValueKind::Seed,
            Value::Struct(_) => ValueKind::Struct,
        }
    }

    pub fn seed<K: Into<String>>(
        header: Value,
        fields: impl IntoIterator<Item = (K, Value)>,
    ) -> Value {
        Value::Seed(Box::new(Seed {
            header,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }))
    }

    /// Number of values in this tree, counting `self`.
    pub(crate) fn node_count(&self) -> usize {
        1 + match self {
            Value::Seq(items) => items.iter().map(Value::node_count).sum(),
            Value::Map(pairs) => pairs.iter().map(|(_, v)| v.node_count()).sum(),
            Value::Seed(seed) => {
                let fields: usize = seed.fields.iter().map(|(_, v)| v.node_count()).sum();
                seed.header.node_count() + fields
            }
            Value::Struct(fields) => fields.iter().map(|(_, v)| v.node_count()).sum(),
            _ => 0,
        }
    }

    /// Whether this value holds other values.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Value::Seq(_) | Value::Map(_) | Value::Seed(_) | Value::Struct(_)
        )
    }

    /// Builds a mapping from `(key, value)` pairs.
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn mismatch(&self, expected: ValueKind) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(ValueKind::Bool)),
        }
    }

    /// The integer as `i128`, wide enough for both storages.
    pub fn as_i128(&self) -> Result<i128> {
        match self {
            Value::Int(n) => Ok(*n as i128),
            Value::UInt(n) => Ok(*n as i128),
            _ => Err(self.mismatch(ValueKind::Integer)),
        }
    }

    /// The integer as `i64`. An unsigned value above `i64::MAX` is reported
    /// as a mismatch.
    pub fn as_i64(&self) -> Result<i64> {
        let n = self.as_i128()?;
        i64::try_from(n).map_err(|_| self.mismatch(ValueKind::Integer))
    }

    /// The integer as `u64`. Negative values are reported as a mismatch.
    pub fn as_u64(&self) -> Result<u64> {
        let n = self.as_i128()?;
        u64::try_from(n).map_err(|_| self.mismatch(ValueKind::Integer))
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            _ => Err(self.mismatch(ValueKind::Float)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(self.mismatch(ValueKind::String)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            _ => Err(self.mismatch(ValueKind::Bytes)),
        }
    }

    pub fn as_id(&self) -> Result<u128> {
        match self {
            Value::Id(id) => Ok(*id),
            _ => Err(self.mismatch(ValueKind::Id)),
        }
    }

    pub fn as_seq(&self) -> Result<&[Value]> {
        match self {
            Value::Seq(items) => Ok(items),
            _ => Err(self.mismatch(ValueKind::Sequence)),
        }
    }

    pub fn as_map(&self) -> Result<&[(String, Value)]> {
        match self {
            Value::Map(pairs) => Ok(pairs),
            _ => Err(self.mismatch(ValueKind::Mapping)),
        }
    }

    /// Looks up a mapping entry. `Ok(None)` when the key is absent.
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        Ok(self
            .as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(_) | Value::UInt(_), Value::Int(_) | Value::UInt(_)) => {
                self.as_i128().ok() == other.as_i128().ok()
            }
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Id(a), Value::Id(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => same_entries(a, b),
            (Value::Seed(a), Value::Seed(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => (*n as i128).hash(state),
            Value::UInt(n) => (*n as i128).hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Id(id) => id.hash(state),
            Value::Seq(items) => items.hash(state),
            Value::Map(pairs) => hash_entries(pairs, state),
            Value::Seed(seed) => seed.hash(state),
            Value::Struct(fields) => fields.hash(state),
        }
    }
}

/// Each entry of `a` pairs off with a distinct equal entry of `b`.
fn same_entries(a: &[(String, Value)], b: &[(String, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut taken = vec![false; b.len()];
    a.iter().all(|entry| {
        let slot = b
            .iter()
            .enumerate()
            .position(|(i, other)| !taken[i] && other == entry);
        match slot {
            Some(i) => {
                taken[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Entry hashes are summed so that order, including the order of repeated
/// keys, does not matter.
fn hash_entries<H: Hasher>(entries: &[(String, Value)], state: &mut H) {
    let sum = entries.iter().fold(0u64, |acc, entry| {
        let mut h = DefaultHasher::new();
        entry.hash(&mut h);
        acc.wrapping_add(h.finish())
    });
    entries.len().hash(state);
    sum.hash(state);
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt(n as u64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
