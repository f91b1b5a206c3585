//! Schema node definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Width of an integer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            IntWidth::W8 => 0,
            IntWidth::W16 => 1,
            IntWidth::W32 => 2,
            IntWidth::W64 => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(IntWidth::W8),
            1 => Some(IntWidth::W16),
            2 => Some(IntWidth::W32),
            3 => Some(IntWidth::W64),
            _ => None,
        }
    }

    fn from_bits(bits: &str) -> Option<Self> {
        match bits {
            "8" => Some(IntWidth::W8),
            "16" => Some(IntWidth::W16),
            "32" => Some(IntWidth::W32),
            "64" => Some(IntWidth::W64),
            _ => None,
        }
    }
}

/// How an integer is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntEncoding {
    /// Little-endian, exactly `width` bytes.
    Fixed,
    /// Base-128 varint; zigzag-mapped first when signed.
    Varint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntType {
    pub width: IntWidth,
    pub signed: bool,
    pub encoding: IntEncoding,
}

impl IntType {
    pub fn min(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.width.bits() - 1))
        } else {
            0
        }
    }

    pub fn max(&self) -> i128 {
        if self.signed {
            (1i128 << (self.width.bits() - 1)) - 1
        } else {
            (1i128 << self.width.bits()) - 1
        }
    }

    pub fn contains(&self, n: i128) -> bool {
        (self.min()..=self.max()).contains(&n)
    }

    /// Parses names such as `uint32`, `int8` or `varint64`.
    pub fn parse(name: &str) -> Option<IntType> {
        let (encoding, rest) = match name.strip_prefix("var") {
            Some(rest) => (IntEncoding::Varint, rest),
            None => (IntEncoding::Fixed, name),
        };
        let (signed, bits) = if let Some(bits) = rest.strip_prefix("uint") {
            (false, bits)
        } else if let Some(bits) = rest.strip_prefix("int") {
            (true, bits)
        } else {
            return None;
        };
        Some(IntType {
            width: IntWidth::from_bits(bits)?,
            signed,
            encoding,
        })
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.encoding == IntEncoding::Varint {
            f.write_str("var")?;
        }
        let sign = if self.signed { "int" } else { "uint" };
        write!(f, "{}{}", sign, self.width.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    /// The number `value` stores as at this width, or `None` when storing it
    /// would change it. Integers pass only when the float holds them
    /// exactly; NaN and the infinities pass at either width.
    pub fn exact(self, value: &Value) -> Option<f64> {
        let f = match value {
            Value::Float(f) => *f,
            Value::Int(_) | Value::UInt(_) => {
                let n = value.as_i128().ok()?;
                let f = n as f64;
                if f as i128 != n {
                    return None;
                }
                f
            }
            _ => return None,
        };
        match self {
            FloatWidth::F32 if f.is_finite() && (f as f32) as f64 != f => None,
            _ => Some(f),
        }
    }
}

/// How record fields are identified on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTagging {
    /// Fields carry their position in the writer schema.
    #[default]
    Positional,
    /// Fields carry their name, making records self-describing.
    Named,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub fields: Vec<Field>,
    pub tagging: FieldTagging,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

/// A field of a record node.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub node: SchemaNode,
    /// The field may be absent from a record.
    pub optional: bool,
    /// Written when a value omits the field, filled in when an older writer
    /// did not know it.
    pub default: Option<Value>,
    /// Former names, used when resolving against older writers.
    pub aliases: Vec<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            optional: false,
            default: None,
            aliases: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// A value must carry this field: it is neither optional nor defaulted.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

/// One node of a schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Null,
    Bool,
    Int(IntType),
    Float(FloatWidth),
    Bytes,
    Str,
    Id,
    /// Any value, written in the tagged encoding.
    Any,
    Seq(Box<SchemaNode>),
    /// One of a fixed list of symbols; the value is the symbol string.
    Enum(Vec<String>),
    Record(RecordSchema),
}

impl SchemaNode {
    pub fn int(width: IntWidth, signed: bool) -> Self {
        SchemaNode::Int(IntType {
            width,
            signed,
            encoding: IntEncoding::Fixed,
        })
    }

    pub fn varint(width: IntWidth, signed: bool) -> Self {
        SchemaNode::Int(IntType {
            width,
            signed,
            encoding: IntEncoding::Varint,
        })
    }

    pub fn uint8() -> Self {
        Self::int(IntWidth::W8, false)
    }

    pub fn uint16() -> Self {
        Self::int(IntWidth::W16, false)
    }

    pub fn uint32() -> Self {
        Self::int(IntWidth::W32, false)
    }

    pub fn uint64() -> Self {
        Self::int(IntWidth::W64, false)
    }

    pub fn int8() -> Self {
        Self::int(IntWidth::W8, true)
    }

    pub fn int16() -> Self {
        Self::int(IntWidth::W16, true)
    }

    pub fn int32() -> Self {
        Self::int(IntWidth::W32, true)
    }

    pub fn int64() -> Self {
        Self::int(IntWidth::W64, true)
    }

    pub fn float32() -> Self {
        SchemaNode::Float(FloatWidth::F32)
    }

    pub fn float64() -> Self {
        SchemaNode::Float(FloatWidth::F64)
    }

    pub fn string() -> Self {
        SchemaNode::Str
    }

    pub fn bytes() -> Self {
        SchemaNode::Bytes
    }

    pub fn seq(item: SchemaNode) -> Self {
        SchemaNode::Seq(Box::new(item))
    }

    pub fn enumeration<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        SchemaNode::Enum(symbols.into_iter().map(Into::into).collect())
    }

    /// A positional record.
    pub fn record(fields: Vec<Field>) -> Self {
        SchemaNode::Record(RecordSchema {
            fields,
            tagging: FieldTagging::Positional,
        })
    }

    /// A record whose fields are tagged by name.
    pub fn named_record(fields: Vec<Field>) -> Self {
        SchemaNode::Record(RecordSchema {
            fields,
            tagging: FieldTagging::Named,
        })
    }

    /// Short type name used in diagnostics, e.g. `uint32` or
    /// `sequence<string>`.
    pub fn type_name(&self) -> String {
        match self {
            SchemaNode::Null => "null".into(),
            SchemaNode::Bool => "bool".into(),
            SchemaNode::Int(t) => t.to_string(),
            SchemaNode::Float(FloatWidth::F32) => "float32".into(),
            SchemaNode::Float(FloatWidth::F64) => "float64".into(),
            SchemaNode::Bytes => "bytes".into(),
            SchemaNode::Str => "string".into(),
            SchemaNode::Id => "id".into(),
            SchemaNode::Any => "any".into(),
            SchemaNode::Seq(item) => format!("sequence<{}>", item.type_name()),
            SchemaNode::Enum(symbols) => format!("enum{{{}}}", symbols.join(",")),
            SchemaNode::Record(_) => "record".into(),
        }
    }
}
