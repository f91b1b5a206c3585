//! Declarative JSON description of a schema.
//!
//! ```json
//! {
//!   "version": 3,
//!   "root": {
//!     "type": "record",
//!     "fields": [
//!       { "name": "id", "type": "uint32" },
//!       { "name": "tags", "type": { "type": "sequence", "items": "string" },
//!         "default": [] },
//!       { "name": "nick", "type": "string", "optional": true, "aliases": ["alias"] }
//!     ]
//!   }
//! }
//! ```
//!
//! The `version` wrapper is optional; a bare type description is accepted
//! too. Primitive type names are `null`, `bool`, `float32`, `float64`,
//! `bytes`, `string`, `id`, `any` and the integer names understood by
//! [`IntType::parse`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::types::{
    Field, FieldTagging, FloatWidth, IntType, RecordSchema, SchemaNode,
};
use crate::schema::SchemaVersion;
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaDoc {
    Versioned {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
        root: TypeDef,
    },
    Bare(TypeDef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDef {
    Name(String),
    Complex(ComplexDef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplexDef {
    Sequence {
        items: Box<TypeDef>,
    },
    Enum {
        symbols: Vec<String>,
    },
    Record {
        fields: Vec<FieldDef>,
        #[serde(default)]
        tagging: FieldTagging,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDef,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl SchemaDoc {
    pub fn parse(json: &str) -> Result<SchemaDoc> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSchema(e.to_string()))
    }

    pub fn version(&self) -> Option<SchemaVersion> {
        match self {
            SchemaDoc::Versioned { version, .. } => version.map(SchemaVersion),
            SchemaDoc::Bare(_) => None,
        }
    }

    pub fn to_node(&self) -> Result<SchemaNode> {
        match self {
            SchemaDoc::Versioned { root, .. } | SchemaDoc::Bare(root) => root.to_node(),
        }
    }
}

impl TypeDef {
    pub fn to_node(&self) -> Result<SchemaNode> {
        match self {
            TypeDef::Name(name) => primitive(name),
            TypeDef::Complex(ComplexDef::Sequence { items }) => Ok(SchemaNode::seq(items.to_node()?)),
            TypeDef::Complex(ComplexDef::Enum { symbols }) => Ok(SchemaNode::Enum(symbols.clone())),
            TypeDef::Complex(ComplexDef::Record { fields, tagging }) => {
                let fields = fields
                    .iter()
                    .map(FieldDef::to_field)
                    .collect::<Result<Vec<_>>>()?;
                Ok(SchemaNode::Record(RecordSchema {
                    fields,
                    tagging: *tagging,
                }))
            }
        }
    }

    /// Describes `node`. Field defaults are rendered through the JSON
    /// bridge.
    pub fn from_node(node: &SchemaNode) -> TypeDef {
        match node {
            SchemaNode::Seq(item) => TypeDef::Complex(ComplexDef::Sequence {
                items: Box::new(TypeDef::from_node(item)),
            }),
            SchemaNode::Enum(symbols) => TypeDef::Complex(ComplexDef::Enum {
                symbols: symbols.clone(),
            }),
            SchemaNode::Record(record) => TypeDef::Complex(ComplexDef::Record {
                fields: record
                    .fields
                    .iter()
                    .map(|f| FieldDef {
                        name: f.name.clone(),
                        ty: TypeDef::from_node(&f.node),
                        optional: f.optional,
                        default: f.default.clone().map(serde_json::Value::from),
                        aliases: f.aliases.clone(),
                    })
                    .collect(),
                tagging: record.tagging,
            }),
            other => TypeDef::Name(other.type_name()),
        }
    }
}

impl FieldDef {
    fn to_field(&self) -> Result<Field> {
        Ok(Field {
            name: self.name.clone(),
            node: self.ty.to_node()?,
            optional: self.optional,
            default: self.default.clone().map(Value::from),
            aliases: self.aliases.clone(),
        })
    }
}

fn primitive(name: &str) -> Result<SchemaNode> {
    let node = match name {
        "null" => SchemaNode::Null,
        "bool" | "boolean" => SchemaNode::Bool,
        "float32" => SchemaNode::Float(FloatWidth::F32),
        "float64" => SchemaNode::Float(FloatWidth::F64),
        "bytes" => SchemaNode::Bytes,
        "string" => SchemaNode::Str,
        "id" => SchemaNode::Id,
        "any" => SchemaNode::Any,
        other => match IntType::parse(other) {
            Some(t) => SchemaNode::Int(t),
            None => return Err(Error::InvalidSchema(format!("unknown type {other:?}"))),
        },
    };
    Ok(node)
}
