//! Schema consistency checks and value conformance.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::json::parse_data_uri;
use crate::schema::types::{RecordSchema, SchemaNode};
use crate::value::Value;

/// Checks a schema tree and canonicalizes its defaults in place.
///
/// Field names (and aliases) are unique within a record, enum symbols are
/// unique and non-empty, and every default conforms to its field's node.
/// An owned tree cannot contain cycles, so none are checked for.
pub fn validate(node: &mut SchemaNode) -> Result<()> {
    validate_node(node, "$")
}

fn validate_node(node: &mut SchemaNode, path: &str) -> Result<()> {
    match node {
        SchemaNode::Seq(item) => validate_node(item, &format!("{path}[]")),
        SchemaNode::Enum(symbols) => {
            if symbols.is_empty() {
                return Err(invalid(path, "enum has no symbols"));
            }
            let mut seen = HashSet::new();
            for symbol in symbols.iter() {
                if symbol.is_empty() {
                    return Err(invalid(path, "enum symbol is empty"));
                }
                if !seen.insert(symbol.as_str()) {
                    return Err(invalid(path, &format!("duplicate enum symbol {symbol:?}")));
                }
            }
            Ok(())
        }
        SchemaNode::Record(record) => validate_record(record, path),
        _ => Ok(()),
    }
}

fn validate_record(record: &mut RecordSchema, path: &str) -> Result<()> {
    let mut names = HashSet::new();
    for field in &record.fields {
        if field.name.is_empty() {
            return Err(invalid(path, "field name is empty"));
        }
        if !names.insert(field.name.clone()) {
            return Err(invalid(path, &format!("duplicate field {:?}", field.name)));
        }
    }
    let mut aliases = HashSet::new();
    for field in &record.fields {
        for alias in &field.aliases {
            if names.contains(alias) || !aliases.insert(alias.clone()) {
                return Err(invalid(
                    path,
                    &format!("alias {alias:?} of field {:?} is already taken", field.name),
                ));
            }
        }
    }
    for field in record.fields.iter_mut() {
        let field_path = format!("{path}.{}", field.name);
        validate_node(&mut field.node, &field_path)?;
        field.default = match field.default.take() {
            None => None,
            // `null` on an optional field just means "absent".
            Some(Value::Null) if field.optional && field.node != SchemaNode::Null => None,
            Some(default) => Some(conform(&field.node, &default, &field_path).map_err(|e| {
                invalid(&field_path, &format!("default does not fit: {e}"))
            })?),
        };
    }
    Ok(())
}

fn invalid(path: &str, reason: &str) -> Error {
    Error::InvalidSchema(format!("{path}: {reason}"))
}

/// Converts `value` into the canonical value for `node`.
///
/// Unsigned integers become `UInt` and signed ones `Int`; integers given for
/// float nodes become floats; strings given for `bytes` become bytes (a
/// base64 data URI is decoded, any other string taken as UTF-8) and
/// strings given for `id` are parsed as hex; record entries are reordered to
/// schema order with defaults filled in. Anything that cannot be converted
/// is a [`Error::SchemaMismatch`].
pub fn conform(node: &SchemaNode, value: &Value, path: &str) -> Result<Value> {
    let mismatch = || {
        Error::mismatch(
            path,
            format!("expected {}, found {}", node.type_name(), value.kind()),
        )
    };
    let out = match (node, value) {
        (SchemaNode::Null, Value::Null) => Value::Null,
        (SchemaNode::Bool, Value::Bool(b)) => Value::Bool(*b),
        (SchemaNode::Int(t), Value::Int(_) | Value::UInt(_)) => {
            let n = value.as_i128()?;
            if !t.contains(n) {
                return Err(Error::mismatch(path, format!("{n} is out of range for {t}")));
            }
            if t.signed {
                Value::Int(n as i64)
            } else {
                Value::UInt(n as u64)
            }
        }
        (SchemaNode::Float(width), Value::Float(_) | Value::Int(_) | Value::UInt(_)) => {
            Value::Float(width.exact(value).ok_or_else(|| {
                Error::mismatch(
                    path,
                    format!("{value:?} does not fit {} exactly", node.type_name()),
                )
            })?)
        }
        (SchemaNode::Bytes, Value::Bytes(b)) => Value::Bytes(b.clone()),
        (SchemaNode::Bytes, Value::Str(s)) => {
            Value::Bytes(parse_data_uri(s).unwrap_or_else(|| s.as_bytes().to_vec()))
        }
        (SchemaNode::Str, Value::Str(s)) => Value::Str(s.clone()),
        (SchemaNode::Id, Value::Id(id)) => Value::Id(*id),
        (SchemaNode::Id, Value::Str(s)) => {
            let hex: String = s.chars().filter(|c| *c != '-').collect();
            let id = u128::from_str_radix(&hex, 16)
                .map_err(|_| Error::mismatch(path, format!("{s:?} is not a hex id")))?;
            Value::Id(id)
        }
        (SchemaNode::Any, v) => v.clone(),
        (SchemaNode::Seq(item), Value::Seq(items)) => Value::Seq(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| conform(item, v, &format!("{path}[{i}]")))
                .collect::<Result<_>>()?,
        ),
        (SchemaNode::Enum(symbols), Value::Str(s)) => {
            if !symbols.contains(s) {
                return Err(Error::mismatch(path, format!("unknown enum symbol {s:?}")));
            }
            Value::Str(s.clone())
        }
        (SchemaNode::Record(record), Value::Map(pairs)) => conform_record(record, pairs, path)?,
        _ => return Err(mismatch()),
    };
    Ok(out)
}

fn conform_record(record: &RecordSchema, pairs: &[(String, Value)], path: &str) -> Result<Value> {
    let mut seen = HashSet::new();
    for (key, _) in pairs {
        if record.field(key).is_none() {
            return Err(Error::mismatch(path, format!("field {key:?} is not in the schema")));
        }
        if !seen.insert(key.as_str()) {
            return Err(Error::mismatch(path, format!("field {key:?} appears twice")));
        }
    }
    let mut out = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let field_path = format!("{path}.{}", field.name);
        match pairs.iter().find(|(k, _)| *k == field.name) {
            Some((_, Value::Null)) if field.optional && field.node != SchemaNode::Null => {}
            Some((_, v)) => out.push((field.name.clone(), conform(&field.node, v, &field_path)?)),
            None => match &field.default {
                Some(default) => out.push((field.name.clone(), default.clone())),
                None if field.optional => {}
                None => return Err(Error::mismatch(field_path, "required field is missing")),
            },
        }
    }
    Ok(Value::Map(out))
}
