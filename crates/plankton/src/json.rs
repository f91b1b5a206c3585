//! Conversions between [`Value`] and `serde_json::Value`.
//!
//! JSON has no byte strings or identifiers, so bytes become a base64 data
//! URI and ids a 32-digit lowercase hex string. Non-finite floats become
//! `null`. A seed becomes `{"header": .., "fields": {..}}` and a struct an
//! array of `[tag, value]` pairs. Going back, every JSON string stays a string; a schema turns
//! data URIs and hex strings back into bytes and ids when it conforms the
//! value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::value::{Seed, Value};

/// Prefix of the data URI used for byte strings.
pub const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";

/// Decodes a byte string written by [`to_data_uri`]. `None` if `s` is not
/// such a URI.
pub fn parse_data_uri(s: &str) -> Option<Vec<u8>> {
    let b64 = s.strip_prefix(DATA_URI_PREFIX)?;
    STANDARD.decode(b64).ok()
}

pub fn to_data_uri(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes))
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => Value::Seq(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::json!(i),
            Value::UInt(u) => serde_json::json!(u),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bytes(b) => serde_json::Value::String(to_data_uri(&b)),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Id(id) => serde_json::Value::String(format!("{id:032x}")),
            Value::Seq(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(pairs) => object(pairs),
            Value::Seed(seed) => {
                let Seed { header, fields } = *seed;
                serde_json::json!({
                    "header": serde_json::Value::from(header),
                    "fields": object(fields),
                })
            }
            Value::Struct(fields) => serde_json::Value::Array(
                fields
                    .into_iter()
                    .map(|(tag, v)| serde_json::json!([tag, serde_json::Value::from(v)]))
                    .collect(),
            ),
        }
    }
}

fn object(pairs: Vec<(String, Value)>) -> serde_json::Value {
    serde_json::Value::Object(
        pairs
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::from(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_to_value() {
        let v = Value::from(json!({"a": [1, -2, 1.5, null, true], "b": "s"}));
        assert_eq!(
            v,
            Value::map([
                (
                    "a",
                    Value::Seq(vec![
                        Value::Int(1),
                        Value::Int(-2),
                        Value::Float(1.5),
                        Value::Null,
                        Value::Bool(true),
                    ])
                ),
                ("b", Value::from("s")),
            ])
        );
        assert!(matches!(Value::from(json!(u64::MAX)), Value::UInt(u64::MAX)));
    }

    #[test]
    fn value_to_json() {
        let v = Value::map([
            ("bytes", Value::Bytes(vec![1, 2, 3, 4])),
            ("id", Value::Id(0xff)),
            ("nan", Value::Float(f64::NAN)),
        ]);
        let j = serde_json::Value::from(v);
        assert_eq!(j["bytes"], json!("data:application/octet-stream;base64,AQIDBA=="));
        assert_eq!(j["id"], json!("000000000000000000000000000000ff"));
        assert_eq!(j["nan"], serde_json::Value::Null);
    }

    #[test]
    fn seeds_and_structs_to_json() {
        let seed = Value::seed(Value::from("point"), [("x", Value::Int(1))]);
        assert_eq!(
            serde_json::Value::from(seed),
            json!({"header": "point", "fields": {"x": 1}})
        );
        let st = Value::Struct(vec![(0, Value::Bool(true)), (4, Value::Null)]);
        assert_eq!(serde_json::Value::from(st), json!([[0, true], [4, null]]));
    }

    #[test]
    fn data_uri_roundtrip() {
        let uri = to_data_uri(b"\x00hello");
        assert_eq!(parse_data_uri(&uri).unwrap(), b"\x00hello");
        assert_eq!(parse_data_uri("hello"), None);
    }

    #[test]
    fn object_order_is_kept() {
        let v = Value::from(json!({"z": 1, "a": 2}));
        let keys: Vec<_> = v.as_map().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
