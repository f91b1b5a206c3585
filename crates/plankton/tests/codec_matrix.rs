use plankton::schema::conform;
use plankton::{decode, encode, CodecOptions, Decoder, Error, Schema, Value};

fn decode_hex(s: &str) -> Vec<u8> {
    let s: String = s.split_whitespace().collect();
    assert!(s.len() % 2 == 0, "hex string must have even length");
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).expect("invalid hex"))
        .collect()
}

fn conform_json(schema: &Schema, json: &str) -> plankton::Result<Value> {
    let value = Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap());
    conform(schema.root(), &value, "$")
}

fn schema(json: &str) -> Schema {
    Schema::from_json(json).unwrap_or_else(|e| panic!("bad schema {json}: {e}"))
}

#[test]
fn payload_matrix_matches_expected_bytes_and_roundtrips() {
    let cases: &[(&str, &str, &str)] = &[
        (r#""null""#, "null", ""),
        (r#""bool""#, "true", "01"),
        (r#""uint8""#, "200", "c8"),
        (r#""int16""#, "-2", "fe ff"),
        (r#""uint32""#, "1", "01 00 00 00"),
        (r#""varuint64""#, "300", "ac 01"),
        (r#""varint32""#, "-3", "05"),
        (r#""float32""#, "1.5", "00 00 c0 3f"),
        (r#""string""#, r#""hé""#, "03 68 c3 a9"),
        (
            r#""bytes""#,
            r#""data:application/octet-stream;base64,AAE=""#,
            "02 00 01",
        ),
        (
            r#""id""#,
            r#""000102030405060708090a0b0c0d0e0f""#,
            "0f 0e 0d 0c 0b 0a 09 08 07 06 05 04 03 02 01 00",
        ),
        (r#""any""#, r#"[1, "a", null]"#, "23 01 51 61 10"),
        (
            r#"{"type": "sequence", "items": "uint8"}"#,
            "[1, 2]",
            "02 01 02",
        ),
        (
            r#"{"type": "enum", "symbols": ["red", "green"]}"#,
            r#""green""#,
            "01",
        ),
        (
            r#"{"type": "record", "fields": [
                {"name": "a", "type": "uint8"},
                {"name": "b", "type": "string", "optional": true}
            ]}"#,
            r#"{"a": 7}"#,
            "01 00 07",
        ),
        (
            r#"{"type": "record", "tagging": "named", "fields": [
                {"name": "ok", "type": "bool"}
            ]}"#,
            r#"{"ok": false}"#,
            "01 02 6f 6b 00",
        ),
    ];

    for (schema_json, value_json, hex) in cases {
        let s = schema(schema_json);
        let value = conform_json(&s, value_json)
            .unwrap_or_else(|e| panic!("conform failed for {schema_json} / {value_json}: {e}"));
        let bytes = encode(&value, &s)
            .unwrap_or_else(|e| panic!("encode failed for {schema_json} / {value_json}: {e}"));
        assert_eq!(bytes, decode_hex(hex), "payload mismatch for {schema_json} / {value_json}");

        let back = decode(&bytes, &s)
            .unwrap_or_else(|e| panic!("decode failed for {schema_json} / {value_json}: {e}"));
        let expected: serde_json::Value = serde_json::from_str(value_json).unwrap();
        assert_eq!(
            serde_json::Value::from(back),
            expected,
            "roundtrip mismatch for {schema_json}"
        );
    }
}

fn error_class(e: &Error) -> &'static str {
    match e {
        Error::TruncatedInput { .. } => "truncated",
        Error::UnknownTag { .. } => "unknown_tag",
        Error::InvalidUtf8 { .. } => "utf8",
        Error::MalformedVarint { .. } => "varint",
        Error::TrailingBytes { .. } => "trailing",
        Error::LimitExceeded { .. } => "limit",
        Error::SchemaMismatch { .. } => "mismatch",
        _ => "other",
    }
}

#[test]
fn malformed_payload_matrix() {
    let record = r#"{"type": "record", "fields": [{"name": "a", "type": "uint8"}]}"#;
    let cases: &[(&str, &str, &str)] = &[
        (r#""uint32""#, "01 02", "truncated"),
        (r#""bool""#, "02", "unknown_tag"),
        (r#""string""#, "02 ff fe", "utf8"),
        (r#""string""#, "05 61", "truncated"),
        (r#""varuint8""#, "ff 01", "varint"),
        (r#""uint8""#, "01 01", "trailing"),
        (r#"{"type": "enum", "symbols": ["a", "b"]}"#, "05", "unknown_tag"),
        (r#"{"type": "sequence", "items": "uint8"}"#, "ff ff ff ff 0f", "limit"),
        (r#"{"type": "sequence", "items": "uint32"}"#, "03 00 00 00 00", "truncated"),
        (record, "00", "mismatch"),
        (record, "01 03 00", "unknown_tag"),
        (record, "02 00 01 00 01", "mismatch"),
    ];

    for (schema_json, hex, expected) in cases {
        let s = schema(schema_json);
        let err = decode(&decode_hex(hex), &s)
            .expect_err(&format!("decode must fail for {schema_json} / {hex}"));
        assert_eq!(
            error_class(&err),
            *expected,
            "unexpected error for {schema_json} / {hex}: {err:?}"
        );
    }
}

#[test]
fn malformed_errors_carry_offsets() {
    assert!(matches!(
        decode(&[0x02], &schema(r#""bool""#)),
        Err(Error::UnknownTag { tag: 2, offset: 0 })
    ));
    assert!(matches!(
        decode(&[0x02, 0xff, 0xfe], &schema(r#""string""#)),
        Err(Error::InvalidUtf8 { offset: 1 })
    ));
    assert!(matches!(
        decode(&[0x01, 0x01], &schema(r#""uint8""#)),
        Err(Error::TrailingBytes { remaining: 1 })
    ));
}

#[test]
fn decoder_limits_come_from_options() {
    let s = schema(r#"{"type": "sequence", "items": "bool"}"#);
    let bytes = encode(&conform_json(&s, "[true, false, true]").unwrap(), &s).unwrap();
    let strict = Decoder::with_options(CodecOptions {
        max_collection_len: 2,
        ..CodecOptions::default()
    });
    assert!(matches!(
        strict.decode(&bytes, &s),
        Err(Error::LimitExceeded { limit: 2, .. })
    ));
    assert!(Decoder::new().decode(&bytes, &s).is_ok());
}

#[test]
fn encode_rejects_values_outside_the_schema() {
    let s = schema(r#"{"type": "record", "fields": [{"name": "n", "type": "int8"}]}"#);
    assert!(matches!(
        conform_json(&s, r#"{"n": 128}"#),
        Err(Error::SchemaMismatch { path, .. }) if path == "$.n"
    ));
    assert!(matches!(
        conform_json(&s, r#"{"n": 1, "extra": true}"#),
        Err(Error::SchemaMismatch { .. })
    ));
    assert!(conform_json(&s, r#"{"n": -128}"#).is_ok());
}

#[test]
fn user_record_has_deterministic_bytes() {
    let s = schema(
        r#"{"type": "record", "fields": [
            {"name": "id", "type": "uint32"},
            {"name": "name", "type": "string"},
            {"name": "tags", "type": {"type": "sequence", "items": "string"}}
        ]}"#,
    );
    let value = conform_json(&s, r#"{"id": 7, "name": "x", "tags": ["a", "b"]}"#).unwrap();
    let bytes = encode(&value, &s).unwrap();
    assert_eq!(
        bytes,
        decode_hex("03 00 07000000 01 01 78 02 02 01 61 01 62")
    );
    assert_eq!(encode(&value, &s).unwrap(), bytes);
    assert_eq!(decode(&bytes, &s).unwrap(), value);
}
