use plankton::{
    decode, decode_tagged, decode_text, encode, encode_tagged, encode_text, Error, Field,
    Resolver, Schema, SchemaNode, StreamOptions, StreamReader, StreamWriter, TaggedEncoder, Value,
};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

fn any_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::UInt),
        (-1e9f64..1e9f64).prop_map(Value::Float),
        ".{0,12}".prop_map(Value::Str),
        vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        any::<u128>().prop_map(Value::Id),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..6).prop_map(Value::Seq),
            btree_map("[a-z]{0,6}", inner.clone(), 0..6)
                .prop_map(|m| Value::Map(m.into_iter().collect())),
            (inner.clone(), btree_map("[a-z]{0,6}", inner.clone(), 0..4))
                .prop_map(|(header, m)| Value::seed(header, m)),
            btree_map(0u64..40, inner, 0..6)
                .prop_map(|m| Value::Struct(m.into_iter().collect())),
        ]
    })
}

fn text_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        ".{0,12}".prop_map(Value::Str),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..6).prop_map(Value::Seq),
            btree_map("[a-z\"\\\\]{0,6}", inner, 0..6)
                .prop_map(|m| Value::Map(m.into_iter().collect())),
        ]
    })
}

fn event_schema() -> Schema {
    Schema::new(SchemaNode::record(vec![
        Field::new("id", SchemaNode::uint32()),
        Field::new("delta", SchemaNode::int16()),
        Field::new("big", SchemaNode::varint(plankton::IntWidth::W64, true)),
        Field::new("note", SchemaNode::string()).optional(),
        Field::new("samples", SchemaNode::seq(SchemaNode::float64())),
        Field::new("kind", SchemaNode::enumeration(["open", "close", "error"])),
        Field::new("trace", SchemaNode::Id),
        Field::new("extra", SchemaNode::Any),
    ]))
    .unwrap()
}

fn any_event() -> impl Strategy<Value = Value> {
    (
        any::<u32>(),
        any::<i16>(),
        any::<i64>(),
        proptest::option::of("[ -~]{0,20}"),
        vec(-1e12f64..1e12f64, 0..8),
        prop_oneof![Just("open"), Just("close"), Just("error")],
        any::<u128>(),
        any_value(),
    )
        .prop_map(|(id, delta, big, note, samples, kind, trace, extra)| {
            let mut pairs = vec![
                ("id".to_string(), Value::UInt(id as u64)),
                ("delta".to_string(), Value::Int(delta as i64)),
                ("big".to_string(), Value::Int(big)),
                (
                    "samples".to_string(),
                    Value::Seq(samples.into_iter().map(Value::Float).collect()),
                ),
                ("kind".to_string(), Value::from(kind)),
                ("trace".to_string(), Value::Id(trace)),
                ("extra".to_string(), extra),
            ];
            if let Some(note) = note {
                pairs.push(("note".to_string(), Value::Str(note)));
            }
            Value::Map(pairs)
        })
}

proptest! {
    #[test]
    fn tagged_roundtrip(value in any_value()) {
        let bytes = encode_tagged(&value).unwrap();
        prop_assert_eq!(decode_tagged(&bytes).unwrap(), value);
    }

    #[test]
    fn shared_repeats_decode_to_the_same_value(value in any_value()) {
        let doubled = Value::Seq(vec![value.clone(), value.clone(), Value::Seq(vec![value])]);
        let bytes = TaggedEncoder::new().sharing_repeats().encode(&doubled).unwrap();
        prop_assert_eq!(decode_tagged(&bytes).unwrap(), doubled);
    }

    #[test]
    fn text_roundtrip(value in text_value()) {
        let text = encode_text(&value).unwrap();
        prop_assert_eq!(decode_text(&text).unwrap(), value);
    }

    #[test]
    fn tagged_truncation_never_decodes(value in any_value(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_tagged(&value).unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(decode_tagged(&bytes[..cut]).is_err());
    }

    #[test]
    fn schema_roundtrip(event in any_event()) {
        let schema = event_schema();
        let bytes = encode(&event, &schema).unwrap();
        prop_assert_eq!(decode(&bytes, &schema).unwrap(), event);
    }

    #[test]
    fn schema_truncation_never_decodes(event in any_event(), cut in any::<prop::sample::Index>()) {
        let schema = event_schema();
        let bytes = encode(&event, &schema).unwrap();
        let cut = cut.index(bytes.len());
        let result = decode(&bytes[..cut], &schema);
        prop_assert!(
            matches!(result, Err(Error::TruncatedInput { .. })),
            "cut at {} of {}: {:?}", cut, bytes.len(), result
        );
    }

    #[test]
    fn garbage_never_panics(bytes in vec(any::<u8>(), 0..64)) {
        let _ = decode_tagged(&bytes);
        let _ = decode(&bytes, &event_schema());
    }

    #[test]
    fn widening_preserves_numbers(a in any::<u16>(), b in any::<i8>()) {
        let writer = Schema::with_version(
            SchemaNode::record(vec![
                Field::new("a", SchemaNode::uint16()),
                Field::new("b", SchemaNode::int8()),
            ]),
            1,
        )
        .unwrap();
        let reader = Schema::with_version(
            SchemaNode::record(vec![
                Field::new("a", SchemaNode::int64()),
                Field::new("b", SchemaNode::float64()),
            ]),
            2,
        )
        .unwrap();
        let bytes = encode(
            &Value::map([("a", Value::UInt(a as u64)), ("b", Value::Int(b as i64))]),
            &writer,
        )
        .unwrap();
        let plan = Resolver::new().resolve(&writer, &reader).unwrap();
        prop_assert_eq!(
            plan.decode(&bytes).unwrap(),
            Value::map([("a", Value::Int(a as i64)), ("b", Value::Float(b as f64))])
        );
    }

    #[test]
    fn float32_values_roundtrip_exactly(f in any::<f32>().prop_filter("nan", |f| !f.is_nan())) {
        let schema = Schema::new(SchemaNode::float32()).unwrap();
        let value = Value::Float(f as f64);
        let bytes = encode(&value, &schema).unwrap();
        prop_assert_eq!(decode(&bytes, &schema).unwrap(), value);
    }

    #[test]
    fn floats_that_do_not_fit_are_refused(f in any::<f64>().prop_filter("nan", |f| !f.is_nan())) {
        let schema = Schema::new(SchemaNode::float32()).unwrap();
        let value = Value::Float(f);
        match encode(&value, &schema) {
            Ok(bytes) => prop_assert_eq!(decode(&bytes, &schema).unwrap(), value),
            Err(err) => {
                prop_assert!(f.is_finite() && (f as f32) as f64 != f);
                prop_assert!(matches!(err, Error::SchemaMismatch { .. }), "{:?}", err);
            }
        }
    }

    #[test]
    fn large_ints_into_float64_are_exact_or_refused(n in any::<i64>()) {
        let schema = Schema::new(SchemaNode::float64()).unwrap();
        match encode(&Value::Int(n), &schema) {
            Ok(bytes) => prop_assert_eq!(decode(&bytes, &schema).unwrap(), Value::Float(n as f64)),
            Err(err) => {
                prop_assert!((n as f64) as i128 != n as i128);
                prop_assert!(matches!(err, Error::SchemaMismatch { .. }), "{:?}", err);
            }
        }
    }

    #[test]
    fn any_payload_bit_flip_is_detected(event in any_event(), bit in any::<prop::sample::Index>()) {
        let schema = event_schema();
        let mut writer = StreamWriter::new(Vec::new(), &schema, StreamOptions::default()).unwrap();
        let header_len = writer.get_ref().len();
        writer.write_record(&event, &schema).unwrap();
        let mut bytes = writer.finish().unwrap();

        let payload_len = encode(&event, &schema).unwrap().len();
        let payload_start = bytes.len() - 4 - payload_len;
        prop_assert!(payload_start > header_len);
        let bit = bit.index(payload_len * 8);
        bytes[payload_start + bit / 8] ^= 1 << (bit % 8);

        let mut reader = StreamReader::open(bytes.as_slice(), StreamOptions::default()).unwrap();
        let result = reader.read_record();
        prop_assert!(
            matches!(result, Err(Error::ChecksumMismatch { .. })),
            "{:?}", result
        );
    }
}
