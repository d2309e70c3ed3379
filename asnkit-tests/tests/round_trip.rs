use asnkit_schema::{
    constraints::ConstraintKind, validator::Validate, ChoiceValue, Node, Record, Tag, Value,
};
use asnkit_tests::report;
use asnkit_transcoder::{
    ber::{Ber, BerOptions},
    der::Der,
    per::{Per, PerOptions},
    CodecErrorType, Decoder, Encoder,
};
use bitvec::{bitvec, prelude::Msb0};
use num::BigInt;

fn codecs() -> Vec<(&'static str, Box<dyn Codec>)> {
    vec![
        ("der", Box::new(Der::new())),
        ("ber", Box::new(Ber::new())),
        (
            "ber+defaults",
            Box::new(Ber::with_options(BerOptions {
                encode_defaults: true,
            })),
        ),
        ("aper", Box::new(Per::new())),
        ("uper", Box::new(Per::with_options(PerOptions { aligned: false }))),
    ]
}

trait Codec: Encoder + Decoder {}
impl<C: Encoder + Decoder> Codec for C {}

fn round_trips(value: Value, node: &Node) {
    for (name, mut codec) in codecs() {
        let encoded = codec
            .encode(&value, node)
            .unwrap_or_else(|e| panic!("{name} failed to encode {value:?}: {e}"));
        let decoded = codec
            .decode(&encoded, node)
            .unwrap_or_else(|e| panic!("{name} failed to decode {encoded:02X?}: {e}"));
        assert_eq!(decoded, value, "{name} changed the value, wire {encoded:02X?}");
    }
}

#[test]
fn round_trips_integer_boundaries() {
    for number in [
        0,
        -128,
        127,
        -129,
        128,
        -32868,
        32868,
        -8388608,
        8388608,
        i64::MIN,
        i64::MAX,
    ] {
        round_trips(number.into(), &Node::integer());
    }
    for text in [
        "9223372036854775808",
        "-9223372036854775809",
        "123456789012345678901234567890123456789",
        "-340282366920938463463374607431768211456",
    ] {
        round_trips(
            Value::from(text.parse::<BigInt>().unwrap()),
            &Node::integer(),
        );
    }
}

#[test]
fn round_trips_real_special_values() {
    for real in [
        0.0,
        -0.0,
        f64::INFINITY,
        f64::NEG_INFINITY,
        243564365.5346346324345,
        -1.0e-300,
        f64::MIN_POSITIVE / 8.0,
        f64::MAX,
    ] {
        round_trips(Value::Real(real), &Node::real());
    }
    for (name, mut codec) in codecs() {
        let encoded = codec.encode(&Value::Real(-0.0), &Node::real()).unwrap();
        let Value::Real(decoded) = codec.decode(&encoded, &Node::real()).unwrap() else {
            panic!("{name} decoded REAL to another kind");
        };
        assert!(decoded == 0.0 && decoded.is_sign_negative(), "{name}");
        let encoded = codec.encode(&Value::Real(f64::NAN), &Node::real()).unwrap();
        let Value::Real(decoded) = codec.decode(&encoded, &Node::real()).unwrap() else {
            panic!("{name} decoded REAL to another kind");
        };
        assert!(decoded.is_nan(), "{name}");
    }
}

#[test]
fn round_trips_every_string_kind() {
    let cases = [
        (Node::utf8_string(), "Grüße, 世界"),
        (Node::numeric_string(), "0123 456"),
        (Node::printable_string(), "Some-State (AU)"),
        (Node::visible_string(), "~visible~"),
        (Node::ia5_string(), "tab\there"),
        (Node::utc_time(), "180710053854Z"),
        (Node::generalized_time(), "20180710053854.5Z"),
        (Node::object_descriptor(), "descriptor"),
        (Node::bmp_string(), "Ωmega"),
        (Node::graphic_string(), "graphic"),
        (Node::general_string(), "general"),
    ];
    for (node, text) in cases {
        round_trips(text.into(), &node);
    }
    for node in [
        Node::teletex_string(),
        Node::videotex_string(),
        Node::universal_string(),
    ] {
        assert_eq!(
            Der::new().encode(&"x".into(), &node).unwrap_err().kind,
            CodecErrorType::UnsupportedEncoding
        );
        assert_eq!(
            Per::new().encode(&"x".into(), &node).unwrap_err().kind,
            CodecErrorType::UnsupportedEncoding
        );
    }
}

#[test]
fn round_trips_a_nested_message() {
    let node = report().unwrap();
    node.validate().unwrap();
    let readings = Value::List(vec![
        Value::record([("sensor", "t0".into()), ("value", Value::Real(21.5))]),
        Value::record([("sensor", "t1".into()), ("value", Value::Real(-4.25))]),
    ]);
    let minimal = Value::record([
        ("id", 7.into()),
        ("kind", Value::Enumerated(1)),
        ("readings", readings.clone()),
        ("payload", Value::OctetString(Vec::new())),
        ("origin", Value::choice("host", "example.org".into())),
    ]);
    round_trips(minimal, &node);
    let full = Value::record([
        ("id", 65535.into()),
        ("kind", Value::Enumerated(2)),
        ("source", Value::oid("1.3.6.1.4.1.99999")),
        ("readings", readings),
        ("flags", bitvec![u8, Msb0; 1, 0, 1].into()),
        ("payload", vec![1u8, 2, 3].into()),
        ("origin", Value::choice("name", "sensor-7".into())),
        ("note", "extension".into()),
        ("priority", (-3).into()),
    ]);
    round_trips(full, &node);
}

#[test]
fn distinguishes_extension_selections() {
    let node = Node::choice_ext(
        [("small", Node::integer().implicit(0))],
        [("large", Node::integer().implicit(1))],
    );
    for (name, mut codec) in codecs() {
        let root = codec.encode(&Value::choice("small", 5.into()), &node).unwrap();
        let extension = codec.encode(&Value::choice("large", 5.into()), &node).unwrap();
        assert_ne!(root, extension, "{name}");
        assert_eq!(
            codec.decode(&extension, &node).unwrap(),
            Value::choice("large", 5.into()),
            "{name}"
        );
    }
    let colours = Node::enumerated_ext(&[("red", 0), ("green", 1)], &[("blue", 2)]);
    round_trips(Value::Enumerated(0), &colours);
    round_trips(Value::Enumerated(2), &colours);
}

#[test]
fn keeps_der_set_encodings_canonical() {
    let node = Node::set([
        ("c", Node::boolean().implicit(2)),
        ("a", Node::integer().implicit(0)),
        ("b", Node::octet_string().implicit(1)),
    ]);
    let expected = vec![
        0x31, 0x0A, 0x80, 0x01, 0x05, 0x81, 0x02, 0xAB, 0xCD, 0x82, 0x01, 0xFF,
    ];
    let members = [
        ("a", Value::from(5)),
        ("b", vec![0xABu8, 0xCD].into()),
        ("c", true.into()),
    ];
    for order in [[0, 1, 2], [2, 1, 0], [1, 2, 0]] {
        let mut record = Record::new();
        for i in order {
            record.insert(members[i].0, members[i].1.clone());
        }
        assert_eq!(
            Der::new().encode(&Value::Record(record), &node).unwrap(),
            expected
        );
    }
    round_trips(Value::record(members), &node);
}

#[test]
fn packs_constrained_integers() {
    let fixed = Node::integer()
        .constrained(ConstraintKind::Fixed, 12, 128)
        .unwrap();
    assert_eq!(Per::new().encode(&20.into(), &fixed).unwrap(), vec![0x10]);
    let extendable = Node::integer()
        .constrained(ConstraintKind::Extendable, 12, 128)
        .unwrap();
    assert_eq!(
        Per::new().encode(&2.into(), &extendable).unwrap(),
        vec![0x80, 0x01, 0x02]
    );
    round_trips(2.into(), &extendable);
    round_trips(128.into(), &extendable);
}

#[test]
fn preserves_unknown_extensions_across_versions() {
    let no_extensions: [(&str, Node); 0] = [];
    let older = Node::sequence_ext([("id", Node::integer().implicit(0))], no_extensions);
    let newer = Node::sequence_ext(
        [("id", Node::integer().implicit(0))],
        [("tag", Node::utf8_string().implicit(1))],
    );
    let value = Value::record([("id", 1.into()), ("tag", "new".into())]);
    for (name, mut codec) in codecs() {
        let encoded = codec.encode(&value, &newer).unwrap();
        let decoded = codec.decode(&encoded, &older).unwrap();
        let record = decoded.as_record().unwrap();
        assert_eq!(record.get("id"), Some(&1.into()), "{name}");
        assert_eq!(record.unknown_extensions.len(), 1, "{name}");
        assert_eq!(codec.encode(&decoded, &older).unwrap(), encoded, "{name}");
    }
    let choice = Node::choice_ext(
        [("id", Node::integer().implicit(0))],
        [("x", Node::null().implicit(3))],
    );
    let unresolved = Der::new().decode(&[0x81, 0x01, 0x07], &choice).unwrap();
    assert_eq!(
        unresolved,
        Value::Choice(ChoiceValue::Unresolved {
            tag: Tag::context(1),
            payload: vec![0x81, 0x01, 0x07],
        })
    );
    assert_eq!(
        Der::new().encode(&unresolved, &choice).unwrap(),
        vec![0x81, 0x01, 0x07]
    );
}
