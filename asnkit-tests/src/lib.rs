//! Schemas shared by the integration tests.
//!
//! `certificate` follows the X.509 v3 certificate structure of RFC 5280.
//! Attribute values and algorithm parameters are left open as ANY.
use asnkit_schema::{constraints::ConstraintKind, Node, SchemaError, Value};

pub fn algorithm_identifier() -> Node {
    Node::sequence([
        ("algorithm", Node::object_identifier()),
        ("parameters", Node::any().optional()),
    ])
}

pub fn name() -> Node {
    let attribute = Node::sequence([
        ("type", Node::object_identifier()),
        ("value", Node::any()),
    ]);
    Node::choice([("rdnSequence", Node::sequence_of(Node::set_of(attribute)))])
}

pub fn time() -> Node {
    Node::choice([
        ("utcTime", Node::utc_time()),
        ("generalTime", Node::generalized_time()),
    ])
}

pub fn extension() -> Node {
    Node::sequence([
        ("extnID", Node::object_identifier()),
        ("critical", Node::boolean().with_default(false.into())),
        ("extnValue", Node::octet_string()),
    ])
}

pub fn tbs_certificate() -> Node {
    Node::sequence([
        ("version", Node::integer().with_default(0.into()).explicit(0)),
        ("serialNumber", Node::integer()),
        ("signature", algorithm_identifier()),
        ("issuer", name()),
        (
            "validity",
            Node::sequence([("notBefore", time()), ("notAfter", time())]),
        ),
        ("subject", name()),
        (
            "subjectPublicKeyInfo",
            Node::sequence([
                ("algorithm", algorithm_identifier()),
                ("subjectPublicKey", Node::bit_string()),
            ]),
        ),
        ("issuerUniqueID", Node::bit_string().implicit(1).optional()),
        ("subjectUniqueID", Node::bit_string().implicit(2).optional()),
        (
            "extensions",
            Node::sequence_of(extension()).explicit(3).optional(),
        ),
    ])
}

pub fn certificate() -> Node {
    Node::sequence([
        ("tbsCertificate", tbs_certificate()),
        ("signatureAlgorithm", algorithm_identifier()),
        ("signatureValue", Node::bit_string()),
    ])
}

/// An extensible message touching most kinds, for cross-codec round trips.
pub fn report() -> Result<Node, SchemaError> {
    let reading = Node::sequence([
        ("sensor", Node::visible_string()),
        ("value", Node::real()),
    ]);
    let kind = Node::enumerated_ext(&[("periodic", 0), ("alarm", 1)], &[("test", 2)]);
    let flags = Node::named_bit_string(&[("urgent", 0), ("retained", 2)]);
    let origin = Node::choice_ext(
        [
            ("host", Node::ia5_string()),
            ("address", Node::octet_string()),
        ],
        [("name", Node::utf8_string())],
    );
    Ok(Node::sequence_ext(
        [
            (
                "id",
                Node::integer()
                    .constrained(ConstraintKind::Fixed, 0, 65535)?
                    .implicit(0),
            ),
            ("kind", kind.implicit(1)),
            ("source", Node::object_identifier().implicit(2).optional()),
            ("readings", Node::sequence_of(reading).implicit(3)),
            ("flags", flags.implicit(4).optional()),
            (
                "payload",
                Node::octet_string()
                    .implicit(5)
                    .with_default(Value::OctetString(Vec::new())),
            ),
            ("origin", origin.explicit(6)),
        ],
        [
            ("note", Node::utf8_string().implicit(7)),
            ("priority", Node::integer().implicit(8).optional()),
        ],
    ))
}
