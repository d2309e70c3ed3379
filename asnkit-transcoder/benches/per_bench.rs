use asnkit_schema::{constraints::ConstraintKind, Node, Value};
use asnkit_transcoder::{
    per::{Per, PerOptions},
    Decoder, Encoder,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn test_sequence() -> Node {
    Node::sequence_ext(
        [
            (
                "item-code",
                Node::integer()
                    .constrained(ConstraintKind::Fixed, 0, 254)
                    .unwrap(),
            ),
            (
                "item-name",
                Node::ia5_string()
                    .constrained(ConstraintKind::Fixed, 3, 10)
                    .unwrap()
                    .optional(),
            ),
        ],
        [(
            "urgency",
            Node::enumerated(&[("normal", 0), ("high", 1)]).with_default(Value::Enumerated(0)),
        )],
    )
}

fn small_sequence(c: &mut Criterion) {
    let node = test_sequence();
    let value = Value::record([
        ("item-code", 27.into()),
        ("item-name", "SHERRY".into()),
        ("urgency", Value::Enumerated(1)),
    ]);
    for (variant, options) in [
        ("aligned", PerOptions { aligned: true }),
        ("unaligned", PerOptions { aligned: false }),
    ] {
        let mut per = Per::with_options(options);
        let input = per.encode(&value, &node).unwrap();
        c.bench_with_input(
            BenchmarkId::new("Decode Test Sequence", variant),
            &input,
            |b, i| b.iter(|| per.decode(i, &node).unwrap()),
        );
        c.bench_with_input(
            BenchmarkId::new("Encode Test Sequence", variant),
            &value,
            |b, v| b.iter(|| per.encode(v, &node).unwrap()),
        );
    }
}

criterion_group!(benches, small_sequence);
criterion_main!(benches);
