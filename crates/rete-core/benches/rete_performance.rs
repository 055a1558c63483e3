use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rete_core::engine::InferenceEngine;
use rete_core::types::{Condition, Field};
use rete_types::WmeValue;

fn var(name: &str) -> Field {
    Field::Variable(name.to_string())
}

fn sym(name: &str) -> Field {
    Field::Constant(WmeValue::Symbol(name.to_string()))
}

fn build_engine_with_rule() -> InferenceEngine {
    let mut engine = InferenceEngine::new();
    engine
        .add_production(
            "check-age",
            vec![
                Condition::new(var("?p"), sym("name"), var("?n")),
                Condition::new(var("?p"), sym("age"), var("?a")),
            ],
            vec![Box::new(|_, _| Ok(()))],
        )
        .unwrap();
    engine
}

fn bench_single_assertion(c: &mut Criterion) {
    c.bench_function("add_wme_single", |b| {
        b.iter(|| {
            let mut engine = build_engine_with_rule();
            black_box(engine.add_wme("person1", "name", "Alice"));
        });
    });
}

fn bench_bulk_assertion_and_run(c: &mut Criterion) {
    c.bench_function("assert_1000_facts_and_run", |b| {
        b.iter(|| {
            let mut engine = build_engine_with_rule();
            for i in 0..1000i64 {
                let person = format!("person{i}");
                engine.add_wme(person.clone(), "name", "Alice");
                engine.add_wme(person, "age", 25i64);
            }
            black_box(engine.run(None).unwrap());
        });
    });
}

criterion_group!(benches, bench_single_assertion, bench_bulk_assertion_and_run);
criterion_main!(benches);
