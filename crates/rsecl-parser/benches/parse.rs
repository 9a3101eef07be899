//! Parser benchmarks for rsecl-parser.
//!
//! Measures expression parsing at various sizes and policy loading throughput.


use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rsecl_parser::{parse_expression, parse_policy_yaml};

// ---------------------------------------------------------------------------
// Benchmark: parse a single expression
// ---------------------------------------------------------------------------

fn bench_parse_single_expression(c: &mut Criterion) {
    let expr = r#"exec.file.name in ["nc", "ncat", ~"netcat*"] && process.uid == 0 && any(process.ancestors.file.name == "nginx")"#;

    c.bench_function("parse_single_expression", |b| {
        b.iter(|| {
            let result = parse_expression(black_box(expr)).unwrap();
            black_box(result);
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark: expression size scaling
// ---------------------------------------------------------------------------

fn bench_parse_expression_terms(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_expression_terms");
    let mut rng = datagen::rng();

    for terms in [1, 4, 16, 64] {
        let expr = datagen::gen_expression(&mut rng, terms);

        group.bench_with_input(BenchmarkId::new("terms", terms), &expr, |b, expr| {
            b.iter(|| {
                let result = parse_expression(black_box(expr)).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: policy documents (YAML + every expression)
// ---------------------------------------------------------------------------

fn bench_parse_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_policy");

    for n in [10, 100, 1000] {
        let yaml = datagen::gen_policy(n);
        group.throughput(criterion::Throughput::Bytes(yaml.len() as u64));

        group.bench_with_input(BenchmarkId::new("rules", n), &yaml, |b, yaml| {
            b.iter(|| {
                let policy = parse_policy_yaml("bench", black_box(yaml)).unwrap();
                for rule in &policy.rules {
                    black_box(parse_expression(rule.source().unwrap()).unwrap());
                }
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion harness
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_parse_single_expression,
    bench_parse_expression_terms,
    bench_parse_policy,
);
criterion_main!(benches);
