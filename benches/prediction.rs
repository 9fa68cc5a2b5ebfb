//! Benchmarks for prediction latency

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use transit_demand::data::synthetic::{self, SyntheticConfig};
use transit_demand::data::DatasetBuilder;
use transit_demand::features::{canonicalize, FieldValue, RawContext};
use transit_demand::models::ForestConfig;
use transit_demand::predictor::predict_with;
use transit_demand::trainer::{Trainer, TrainingConfig};

fn benchmark_prediction(c: &mut Criterion) {
    let records: Vec<_> = synthetic::generate(&SyntheticConfig {
        num_days: 14,
        ..Default::default()
    })
    .unwrap()
    .iter()
    .map(|row| row.to_record())
    .collect();
    let dataset = DatasetBuilder::new().build(&records).unwrap();

    let ctx = RawContext {
        stop_id: Some(FieldValue::Int(3)),
        hour: Some(FieldValue::Int(8)),
        ..Default::default()
    };
    let features = canonicalize(&ctx).unwrap();

    c.bench_function("canonicalize", |b| {
        b.iter(|| canonicalize(black_box(&ctx)).unwrap())
    });

    let mut group = c.benchmark_group("predict_single");
    for n_trees in [50, 200].iter() {
        let bundle = Trainer::new(
            ForestConfig {
                n_trees: *n_trees,
                ..Default::default()
            },
            TrainingConfig::default(),
        )
        .train(&dataset)
        .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n_trees), &bundle, |b, bundle| {
            b.iter(|| predict_with(bundle, black_box(&features)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_prediction);
criterion_main!(benches);
