//! Benchmarks for the CPU-bound stage kernels.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vehicleflow::artifacts::Partition;
use vehicleflow::config::TransformationConfig;
use vehicleflow::features::FittedTransformer;
use vehicleflow::schema::SchemaContract;
use vehicleflow::stages::validate_partition;
use vehicleflow::testing::{vehicle_dataset, vehicle_schema_document};

fn validation_benchmark(c: &mut Criterion) {
    let Ok(schema) = SchemaContract::from_document(vehicle_schema_document()) else {
        return;
    };
    let mut group = c.benchmark_group("validate_partition");
    for rows in [1_000, 10_000] {
        let data = vehicle_dataset(rows, 42).drop_column("_id");
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| black_box(validate_partition(Partition::Train, data, &schema)));
        });
    }
    group.finish();
}

fn transformation_benchmark(c: &mut Criterion) {
    let Ok(schema) = SchemaContract::from_document(vehicle_schema_document()) else {
        return;
    };
    let config = TransformationConfig::default();
    let data = vehicle_dataset(10_000, 42).drop_column("_id");

    c.bench_function("transformer_fit", |b| {
        b.iter(|| black_box(FittedTransformer::fit(&data, &schema, &config)));
    });

    let Ok(transformer) = FittedTransformer::fit(&data, &schema, &config) else {
        return;
    };
    c.bench_function("transformer_transform", |b| {
        b.iter(|| black_box(transformer.transform(&data)));
    });
}

criterion_group!(benches, validation_benchmark, transformation_benchmark);
criterion_main!(benches);
