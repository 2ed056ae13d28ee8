// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batch Save/Load Benchmark
//!
//! Measures end-to-end batch throughput:
//! - full save of N objects into one blob
//! - delta save against the cached default instance
//! - load of every object from a validated blob

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

use bumpalo::Bump;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use plainprops::{
    BatchLoader, BatchSaver, Context, DeclId, FieldKind, HostRegistry, MapEntry, SchemaFormat,
    SparseMap, SparseSet, StructBuilder, StructValue, Value,
};

fn setup() -> (Context, DeclId) {
    let mut host = HostRegistry::new();
    host.add_struct(
        StructBuilder::new("Bench::Unit")
            .field("Id", FieldKind::U32)
            .field_default("Health", FieldKind::F32, 100.0f32)
            .field("Name", FieldKind::String)
            .field("Path", FieldKind::array(FieldKind::I32))
            .field("Tags", FieldKind::set(FieldKind::String))
            .field("Scores", FieldKind::map(FieldKind::U16, FieldKind::F64)),
    );
    let mut ctx = Context::default();
    let decl = ctx.bind_struct(&host, "Bench::Unit").expect("bind");
    (ctx, decl)
}

fn unit(i: u32) -> StructValue {
    StructValue::new(vec![
        Value::U32(i),
        Value::F32(if i % 3 == 0 { 100.0 } else { 42.5 }),
        Value::from(format!("unit-{}", i)),
        Value::Array((0..16).map(|x| Value::I32(x * i as i32)).collect()),
        Value::Set(
            (0..4)
                .map(|t| Value::from(format!("tag{}", (i + t) % 7)))
                .collect::<SparseSet>(),
        ),
        Value::Map(
            (0..4u16)
                .map(|k| MapEntry::new(Value::U16(k), Value::F64(f64::from(k) * 0.5)))
                .collect::<SparseMap>(),
        ),
    ])
}

fn bench_save(c: &mut Criterion) {
    let (ctx, decl) = setup();
    let default = ctx.new_instance(decl).expect("default");
    let mut group = c.benchmark_group("batch_save");
    for count in [16u32, 256] {
        let values: Vec<StructValue> = (0..count).map(unit).collect();
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("full", count), &values, |b, values| {
            b.iter(|| {
                let bump = Bump::new();
                let mut saver = BatchSaver::new(&ctx, &bump);
                for value in values {
                    saver.save(decl, value, None).expect("save");
                }
                black_box(saver.write().expect("write"))
            });
        });
        group.bench_with_input(BenchmarkId::new("delta", count), &values, |b, values| {
            b.iter(|| {
                let bump = Bump::new();
                let mut saver = BatchSaver::new(&ctx, &bump);
                for value in values {
                    saver.save(decl, value, Some(&default)).expect("save");
                }
                black_box(saver.write().expect("write"))
            });
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let (ctx, decl) = setup();
    let mut group = c.benchmark_group("batch_load");
    for count in [16u32, 256] {
        let bump = Bump::new();
        let mut saver = BatchSaver::new(&ctx, &bump);
        for i in 0..count {
            saver.save(decl, &unit(i), None).expect("save");
        }
        let blob = saver.write().expect("write");
        group.throughput(Throughput::Bytes(blob.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &blob, |b, blob| {
            b.iter(|| {
                let mut loader =
                    BatchLoader::new(&ctx, blob, SchemaFormat::StableNames).expect("loader");
                let mut dst = StructValue::default();
                while loader.load_next(&mut dst).expect("load").is_some() {
                    black_box(&dst);
                    dst = StructValue::default();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
