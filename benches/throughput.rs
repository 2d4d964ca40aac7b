//! Keyspace throughput benchmarks.
//!
//! Measures the store in isolation, without the codec or the socket, so
//! the numbers reflect pure lock-and-map cost per command.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use emberkv::storage::{now_ms, Keyspace};
use std::sync::Arc;

fn bench_set(c: &mut Criterion) {
    let store = Arc::new(Keyspace::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, Bytes::from_static(b"small_value"), None);
            i += 1;
        });
    });

    group.bench_function("set_large", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(64 * 1024));
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, value.clone(), None);
            i += 1;
        });
    });

    group.bench_function("set_with_expiry", |b| {
        let mut i = 0u64;
        let when = now_ms() + 3_600_000;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, Bytes::from_static(b"value"), Some(when));
            i += 1;
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let store = Arc::new(Keyspace::new());
    for i in 0..10_000u64 {
        store.set(
            Bytes::from(format!("key:{}", i)),
            Bytes::from_static(b"value"),
            None,
        );
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 10_000));
            black_box(store.get(&key).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_miss", |b| {
        let key = Bytes::from_static(b"missing");
        b.iter(|| {
            black_box(store.get(&key).unwrap());
        });
    });

    group.finish();
}

fn bench_incr(c: &mut Criterion) {
    let store = Arc::new(Keyspace::new());
    let key = Bytes::from_static(b"counter");

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    group.bench_function("incr", |b| {
        b.iter(|| {
            black_box(store.incr_by(&key, 1).unwrap());
        });
    });

    group.finish();
}

fn bench_list_ops(c: &mut Criterion) {
    let store = Arc::new(Keyspace::new());
    let key = Bytes::from_static(b"queue");

    let mut group = c.benchmark_group("list");
    group.throughput(Throughput::Elements(1));

    group.bench_function("lpush_then_lpop", |b| {
        let value = Bytes::from_static(b"payload");
        b.iter(|| {
            store.lpush(&key, std::slice::from_ref(&value)).unwrap();
            black_box(store.lpop_one(&key).unwrap());
        });
    });

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    group.bench_function("sweep_sample_mixed", |b| {
        let store = Keyspace::new();
        let live = now_ms() + 3_600_000;
        for i in 0..1_000u64 {
            store.set(
                Bytes::from(format!("key:{}", i)),
                Bytes::from_static(b"value"),
                Some(live),
            );
        }
        b.iter(|| {
            black_box(store.sweep_sample(20));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_incr,
    bench_list_ops,
    bench_sweep
);
criterion_main!(benches);
