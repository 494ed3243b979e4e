//! Benchmarks for duracache insert/get throughput over the in-memory backend

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use duracache::{BlobCache, InMemoryCache};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn bench_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = InMemoryCache::new();

    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));

    group.bench_function("small_value", |b| {
        b.iter(|| {
            rt.block_on(async {
                cache
                    .insert(black_box("key"), black_box(b"42".to_vec()), None, None)
                    .await
                    .unwrap();
            });
        });
    });

    group.bench_function("medium_value", |b| {
        let value = "x".repeat(1024).into_bytes();
        b.iter(|| {
            rt.block_on(async {
                cache
                    .insert(black_box("key"), black_box(value.clone()), None, None)
                    .await
                    .unwrap();
            });
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = InMemoryCache::new();

    rt.block_on(async {
        cache.insert("key", b"42".to_vec(), None, None).await.unwrap();
    });

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = cache.get(black_box("key")).await;
                black_box(result).unwrap();
            });
        });
    });

    group.bench_function("miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = cache.get(black_box("nonexistent")).await;
                black_box(result).ok();
            });
        });
    });

    group.finish();
}

fn bench_mixed_workload(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = InMemoryCache::new();

    rt.block_on(async {
        for i in 0..100 {
            cache.insert(&format!("key:{i}"), i.to_string().into_bytes(), None, None).await.unwrap();
        }
    });

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(100));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            rt.block_on(async {
                for _ in 0..100 {
                    i = i.wrapping_add(1);
                    let key = format!("key:{}", i % 100);
                    if i % 5 == 0 {
                        cache.insert(&key, i.to_string().into_bytes(), None, None).await.unwrap();
                    } else {
                        let _ = cache.get(&key).await;
                    }
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_mixed_workload);
criterion_main!(benches);
