//! Performance benchmarks for readthrough
//!
//! This benchmark suite measures:
//! - InMemory store operations (set, get)
//! - Cache lookups (hit, miss, hit with conversion)
//! - Coercion paths (native, registered, JSON records)
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use readthrough::convert::{coerce, ConverterRegistry};
use readthrough::shape::{Record, Shape, Shaped, Value};
use readthrough::store::{InMemoryStore, Store};
use readthrough::Cache;
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const EXPIRE: Duration = Duration::from_secs(3600);

// ============================================================================
// Benchmark Test Fixtures
// ============================================================================

/// Benchmark record with configurable payload size
#[derive(Clone, Default, Serialize, Deserialize)]
struct BenchRecord {
    id: String,
    data: Vec<u8>,
}

impl Record for BenchRecord {}

impl BenchRecord {
    fn new(id: &str, size: usize) -> Self {
        BenchRecord {
            id: id.to_string(),
            data: vec![0u8; size],
        }
    }
}

// ============================================================================
// InMemory Store Benchmarks
// ============================================================================

fn inmemory_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_store");
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    group.bench_function("set", |b| {
        let store = InMemoryStore::new();
        b.to_async(&rt).iter(|| async {
            store
                .set(black_box("test_key"), Value::Int(1), EXPIRE)
                .await
        });
    });

    group.bench_function("get_hit", |b| {
        let store = InMemoryStore::new();
        rt.block_on(store.set("test_key", Value::from("value"), EXPIRE))
            .expect("Failed to seed");
        b.to_async(&rt)
            .iter(|| async { store.get(black_box("test_key")).await });
    });

    group.bench_function("get_miss", |b| {
        let store = InMemoryStore::new();
        b.to_async(&rt)
            .iter(|| async { store.get(black_box("nonexistent_key")).await });
    });

    group.finish();
}

// ============================================================================
// Cache Benchmarks
// ============================================================================

fn cache_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    group.bench_function("get_hit", |b| {
        let cache = Cache::new(InMemoryStore::new(), EXPIRE).expect("Failed to create cache");
        rt.block_on(cache.store().set("answer", Value::Int(42), EXPIRE))
            .expect("Failed to seed");
        b.to_async(&rt).iter(|| async {
            let mut dst = 0_i64;
            cache
                .get(black_box("answer"), || async { Ok(Some(0_i64)) }, &mut dst)
                .await
                .expect("Failed to get");
            dst
        });
    });

    group.bench_function("get_hit_text_to_int", |b| {
        let cache = Cache::new(InMemoryStore::new(), EXPIRE).expect("Failed to create cache");
        rt.block_on(cache.store().set("answer", Value::from("42"), EXPIRE))
            .expect("Failed to seed");
        b.to_async(&rt).iter(|| async {
            let mut dst = 0_i64;
            cache
                .get(black_box("answer"), || async { Ok(Some(0_i64)) }, &mut dst)
                .await
                .expect("Failed to get");
            dst
        });
    });

    group.bench_function("get_miss", |b| {
        let cache = Cache::new(InMemoryStore::new(), EXPIRE).expect("Failed to create cache");
        let counter = AtomicU64::new(0);
        b.to_async(&rt).iter(|| {
            // Unique key per iteration forces the producer to run
            let key = format!("miss_{}", counter.fetch_add(1, Ordering::Relaxed));
            let cache = cache.clone();
            async move {
                let mut dst = 0_u64;
                cache
                    .get(&key, || async { Ok(Some(7_u64)) }, &mut dst)
                    .await
                    .expect("Failed to get");
                dst
            }
        });
    });

    group.finish();
}

// ============================================================================
// Coercion Benchmarks
// ============================================================================

fn coercion_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("coercion");
    let registry = ConverterRegistry::with_defaults();
    registry.insert(readthrough::Converter::json::<BenchRecord>()[0].clone());

    group.bench_function("int_to_float", |b| {
        b.iter(|| coerce(black_box(Value::Int(42)), Shape::Float, &[], &registry));
    });

    group.bench_function("text_to_int", |b| {
        b.iter(|| coerce(black_box(Value::from("-54123")), Shape::Int, &[], &registry));
    });

    for size in [100, 1_000, 10_000].iter() {
        let text = serde_json::to_string(&BenchRecord::new("bench", *size))
            .expect("Failed to encode record");
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("json_record", size), &text, |b, text| {
            b.iter(|| {
                coerce(
                    black_box(Value::Text(text.clone())),
                    BenchRecord::shape(),
                    &[],
                    &registry,
                )
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(
    benches,
    inmemory_benchmarks,
    cache_benchmarks,
    coercion_benchmarks
);
criterion_main!(benches);
