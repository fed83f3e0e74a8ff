//! Hot path benchmarks.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Measures the local work around each remote call: key to path mapping,
//! JSON encoding and the full create/get/put path over the in-memory backend.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use objstore_crud::storage::InMemoryObjectStore;
use objstore_crud::{BucketClient, ClientOptions, Codec, CrudStore, FilenameFormat, JsonCodec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: u64,
    name: String,
    tags: Vec<String>,
}

fn record(id: u64) -> Record {
    Record {
        id,
        name: format!("record-{}", id),
        tags: vec!["alpha".to_string(), "beta".to_string()],
    }
}

fn runtime() -> Runtime {
    match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => panic!("failed to build tokio runtime: {}", e),
    }
}

fn store(rt: &Runtime) -> CrudStore<Record> {
    let backend = Arc::new(InMemoryObjectStore::new());
    let client = rt
        .block_on(BucketClient::connect("bench", backend, ClientOptions::default()))
        .unwrap_or_else(|e| panic!("connect failed: {}", e));
    CrudStore::new(client)
}

/// Benchmark FilenameFormat::apply and key_of
fn bench_filename_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("filename_format");
    group.throughput(Throughput::Elements(1));

    for template in ["%s.json", "tenants/acme/%s.v2.json", "100%%/%s"] {
        let format = FilenameFormat::parse(template).unwrap_or_default();
        let path = format.apply("user-12345");

        group.bench_function(format!("apply/{}", template), |b| {
            b.iter(|| format.apply(black_box("user-12345")))
        });
        group.bench_function(format!("key_of/{}", template), |b| {
            b.iter(|| format.key_of(black_box(&path)).map(str::len))
        });
    }

    group.finish();
}

/// Benchmark JsonCodec encode and decode
fn bench_json_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_codec");
    group.throughput(Throughput::Elements(1));

    let value = record(42);
    let encoded = JsonCodec.encode(&value).unwrap_or_default();

    group.bench_function("encode", |b| b.iter(|| JsonCodec.encode(black_box(&value))));
    group.bench_function("decode", |b| {
        b.iter(|| Codec::<Record>::decode(&JsonCodec, black_box(&encoded)))
    });

    group.finish();
}

/// Benchmark CrudStore operations over the in-memory backend
fn bench_crud_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("crud_in_memory");
    group.throughput(Throughput::Elements(1));

    let rt = runtime();
    let store = store(&rt);
    let value = record(1);

    let mut next = 0u64;
    group.bench_function("create", |b| {
        b.iter(|| {
            next += 1;
            rt.block_on(store.create(&format!("c/{}", next), black_box(&value)))
        })
    });

    let _ = rt.block_on(store.create("hot", &value));
    group.bench_function("get", |b| b.iter(|| rt.block_on(store.get(black_box("hot")))));
    group.bench_function("put", |b| {
        b.iter(|| rt.block_on(store.put(black_box("hot"), black_box(&value))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_filename_format,
    bench_json_codec,
    bench_crud_in_memory,
);

criterion_main!(benches);
