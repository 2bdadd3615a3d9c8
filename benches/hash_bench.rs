/// Fingerprinting and ingest benchmarks
/// Measures SHA-256 throughput and the cost of the duplicate ingest path
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dedup_storage::application::dto::IngestRequest;
use dedup_storage::application::engine::{DeduplicationEngine, EngineConfig};
use dedup_storage::application::validation::UploadPolicy;
use dedup_storage::infrastructure::persistence::InMemoryDedupRepository;
use dedup_storage::infrastructure::storage::{ContentHasher, LocalFilesystemStore};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn sample(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn hash_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("fingerprint");
    group.measurement_time(Duration::from_secs(10));

    for size in [1024, 64 * 1024, 1024 * 1024, 10 * 1024 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        let data = sample(size);

        // Streaming hash plus rewind, as done for every upload
        group.bench_with_input(BenchmarkId::new("hash_and_rewind", size), &data, |b, d| {
            b.to_async(&rt).iter(|| {
                let mut reader = Cursor::new(d.clone());
                async move {
                    ContentHasher::hash_and_rewind(&mut reader).await.unwrap();
                }
            })
        });

        // Pure SHA-256 computation (without I/O)
        group.bench_with_input(BenchmarkId::new("hash_bytes", size), &data, |b, d| {
            b.iter(|| ContentHasher::hash_bytes(d))
        });
    }

    group.finish();
}

fn duplicate_ingest_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let temp_dir = TempDir::new().unwrap();

    let engine = rt.block_on(async {
        let store = LocalFilesystemStore::with_durability(temp_dir.path().to_path_buf(), false);
        store.init().await.unwrap();
        Arc::new(DeduplicationEngine::new(
            Arc::new(InMemoryDedupRepository::new()),
            Arc::new(store),
            Arc::new(UploadPolicy::default()),
            EngineConfig::default(),
        ))
    });

    let data = sample(64 * 1024);
    let request = IngestRequest {
        label: "bench.pdf".to_string(),
        declared_size: data.len() as u64,
        content_type: "application/pdf".to_string(),
    };

    // First ingest stores the bytes; every measured one is a duplicate
    rt.block_on(engine.ingest(request.clone(), Box::new(Cursor::new(data.clone()))))
        .unwrap();

    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("duplicate_64k", |b| {
        b.to_async(&rt).iter(|| {
            let engine = Arc::clone(&engine);
            let request = request.clone();
            let content = Box::new(Cursor::new(data.clone()));
            async move {
                engine.ingest(request, content).await.unwrap();
            }
        })
    });
    group.finish();
}

criterion_group!(benches, hash_benchmarks, duplicate_ingest_benchmark);
criterion_main!(benches);
