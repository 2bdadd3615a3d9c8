//! End-to-end tests of the engine, query use cases and orphan sweeper
//! against the in-memory backend and local filesystem storage.


use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use dedup_storage::{
    application::{
        dto::{FileFilter, ListFilesRequest},
        errors::EngineError,
        gc::{OrphanSweeper, SweepConfig},
    },
    domain::value_objects::BlobId,
    ReleaseOutcome,
};
use test_fixtures::*;

#[tokio::test]
async fn test_ingest_then_download_round_trip() {
    let env = TestEnvironment::new().await;

    let outcome = env.ingest("test.pdf", TEST_PDF).await.unwrap();
    let id = *outcome.record().id();

    let (metadata, mut reader) = env.state.download_use_case.execute(&id).await.unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).await.unwrap();

    assert_eq!(content, TEST_PDF);
    assert_eq!(metadata.label, "test.pdf");
    assert_eq!(metadata.byte_size, 18);
}

#[tokio::test]
async fn test_distinct_content_creates_distinct_records() {
    let env = TestEnvironment::new().await;

    env.ingest("a.pdf", b"content A").await.unwrap();
    env.ingest("b.pdf", b"content B").await.unwrap();

    let stats = env.engine().stats().await.unwrap();
    assert_eq!(stats.unique_blobs, 2);
    assert_eq!(stats.total_references, 2);
    assert_eq!(stats.duplicates_avoided, 0);
    assert_eq!(env.stored_blobs().await, 2);
}

#[tokio::test]
async fn test_release_keeps_bytes_until_last_reference() {
    let env = TestEnvironment::new().await;
    let engine = env.engine();

    let id = *env.ingest("a.pdf", TEST_PDF).await.unwrap().record().id();
    env.ingest("b.pdf", TEST_PDF).await.unwrap();
    assert_eq!(env.stored_blobs().await, 1);

    let outcome = engine.release(&id).await.unwrap();
    assert_eq!(
        outcome,
        ReleaseOutcome::Released {
            remaining_references: 1
        }
    );
    assert_eq!(env.stored_blobs().await, 1);

    let outcome = engine.release(&id).await.unwrap();
    assert_eq!(outcome, ReleaseOutcome::Destroyed);
    assert_eq!(env.stored_blobs().await, 0);

    let err = engine.release(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_identical_uploads_share_one_record() {
    let env = Arc::new(TestEnvironment::new().await);

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let env = Arc::clone(&env);
            tokio::spawn(async move { env.ingest(&format!("copy-{}.pdf", i), TEST_PDF).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if !outcome.is_duplicate() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    let stats = env.engine().stats().await.unwrap();
    assert_eq!(stats.unique_blobs, 1);
    assert_eq!(stats.total_references, 12);
    assert_eq!(stats.duplicates_avoided, 11);
    assert_eq!(env.stored_blobs().await, 1);
}

#[tokio::test]
async fn test_listing_sees_ingested_files() {
    let env = TestEnvironment::new().await;
    env.ingest("alpha.pdf", b"alpha").await.unwrap();
    env.ingest("beta.png", b"beta").await.unwrap();

    let response = env
        .state
        .list_use_case
        .execute(ListFilesRequest {
            filter: FileFilter {
                search: Some("ALP".to_string()),
                ..FileFilter::default()
            },
            ..ListFilesRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].label, "alpha.pdf");
}

#[tokio::test]
async fn test_sweeper_removes_only_orphaned_bytes() {
    let env = TestEnvironment::new().await;
    env.ingest("kept.pdf", TEST_PDF).await.unwrap();

    // Bytes with no record, as left behind by a crash before commit
    env.blob_store
        .put(Box::pin(std::io::Cursor::new(b"orphan".to_vec())), None)
        .await
        .unwrap();
    assert_eq!(env.stored_blobs().await, 2);

    let sweeper = OrphanSweeper::new(
        Arc::clone(&env.repository),
        Arc::clone(&env.blob_store),
        SweepConfig::new(Duration::from_secs(60), Duration::ZERO, 100),
    );
    let result = sweeper.sweep_once().await.unwrap();

    assert_eq!(result.inspected, 2);
    assert_eq!(result.referenced, 1);
    assert_eq!(result.deleted, 1);
    assert_eq!(env.stored_blobs().await, 1);

    // Record still downloadable
    let stats = env.engine().stats().await.unwrap();
    assert_eq!(stats.unique_blobs, 1);
}

#[tokio::test]
async fn test_sweeper_reaches_orphans_beyond_first_batch() {
    let env = TestEnvironment::new().await;
    for i in 0..12 {
        env.ingest(&format!("live-{}.pdf", i), format!("content {}", i).as_bytes())
            .await
            .unwrap();
    }
    env.blob_store
        .put(Box::pin(std::io::Cursor::new(b"orphan".to_vec())), None)
        .await
        .unwrap();
    assert_eq!(env.stored_blobs().await, 13);

    let sweeper = OrphanSweeper::new(
        Arc::clone(&env.repository),
        Arc::clone(&env.blob_store),
        SweepConfig::new(Duration::from_secs(60), Duration::ZERO, 5),
    );

    // 13 objects in batches of 5 take three passes to cover
    let mut deleted = 0;
    for _ in 0..3 {
        let result = sweeper.sweep_once().await.unwrap();
        assert!(result.is_success());
        deleted += result.deleted;
    }

    assert_eq!(deleted, 1);
    assert_eq!(env.stored_blobs().await, 12);
    assert_eq!(env.engine().stats().await.unwrap().unique_blobs, 12);
}

#[tokio::test]
async fn test_get_unknown_file() {
    let env = TestEnvironment::new().await;
    assert!(env.state.get_use_case.execute(&BlobId::new()).await.is_err());
}
