//! Upload state machine tests.
//!
//! Run with: `cargo test -p stowage-services --test upload_flow_test`

mod helpers;

use helpers::{body, range, setup, setup_with, setup_with_durable, MemoryDurableStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use stowage_core::{AppError, ErrorClass, ErrorMetadata, UploadStatus};
use uuid::Uuid;

#[tokio::test]
async fn test_two_chunks_then_finalize() {
    let ctx = setup().await;
    let service = &ctx.service;

    let session = service.open("notes.txt", 10, "text/plain").await.unwrap();
    assert_eq!(session.uploaded_size, 0);
    assert_eq!(session.status, UploadStatus::Pending);

    let s = service
        .write_chunk(session.id, range("bytes 0-4/10"), body(b"hello"))
        .await
        .unwrap();
    assert_eq!(s.uploaded_size, 5);
    assert_eq!(s.status, UploadStatus::Uploading);

    let s = service
        .write_chunk(session.id, range("bytes 5-9/10"), body(b"world"))
        .await
        .unwrap();
    assert_eq!(s.uploaded_size, 10);
    assert_eq!(s.status, UploadStatus::Uploading);

    let file = service.finalize(session.id).await.unwrap();
    assert_eq!(file.size, 10);
    assert_eq!(file.session_ref, session.id);
    assert_ne!(file.id, session.id);
    assert_eq!(std::fs::read(&file.location).unwrap(), b"helloworld");

    let done = service.status(session.id).await.unwrap();
    assert_eq!(done.status, UploadStatus::Completed);
    assert!(done.completed_at.is_some());

    assert!(ctx.staged_files().is_empty());
    assert_eq!(ctx.final_files(), vec![session.staged_name.clone()]);
    assert_eq!(service.get_file(file.id).await.unwrap(), file);
}

#[tokio::test]
async fn test_chunk_past_frontier_is_out_of_order() {
    let ctx = setup().await;
    let session = ctx.service.open("a.bin", 10, "application/octet-stream").await.unwrap();

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 5-9/10"), body(b"56789"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::OutOfOrderChunk {
            start: 5,
            uploaded: 0
        }
    ));
    assert_eq!(err.error_class(), ErrorClass::Sequencing);

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after.status, UploadStatus::Pending);
    assert_eq!(after.uploaded_size, 0);
}

#[tokio::test]
async fn test_total_mismatch_leaves_session_untouched() {
    let ctx = setup().await;
    let session = ctx.service.open("a.bin", 10, "application/octet-stream").await.unwrap();

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 0-4/20"), body(b"01234"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::TotalSizeMismatch {
            declared: 20,
            expected: 10
        }
    ));

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after, session);
}

#[tokio::test]
async fn test_second_finalize_is_rejected() {
    let ctx = setup().await;
    let session = ctx.service.open("a.bin", 4, "application/octet-stream").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap();
    ctx.service.finalize(session.id).await.unwrap();

    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyCompleted(id) if id == session.id));
    assert_eq!(err.http_status_code(), 409);
    assert_eq!(ctx.records.inner.files_for_session(session.id).await.len(), 1);

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyCompleted(_)));
}

#[tokio::test]
async fn test_oversized_open_creates_nothing() {
    let ctx = setup().await;
    let max = ctx.service.max_file_size();

    let err = ctx
        .service
        .open("big.bin", max + 1, "application/octet-stream")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SizeLimitExceeded { size, .. } if size == max + 1));
    assert_eq!(ctx.records.inner.session_count().await, 0);
    assert!(ctx.staged_files().is_empty());

    assert!(ctx.service.open("max.bin", max, "application/octet-stream").await.is_ok());
}

#[tokio::test]
async fn test_resent_chunk_is_accepted_and_frontier_holds() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 10, "text/plain").await.unwrap();

    ctx.service
        .write_chunk(session.id, range("bytes 0-5/10"), body(b"abcdef"))
        .await
        .unwrap();

    let s = ctx
        .service
        .write_chunk(session.id, range("bytes 0-2/10"), body(b"ABC"))
        .await
        .unwrap();
    assert_eq!(s.uploaded_size, 6);
    assert_eq!(s.status, UploadStatus::Uploading);

    // Overlapping the frontier extends it.
    let s = ctx
        .service
        .write_chunk(session.id, range("bytes 4-9/10"), body(b"EFGHIJ"))
        .await
        .unwrap();
    assert_eq!(s.uploaded_size, 10);

    let file = ctx.service.finalize(session.id).await.unwrap();
    assert_eq!(std::fs::read(&file.location).unwrap(), b"ABCdEFGHIJ");
}

#[tokio::test]
async fn test_finalize_before_complete_is_incomplete() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 10, "text/plain").await.unwrap();

    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::UploadIncomplete {
            uploaded: 0,
            total: 10
        }
    ));

    ctx.service
        .write_chunk(session.id, range("bytes 0-8/10"), body(b"012345678"))
        .await
        .unwrap();
    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(err, AppError::UploadIncomplete { uploaded: 9, .. }));

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after.status, UploadStatus::Uploading);
}

#[tokio::test]
async fn test_status_reads_are_stable() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 10, "text/plain").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-4/10"), body(b"01234"))
        .await
        .unwrap();

    let first = ctx.service.status(session.id).await.unwrap();
    let second = ctx.service.status(session.id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let ctx = setup().await;
    let id = Uuid::new_v4();

    assert!(matches!(
        ctx.service.status(id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ctx.service
            .write_chunk(id, range("bytes 0-0/1"), body(b"x"))
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ctx.service.finalize(id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        ctx.service.get_file(id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_short_chunk_fails_session_and_keeps_staging() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 10, "text/plain").await.unwrap();

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 0-4/10"), body(b"012"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ChunkSizeMismatch {
            expected: 5,
            actual: 3
        }
    ));
    assert_eq!(err.error_class(), ErrorClass::Io);

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after.status, UploadStatus::Failed);
    assert_eq!(after.uploaded_size, 0);
    assert!(after.completed_at.is_none());
    assert_eq!(ctx.staged_files(), vec![session.staged_name.clone()]);

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 0-4/10"), body(b"01234"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyFailed(_)));
    assert!(matches!(
        ctx.service.finalize(session.id).await,
        Err(AppError::AlreadyFailed(_))
    ));
}

#[tokio::test]
async fn test_staging_write_error_fails_session() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 4, "text/plain").await.unwrap();
    std::fs::remove_file(&session.staging_location).unwrap();

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ChunkWriteFailed(_)));
    assert_eq!(
        ctx.service.status(session.id).await.unwrap().status,
        UploadStatus::Failed
    );
}

#[tokio::test]
async fn test_open_persistence_failure_removes_staging_blob() {
    let ctx = setup().await;
    ctx.records.fail_create_session.store(true, Ordering::SeqCst);

    let err = ctx.service.open("a.txt", 4, "text/plain").await.unwrap_err();
    assert!(matches!(err, AppError::PersistenceFailed(_)));
    assert!(ctx.staged_files().is_empty());
    assert_eq!(ctx.records.inner.session_count().await, 0);
}

#[tokio::test]
async fn test_open_allocation_failure() {
    let ctx = setup().await;
    std::fs::remove_dir_all(&ctx.staging_dir).unwrap();

    let err = ctx.service.open("a.txt", 4, "text/plain").await.unwrap_err();
    assert!(matches!(err, AppError::StagingAllocationFailed(_)));
    assert_eq!(ctx.records.inner.session_count().await, 0);
}

#[tokio::test]
async fn test_move_failure_fails_session_without_file() {
    let ctx = setup_with(None, Some(Arc::new(helpers::UnmovableFinalStore))).await;
    let session = ctx.service.open("a.txt", 4, "text/plain").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap();

    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(err, AppError::FinalizeMoveFailed(_)));

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after.status, UploadStatus::Failed);
    assert!(after.completed_at.is_none());
    assert_eq!(ctx.records.inner.file_count().await, 0);
}

#[tokio::test]
async fn test_file_record_failure_fails_session() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 4, "text/plain").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap();
    ctx.records.fail_create_file.store(true, Ordering::SeqCst);

    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(err, AppError::PersistenceFailed(_)));
    assert_eq!(
        ctx.service.status(session.id).await.unwrap().status,
        UploadStatus::Failed
    );
}

#[tokio::test]
async fn test_durable_push_carries_metadata() {
    let durable = Arc::new(MemoryDurableStore::default());
    let ctx = setup_with_durable(durable.clone()).await;
    let session = ctx.service.open("Report.PDF", 3, "application/pdf").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-2/3"), body(b"pdf"))
        .await
        .unwrap();

    let file = ctx.service.finalize(session.id).await.unwrap();

    let puts = durable.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].key, file.stored_name);
    assert!(puts[0].key.ends_with(".pdf"));
    assert_eq!(puts[0].data, b"pdf");
    assert_eq!(puts[0].content_type, "application/pdf");
    assert_eq!(puts[0].metadata["original_name"], "Report.PDF");
    assert_eq!(puts[0].metadata["session_id"], session.id.to_string());
    assert_eq!(
        ctx.service.status(session.id).await.unwrap().status,
        UploadStatus::Completed
    );
}

#[tokio::test]
async fn test_durable_push_failure_leaves_file_and_fails_session() {
    let ctx = setup_with_durable(Arc::new(MemoryDurableStore::failing())).await;
    let session = ctx.service.open("a.txt", 4, "text/plain").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap();

    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(err, AppError::DurableSyncFailed(_)));

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after.status, UploadStatus::Failed);
    assert!(after.completed_at.is_none());

    let files = ctx.records.inner.files_for_session(session.id).await;
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0].location).unwrap(), b"abcd");
}

#[tokio::test]
async fn test_lost_progress_update_keeps_session_resendable() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 10, "text/plain").await.unwrap();
    ctx.records.fail_update_session.store(true, Ordering::SeqCst);

    let err = ctx
        .service
        .write_chunk(session.id, range("bytes 0-4/10"), body(b"hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PersistenceFailed(_)));
    assert!(err.is_recoverable());

    let after = ctx.service.status(session.id).await.unwrap();
    assert_eq!(after.status, UploadStatus::Pending);
    assert_eq!(after.uploaded_size, 0);

    ctx.records.fail_update_session.store(false, Ordering::SeqCst);
    let resent = ctx
        .service
        .write_chunk(session.id, range("bytes 0-4/10"), body(b"hello"))
        .await
        .unwrap();
    assert_eq!(resent.uploaded_size, 5);
    assert_eq!(resent.status, UploadStatus::Uploading);
}

#[tokio::test]
async fn test_lost_completion_update_is_recovered_by_retry() {
    let ctx = setup().await;
    let session = ctx.service.open("a.txt", 4, "text/plain").await.unwrap();
    ctx.service
        .write_chunk(session.id, range("bytes 0-3/4"), body(b"abcd"))
        .await
        .unwrap();
    ctx.records.fail_update_session.store(true, Ordering::SeqCst);

    let err = ctx.service.finalize(session.id).await.unwrap_err();
    assert!(matches!(err, AppError::PersistenceFailed(_)));

    let pending = ctx.service.status(session.id).await.unwrap();
    assert_eq!(pending.status, UploadStatus::Uploading);
    assert!(ctx.staged_files().is_empty());
    let recorded = ctx.records.inner.files_for_session(session.id).await;
    assert_eq!(recorded.len(), 1);

    ctx.records.fail_update_session.store(false, Ordering::SeqCst);
    let file = ctx.service.finalize(session.id).await.unwrap();
    assert_eq!(file.id, recorded[0].id);
    assert_eq!(std::fs::read(&file.location).unwrap(), b"abcd");

    let done = ctx.service.status(session.id).await.unwrap();
    assert_eq!(done.status, UploadStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(ctx.records.inner.files_for_session(session.id).await.len(), 1);
}
