//! State machine integration tests with mocked handler and wiki client.

mod helpers;

use curator_core::models::{ErrorLink, UploadError, UploadStatus};
use curator_worker::process_one;
use helpers::*;

#[tokio::test]
async fn test_happy_path_completes() {
    let rig = setup_rig(MockHandler::default(), MockWiki::default()).await;
    let id = enqueue_one(&rig).await;

    let ok = process_one(&rig.ctx, id).await.unwrap();
    assert!(ok);

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Completed);
    assert_eq!(
        row.success.as_deref(),
        Some("https://commons.wikimedia.org/wiki/File:Test.jpg")
    );
    assert_eq!(row.access_token, None);

    // The mock served b"abc"; the wiki saw its SHA-1.
    assert_eq!(
        rig.wiki.seen_sha1.lock().unwrap().as_deref(),
        Some("a9993e364706816aba3e25717850c26c9cd0d89d")
    );

    // Status deltas arrived in DAG order, then the batch completion.
    let updates = rig.progress.updates.lock().unwrap();
    let statuses: Vec<UploadStatus> = updates.iter().map(|(_, d)| d.status).collect();
    assert_eq!(
        statuses,
        vec![UploadStatus::InProgress, UploadStatus::Completed]
    );
    assert_eq!(rig.progress.completes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_queued_request_is_skipped() {
    let rig = setup_rig(MockHandler::default(), MockWiki::default()).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());
    // Redelivery after the terminal state is a no-op.
    assert!(!process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Completed);
}

#[tokio::test]
async fn test_exactly_once_under_racing_workers() {
    let rig = setup_rig(MockHandler::default(), MockWiki::default()).await;
    let id = enqueue_one(&rig).await;

    let (a, b) = tokio::join!(process_one(&rig.ctx, id), process_one(&rig.ctx, id));
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(outcomes.iter().filter(|&&won| won).count(), 1);

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert!(row.status.is_terminal());
}

#[tokio::test]
async fn test_missing_access_token_fails() {
    let rig = setup_rig(MockHandler::default(), MockWiki::default()).await;
    let id = enqueue_one(&rig).await;

    sqlx::query("UPDATE upload_requests SET access_token = NULL WHERE id = ?")
        .bind(id)
        .execute(&rig.pool)
        .await
        .unwrap();

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Failed);
    assert_eq!(
        row.error,
        Some(UploadError::Error {
            message: "Missing access token".to_string()
        })
    );
}

#[tokio::test]
async fn test_duplicate_content_is_not_failed() {
    let wiki = MockWiki {
        duplicates: vec![ErrorLink {
            title: "File:Existing.jpg".to_string(),
            url: "https://commons.wikimedia.org/wiki/File:Existing.jpg".to_string(),
        }],
        ..Default::default()
    };
    let rig = setup_rig(MockHandler::default(), wiki).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    // Duplicate is its own terminal status, distinct from failed.
    assert_eq!(row.status, UploadStatus::Duplicate);
    match row.error.unwrap() {
        UploadError::Duplicate { links, .. } => {
            assert_eq!(links.len(), 1);
            assert!(links[0].url.contains("/wiki/File:"));
        }
        other => panic!("unexpected error payload: {:?}", other),
    }
    assert_eq!(row.access_token, None);
    // Nothing was uploaded.
    assert_eq!(
        rig.wiki
            .upload_attempts
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_copyright_override_uploads_despite_duplicates() {
    let wiki = MockWiki {
        duplicates: vec![ErrorLink {
            title: "File:Existing.jpg".to_string(),
            url: "https://commons.wikimedia.org/wiki/File:Existing.jpg".to_string(),
        }],
        ..Default::default()
    };
    let rig = setup_rig(MockHandler::default(), wiki).await;
    let id = enqueue_one_with(&rig, |item| item.copyright_override = true).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Completed);
}

#[tokio::test]
async fn test_blacklisted_title_fails_with_reason() {
    let wiki = MockWiki {
        blacklist_reason: Some("Generic file names are not allowed".to_string()),
        ..Default::default()
    };
    let rig = setup_rig(MockHandler::default(), wiki).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Failed);
    assert_eq!(
        row.error,
        Some(UploadError::Blacklisted {
            message: "Title is blacklisted".to_string(),
            reason: "Generic file names are not allowed".to_string(),
        })
    );
}

#[tokio::test]
async fn test_hash_lock_is_retried_to_success() {
    let wiki = MockWiki {
        hash_lock_failures: 1,
        ..Default::default()
    };
    let rig = setup_rig(MockHandler::default(), wiki).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Completed);
    assert_eq!(
        rig.wiki
            .upload_attempts
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}

#[tokio::test]
async fn test_hash_lock_exhausts_attempt_budget() {
    let wiki = MockWiki {
        hash_lock_failures: usize::MAX,
        ..Default::default()
    };
    let rig = setup_rig(MockHandler::default(), wiki).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Failed);
    assert_eq!(
        rig.wiki
            .upload_attempts
            .load(std::sync::atomic::Ordering::SeqCst),
        3
    );
}

#[tokio::test]
async fn test_metadata_not_found_fails_terminally() {
    let handler = MockHandler {
        fail_metadata: Some("Image data not found in sequence".to_string()),
        ..Default::default()
    };
    let rig = setup_rig(handler, MockWiki::default()).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let row = rig.uploads.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Failed);
    match row.error.unwrap() {
        UploadError::Error { message } => {
            assert!(message.contains("Image data not found in sequence"))
        }
        other => panic!("unexpected error payload: {:?}", other),
    }
}

#[tokio::test]
async fn test_existing_sdc_is_merged_not_overwritten() {
    let mut existing = photo_id_statement("img1");
    existing.id = Some("M123$EXISTING".to_string());
    existing.mainsnak.hash = Some("server_hash".to_string());

    let wiki = MockWiki {
        existing_sdc: Some(vec![existing.clone()]),
        ..Default::default()
    };
    let rig = setup_rig(MockHandler::default(), wiki).await;
    let id = enqueue_one(&rig).await;

    assert!(process_one(&rig.ctx, id).await.unwrap());

    let applied = rig.wiki.applied_sdc.lock().unwrap();
    assert_eq!(applied.len(), 1);
    // The proposed photo-id claim already existed: the write carries the
    // server's statement verbatim and nothing else.
    assert_eq!(applied[0], vec![existing]);
}
