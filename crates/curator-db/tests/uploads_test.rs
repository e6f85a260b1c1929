//! Upload repository integration tests over a throwaway SQLite database.

mod helpers;

use curator_core::models::{NewUploadItem, UploadError, UploadStatus};
use curator_db::uploads::StatusUpdate;
use curator_db::{UploadRepository, UserRepository};
use helpers::setup_db;

fn item(id: &str) -> NewUploadItem {
    NewUploadItem {
        id: id.to_string(),
        input: Some("seq123".to_string()),
        title: format!("Photo {}.jpg", id),
        wikitext: "== Summary ==".to_string(),
        copyright_override: false,
        sdc: None,
        labels: None,
    }
}

#[tokio::test]
async fn test_create_upload_request_persists_batch() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());

    let requests = repo
        .create_upload_request("u1", "Alice", "mapillary", &[item("a"), item("b")], "sealed")
        .await
        .unwrap();

    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.status == UploadStatus::Queued));
    assert!(requests.iter().all(|r| r.batchid == requests[0].batchid));
    assert_eq!(requests[0].collection.as_deref(), Some("seq123"));

    let stored = repo.get_by_id(requests[0].id).await.unwrap().unwrap();
    assert_eq!(stored.key, "a");
    assert_eq!(stored.access_token.as_deref(), Some("sealed"));
}

#[tokio::test]
async fn test_acquire_is_exactly_once() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());
    let requests = repo
        .create_upload_request("u1", "Alice", "mapillary", &[item("a")], "sealed")
        .await
        .unwrap();
    let id = requests[0].id;

    // First worker takes the lease.
    let first = repo.acquire_for_processing(id).await.unwrap();
    assert_eq!(first.unwrap().status, UploadStatus::InProgress);

    // Second delivery of the same id observes the lease and backs off.
    let second = repo.acquire_for_processing(id).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_terminal_transition_wipes_token() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());
    let requests = repo
        .create_upload_request("u1", "Alice", "mapillary", &[item("a")], "sealed")
        .await
        .unwrap();
    let id = requests[0].id;

    repo.acquire_for_processing(id).await.unwrap().unwrap();
    repo.update_status(
        id,
        UploadStatus::Completed,
        StatusUpdate {
            success: Some("https://commons.wikimedia.org/wiki/File:Test.jpg".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let row = repo.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(row.status, UploadStatus::Completed);
    assert_eq!(
        row.success.as_deref(),
        Some("https://commons.wikimedia.org/wiki/File:Test.jpg")
    );
    assert_eq!(row.access_token, None);
}

#[tokio::test]
async fn test_failed_transition_stores_structured_error() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());
    let requests = repo
        .create_upload_request("u1", "Alice", "mapillary", &[item("a")], "sealed")
        .await
        .unwrap();
    let id = requests[0].id;

    repo.acquire_for_processing(id).await.unwrap().unwrap();
    repo.update_status(
        id,
        UploadStatus::Failed,
        StatusUpdate {
            error: Some(UploadError::Error {
                message: "Missing access token".to_string(),
            }),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let row = repo.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(
        row.error,
        Some(UploadError::Error {
            message: "Missing access token".to_string()
        })
    );
    assert_eq!(row.access_token, None);
}

#[tokio::test]
async fn test_get_batches_stats_zero_fills() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());

    let requests = repo
        .create_upload_request(
            "u1",
            "Alice",
            "mapillary",
            &[item("a"), item("b"), item("c")],
            "sealed",
        )
        .await
        .unwrap();
    let batchid = requests[0].batchid;

    repo.acquire_for_processing(requests[0].id).await.unwrap();
    repo.update_status(
        requests[0].id,
        UploadStatus::Completed,
        StatusUpdate::default(),
    )
    .await
    .unwrap();

    let stats = repo.get_batches_stats(&[batchid, 9999]).await.unwrap();

    let batch_stats = stats[&batchid];
    assert_eq!(batch_stats.total, 3);
    assert_eq!(batch_stats.completed, 1);
    assert_eq!(batch_stats.queued, 2);
    assert_eq!(batch_stats.failed, 0);
    assert_eq!(
        batch_stats.total,
        batch_stats.queued
            + batch_stats.in_progress
            + batch_stats.completed
            + batch_stats.failed
            + batch_stats.duplicate
    );

    // Unknown batch ids come back as zero records.
    assert_eq!(stats[&9999].total, 0);
}

#[tokio::test]
async fn test_get_upload_request_resolves_editor_username() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());
    let users = UserRepository::new(db.pool.clone());

    let requests = repo
        .create_upload_request("u1", "Alice", "mapillary", &[item("a")], "sealed")
        .await
        .unwrap();
    let batchid = requests[0].batchid;

    // Second user edits the request.
    let mut tx = db.pool.begin().await.unwrap();
    UserRepository::upsert_in_tx(&mut tx, "admin_id", "AdminUser")
        .await
        .unwrap();
    tx.commit().await.unwrap();
    repo.update_status(
        requests[0].id,
        UploadStatus::Queued,
        StatusUpdate {
            last_edited_by: Some("admin_id".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let items = repo.get_upload_request(batchid).await.unwrap();
    assert_eq!(items.len(), 1);
    // The stored userid is resolved to the editor's username.
    assert_eq!(items[0].last_edited_by.as_deref(), Some("AdminUser"));

    assert_eq!(users.get_username("admin_id").await.unwrap().unwrap(), "AdminUser");
}

#[tokio::test]
async fn test_list_queued_ids_ordering() {
    let db = setup_db().await;
    let repo = UploadRepository::new(db.pool.clone());
    let requests = repo
        .create_upload_request("u1", "Alice", "mapillary", &[item("a"), item("b")], "sealed")
        .await
        .unwrap();

    repo.acquire_for_processing(requests[0].id).await.unwrap();

    let queued = repo.list_queued_ids(10).await.unwrap();
    assert_eq!(queued, vec![requests[1].id]);
}
