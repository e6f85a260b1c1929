//! Test rig: SQLite-backed repositories plus mock handler, wiki client, and
//! progress recorder.
//!
//! Run with: `cargo test -p curator-worker`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use curator_commons::{
    StreamingDownload, UploadReceipt, WikiClient, WikiClientFactory, WikiError,
};
use curator_core::models::{
    CameraInfo, ErrorLink, ExistingPage, ImageCreator, ImageDates, ImageDimensions, ImageUrls,
    Label, MediaImage, NewUploadItem, UploadDelta,
};
use curator_core::sdc::{DataValue, Snak, Statement};
use curator_core::{AccessToken, TokenVault};
use curator_db::{connect, ensure_schema, DbFlavor, DbPool, UploadRepository, UserRepository};
use curator_handlers::{Handler, HandlerError, HandlerRegistry};
use curator_worker::{MediaFetcher, ProgressSink, RetryPolicy, WorkerContext};
use tempfile::{NamedTempFile, TempDir};

pub const TEST_KEY: &[u8; 32] = b"01234567890123456789012345678901";

pub fn test_image() -> MediaImage {
    MediaImage {
        id: "img1".to_string(),
        title: "Photo from Mapillary 2020-09-13 (img1).jpg".to_string(),
        dates: ImageDates { taken: Utc::now() },
        creator: ImageCreator {
            id: "u1".to_string(),
            username: "user1".to_string(),
            profile_url: "https://www.mapillary.com/app/user/user1".to_string(),
        },
        urls: ImageUrls {
            original: "https://provider.example/img1.jpg".to_string(),
            preview: "https://provider.example/img1_1024.jpg".to_string(),
            thumbnail: "https://provider.example/img1_256.jpg".to_string(),
            page: None,
        },
        location: None,
        dimensions: ImageDimensions {
            width: 100,
            height: 100,
        },
        camera: CameraInfo::default(),
        license: None,
        tags: None,
        existing: None,
    }
}

pub fn photo_id_statement(id: &str) -> Statement {
    Statement::new(Snak::value("P1947", DataValue::String(id.to_string())))
}

pub struct MockHandler {
    pub fail_metadata: Option<String>,
    pub sdc: Vec<Statement>,
}

impl Default for MockHandler {
    fn default() -> Self {
        Self {
            fail_metadata: None,
            sdc: vec![photo_id_statement("img1")],
        }
    }
}

#[async_trait]
impl Handler for MockHandler {
    fn name(&self) -> &'static str {
        "mapillary"
    }

    fn photo_id_property(&self) -> &'static str {
        "P1947"
    }

    async fn fetch_collection(
        &self,
        _input: &str,
    ) -> Result<BTreeMap<String, MediaImage>, HandlerError> {
        let image = test_image();
        Ok(BTreeMap::from([(image.id.clone(), image)]))
    }

    async fn fetch_image_metadata(
        &self,
        _image_id: &str,
        _input: Option<&str>,
    ) -> Result<MediaImage, HandlerError> {
        match &self.fail_metadata {
            Some(message) => Err(HandlerError::NotFound(message.clone())),
            None => Ok(test_image()),
        }
    }

    async fn fetch_existing_pages(
        &self,
        image_ids: &[String],
    ) -> Result<HashMap<String, Vec<ExistingPage>>, HandlerError> {
        Ok(image_ids.iter().map(|id| (id.clone(), Vec::new())).collect())
    }

    fn build_sdc(&self, _image: &MediaImage) -> Vec<Statement> {
        self.sdc.clone()
    }
}

#[derive(Default)]
pub struct MockWiki {
    pub blacklist_reason: Option<String>,
    pub duplicates: Vec<ErrorLink>,
    pub existing_sdc: Option<Vec<Statement>>,
    /// Number of upload attempts that fail with `HashLock` before success.
    pub hash_lock_failures: usize,
    pub upload_attempts: AtomicUsize,
    pub seen_sha1: Mutex<Option<String>>,
    pub applied_sdc: Mutex<Vec<Vec<Statement>>>,
}

#[async_trait]
impl WikiClient for MockWiki {
    async fn check_title_blacklisted(&self, _title: &str) -> Result<Option<String>, WikiError> {
        Ok(self.blacklist_reason.clone())
    }

    async fn find_duplicates(&self, content_sha1: &str) -> Result<Vec<ErrorLink>, WikiError> {
        *self.seen_sha1.lock().unwrap() = Some(content_sha1.to_string());
        Ok(self.duplicates.clone())
    }

    async fn fetch_sdc(&self, _title: &str) -> Result<Option<Vec<Statement>>, WikiError> {
        Ok(self.existing_sdc.clone())
    }

    async fn upload_chunked(
        &self,
        _local_path: &Path,
        content_sha1: &str,
        target_title: &str,
        _wikitext: &str,
        _edit_summary: &str,
        _edit_group: &str,
    ) -> Result<UploadReceipt, WikiError> {
        let attempt = self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.hash_lock_failures {
            return Err(WikiError::HashLock {
                sha1: content_sha1.to_string(),
            });
        }
        Ok(UploadReceipt {
            title: format!("File:{}", target_title),
            url: format!(
                "https://commons.wikimedia.org/wiki/File:{}",
                target_title.replace(' ', "_")
            ),
        })
    }

    async fn apply_sdc(
        &self,
        _title: &str,
        statements: &[Statement],
        _labels: Option<&BTreeMap<String, Label>>,
        _edit_summary: &str,
    ) -> Result<(), WikiError> {
        self.applied_sdc.lock().unwrap().push(statements.to_vec());
        Ok(())
    }
}

pub struct MockWikiFactory {
    pub wiki: Arc<MockWiki>,
}

impl WikiClientFactory for MockWikiFactory {
    fn create(&self, _token: &AccessToken, _username: &str) -> Arc<dyn WikiClient> {
        Arc::clone(&self.wiki) as Arc<dyn WikiClient>
    }
}

/// Serves fixed bytes instead of hitting the network.
pub struct MockFetcher {
    pub content: Vec<u8>,
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<(NamedTempFile, String), WikiError> {
        let mut download = StreamingDownload::new()?;
        download.write_chunk(&self.content)?;
        download.finish()
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<(i64, UploadDelta)>>,
    pub completes: Mutex<Vec<i64>>,
}

impl ProgressSink for RecordingProgress {
    fn publish_update(&self, batchid: i64, delta: UploadDelta) {
        self.updates.lock().unwrap().push((batchid, delta));
    }

    fn publish_complete(&self, batchid: i64) {
        self.completes.lock().unwrap().push(batchid);
    }
}

pub struct TestRig {
    pub ctx: Arc<WorkerContext>,
    pub pool: DbPool,
    pub uploads: UploadRepository,
    pub wiki: Arc<MockWiki>,
    pub progress: Arc<RecordingProgress>,
    pub vault: TokenVault,
    _dir: TempDir,
}

pub async fn setup_rig(handler: MockHandler, wiki: MockWiki) -> TestRig {
    let dir = TempDir::new().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("test.sqlite").display()
    );
    let pool = connect(&url).await.expect("connect");
    ensure_schema(&pool, DbFlavor::Sqlite).await.expect("schema");

    let vault = TokenVault::from_key_bytes(TEST_KEY).unwrap();
    let wiki = Arc::new(wiki);
    let progress = Arc::new(RecordingProgress::default());

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(handler));

    let uploads = UploadRepository::new(pool.clone());
    let ctx = Arc::new(WorkerContext {
        uploads: uploads.clone(),
        users: UserRepository::new(pool.clone()),
        registry,
        vault: vault.clone(),
        wiki_factory: Arc::new(MockWikiFactory {
            wiki: Arc::clone(&wiki),
        }),
        media: Arc::new(MockFetcher {
            content: b"abc".to_vec(),
        }),
        progress: Arc::clone(&progress) as Arc<dyn ProgressSink>,
        retry: RetryPolicy::immediate(3),
    });

    TestRig {
        ctx,
        pool,
        uploads,
        wiki,
        progress,
        vault,
        _dir: dir,
    }
}

/// Persist one queued request with a sealed test token and return its id.
pub async fn enqueue_one(rig: &TestRig) -> i64 {
    enqueue_one_with(rig, |_| {}).await
}

pub async fn enqueue_one_with(rig: &TestRig, customize: impl FnOnce(&mut NewUploadItem)) -> i64 {
    let sealed = rig.vault.seal(&AccessToken::new("t", "s")).unwrap();
    let mut item = NewUploadItem {
        id: "img1".to_string(),
        input: Some("seq123".to_string()),
        title: "Test.jpg".to_string(),
        wikitext: "== Summary ==".to_string(),
        copyright_override: false,
        sdc: None,
        labels: None,
    };
    customize(&mut item);

    let requests = rig
        .uploads
        .create_upload_request("u1", "Alice", "mapillary", &[item], &sealed)
        .await
        .unwrap();
    requests[0].id
}
