//! Test helpers: app state over a throwaway SQLite database with a mocked
//! handler and wiki client, so no test touches the network.
//!
//! Run with: `cargo test -p curator-api`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use curator_api::hub::ProgressHub;
use curator_api::session::{SessionStore, UserSession};
use curator_api::setup::build_router;
use curator_api::state::AppState;
use curator_commons::{
    StreamingDownload, UploadReceipt, WikiClient, WikiClientFactory, WikiError,
};
use curator_core::config::USER_AGENT;
use curator_core::models::{
    CameraInfo, ErrorLink, ExistingPage, ImageCreator, ImageDates, ImageDimensions, ImageUrls,
    Label, MediaImage,
};
use curator_core::sdc::{DataValue, Snak, Statement};
use curator_core::{AccessToken, Config, TokenVault};
use curator_db::{
    connect, ensure_schema, BatchRepository, DbFlavor, PresetRepository, UploadRepository,
    UserRepository,
};
use curator_handlers::{Handler, HandlerError, HandlerRegistry};
use curator_worker::{
    MediaFetcher, ProgressSink, RetryPolicy, UploadQueue, UploadQueueConfig, WorkerContext,
};
use tempfile::{NamedTempFile, TempDir};

pub const TEST_KEY: &[u8; 32] = b"01234567890123456789012345678901";

pub struct StubHandler;

#[async_trait]
impl Handler for StubHandler {
    fn name(&self) -> &'static str {
        "mapillary"
    }

    fn photo_id_property(&self) -> &'static str {
        "P1947"
    }

    async fn fetch_collection(
        &self,
        input: &str,
    ) -> Result<BTreeMap<String, MediaImage>, HandlerError> {
        if input == "missing" {
            return Ok(BTreeMap::new());
        }
        let image = stub_image();
        Ok(BTreeMap::from([(image.id.clone(), image)]))
    }

    async fn fetch_image_metadata(
        &self,
        _image_id: &str,
        _input: Option<&str>,
    ) -> Result<MediaImage, HandlerError> {
        Ok(stub_image())
    }

    async fn fetch_existing_pages(
        &self,
        image_ids: &[String],
    ) -> Result<HashMap<String, Vec<ExistingPage>>, HandlerError> {
        Ok(image_ids.iter().map(|id| (id.clone(), Vec::new())).collect())
    }

    fn build_sdc(&self, image: &MediaImage) -> Vec<Statement> {
        vec![Statement::new(Snak::value(
            "P1947",
            DataValue::String(image.id.clone()),
        ))]
    }
}

pub fn stub_image() -> MediaImage {
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

#[derive(Default)]
pub struct StubWiki {
    pub duplicates: Vec<ErrorLink>,
}

#[async_trait]
impl WikiClient for StubWiki {
    async fn check_title_blacklisted(&self, _title: &str) -> Result<Option<String>, WikiError> {
        Ok(None)
    }

    async fn find_duplicates(&self, _content_sha1: &str) -> Result<Vec<ErrorLink>, WikiError> {
        Ok(self.duplicates.clone())
    }

    async fn fetch_sdc(&self, _title: &str) -> Result<Option<Vec<Statement>>, WikiError> {
        Ok(None)
    }

    async fn upload_chunked(
        &self,
        _local_path: &Path,
        _content_sha1: &str,
        target_title: &str,
        _wikitext: &str,
        _edit_summary: &str,
        _edit_group: &str,
    ) -> Result<UploadReceipt, WikiError> {
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
        _statements: &[Statement],
        _labels: Option<&BTreeMap<String, Label>>,
        _edit_summary: &str,
    ) -> Result<(), WikiError> {
        Ok(())
    }
}

pub struct StubWikiFactory {
    pub wiki: Arc<StubWiki>,
}

impl WikiClientFactory for StubWikiFactory {
    fn create(&self, _token: &AccessToken, _username: &str) -> Arc<dyn WikiClient> {
        Arc::clone(&self.wiki) as Arc<dyn WikiClient>
    }
}

pub struct StubFetcher;

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<(NamedTempFile, String), WikiError> {
        let mut download = StreamingDownload::new()?;
        download.write_chunk(b"abc")?;
        download.finish()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Open a session and return the cookie header value.
    pub async fn login(&self, userid: &str, username: &str) -> String {
        let sid = self
            .state
            .sessions
            .create(&UserSession {
                userid: userid.to_string(),
                username: username.to_string(),
                access_token: AccessToken::new("t", "s"),
            })
            .await
            .unwrap();
        format!("curator_session={}", sid)
    }
}

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        token_encryption_key: String::new(),
        commons_api_url: "https://commons.wikimedia.org/w/api.php".to_string(),
        mapillary_api_token: None,
        flickr_api_key: None,
        oauth_consumer_key: None,
        oauth_consumer_secret: None,
        admin_users: vec!["AdminUser".to_string()],
        worker_concurrency: 1,
        server_port: 0,
        user_agent: USER_AGENT.to_string(),
    }
}

pub async fn setup_test_app() -> TestApp {
    let dir = TempDir::new().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("test.sqlite").display()
    );
    let pool = connect(&url).await.expect("connect");
    ensure_schema(&pool, DbFlavor::Sqlite).await.expect("schema");

    let vault = TokenVault::from_key_bytes(TEST_KEY).unwrap();
    let hub = Arc::new(ProgressHub::new());

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(StubHandler));

    let worker_ctx = Arc::new(WorkerContext {
        uploads: UploadRepository::new(pool.clone()),
        users: UserRepository::new(pool.clone()),
        registry: registry.clone(),
        vault: vault.clone(),
        wiki_factory: Arc::new(StubWikiFactory {
            wiki: Arc::new(StubWiki::default()),
        }),
        media: Arc::new(StubFetcher),
        progress: Arc::clone(&hub) as Arc<dyn ProgressSink>,
        retry: RetryPolicy::immediate(3),
    });
    let queue = Arc::new(UploadQueue::start(
        worker_ctx,
        UploadQueueConfig {
            max_workers: 1,
            poll_interval_ms: 50,
        },
    ));

    let state = AppState {
        config: Arc::new(test_config()),
        pool: pool.clone(),
        uploads: UploadRepository::new(pool.clone()),
        batches: BatchRepository::new(pool.clone()),
        users: UserRepository::new(pool.clone()),
        presets: PresetRepository::new(pool.clone()),
        registry,
        vault: vault.clone(),
        hub,
        queue,
        sessions: Arc::new(SessionStore::new(vault)),
    };

    let server = TestServer::new(build_router(state.clone())).expect("test server");
    TestApp {
        server,
        state,
        _dir: dir,
    }
}
