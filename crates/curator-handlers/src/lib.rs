//! Provider handlers.
//!
//! A handler adapts one photo provider into the normalized shapes the rest of
//! the pipeline consumes: `MediaImage` records, existing-page lookups, and a
//! canonical proposed SDC claim list. The registry resolves a provider tag to
//! its handler at enqueue time; an unknown tag is a configuration error and
//! never reaches a worker.

pub mod commons_search;
pub mod flickr;
pub mod mapillary;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use curator_core::constants::entity;
use curator_core::models::{ExistingPage, MediaImage};
use curator_core::sdc::Statement;
use curator_core::AppError;

pub use commons_search::CommonsSearch;
pub use flickr::FlickrHandler;
pub use mapillary::MapillaryHandler;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    NotFound(String),

    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Operation canceled")]
    Canceled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Transient failures are worth retrying; everything else is terminal on
    /// first observation.
    pub fn is_transient(&self) -> bool {
        match self {
            HandlerError::Network(_) => true,
            HandlerError::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<HandlerError> for AppError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::NotFound(message) => AppError::NotFound(message),
            HandlerError::Upstream { status, body } => AppError::Upstream { status, body },
            HandlerError::Network(err) => AppError::Upstream {
                status: 502,
                body: err.to_string(),
            },
            HandlerError::Canceled => AppError::Canceled,
            HandlerError::Other(err) => AppError::InternalWithSource {
                message: "Handler error".to_string(),
                source: err,
            },
        }
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// Provider tag, e.g. `"mapillary"`.
    fn name(&self) -> &'static str;

    /// Wikidata property holding this provider's photo id on Commons.
    fn photo_id_property(&self) -> &'static str;

    /// All images of an album/sequence, keyed by image id.
    async fn fetch_collection(
        &self,
        input: &str,
    ) -> Result<BTreeMap<String, MediaImage>, HandlerError>;

    /// Metadata for one image. With `input` present the image must be found
    /// inside that collection; there is no single-image fallback.
    async fn fetch_image_metadata(
        &self,
        image_id: &str,
        input: Option<&str>,
    ) -> Result<MediaImage, HandlerError>;

    /// Commons file pages already carrying this provider's photo id, per
    /// image id.
    async fn fetch_existing_pages(
        &self,
        image_ids: &[String],
    ) -> Result<HashMap<String, Vec<ExistingPage>>, HandlerError>;

    /// Canonical proposed SDC for an image. Deterministic for a given record.
    fn build_sdc(&self, image: &MediaImage) -> Vec<Statement>;
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn get(&self, tag: &str) -> Result<Arc<dyn Handler>, AppError> {
        self.handlers
            .get(tag)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("Unknown handler: {}", tag)))
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

/// Map a normalized license tag to its Wikidata item.
pub fn license_entity(license: &str) -> Option<&'static str> {
    match license {
        "cc-by-sa-4.0" => Some(entity::CC_BY_SA_4_0),
        "cc-by-4.0" => Some(entity::CC_BY_4_0),
        "cc-by-sa-2.0" => Some(entity::CC_BY_SA_2_0),
        "cc-by-2.0" => Some(entity::CC_BY_2_0),
        "cc0" => Some(entity::CC_ZERO),
        _ => None,
    }
}
