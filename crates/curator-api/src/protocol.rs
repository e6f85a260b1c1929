//! Live-progress channel protocol.
//!
//! Envelopes are tagged unions discriminated by `type`. Unknown
//! discriminators fail validation and the offending message is rejected
//! without tearing down the connection. Outbound payloads strip null fields.

use std::collections::BTreeMap;

use curator_core::models::{
    Batch, BatchStats, BatchUploadItem, ImageCreator, MediaImage, NewUploadItem, UploadDelta,
    UploadStatus,
};
use serde::{Deserialize, Serialize};

pub const WS_CHANNEL_ADDRESS: &str = "/ws";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadData {
    pub handler: String,
    pub items: Vec<NewUploadItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FetchBatchesData {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub userid: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "FETCH_IMAGES")]
    FetchImages { data: String, handler: String },
    #[serde(rename = "UPLOAD")]
    Upload { data: UploadData },
    #[serde(rename = "SUBSCRIBE_BATCH")]
    SubscribeBatch { data: i64 },
    #[serde(rename = "FETCH_BATCHES")]
    FetchBatches { data: FetchBatchesData },
    #[serde(rename = "FETCH_BATCH_UPLOADS")]
    FetchBatchUploads { data: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionImagesData {
    pub creator: ImageCreator,
    pub images: Vec<MediaImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadCreatedItem {
    pub id: i64,
    pub status: UploadStatus,
    pub image_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub batch_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchesListData {
    pub items: Vec<Batch>,
    pub total: i64,
    pub stats: BTreeMap<i64, BatchStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ERROR")]
    Error { data: String },
    #[serde(rename = "COLLECTION_IMAGES")]
    CollectionImages { data: CollectionImagesData },
    #[serde(rename = "UPLOAD_CREATED")]
    UploadCreated { data: Vec<UploadCreatedItem> },
    #[serde(rename = "BATCHES_LIST")]
    BatchesList { data: BatchesListData },
    #[serde(rename = "BATCH_UPLOADS_LIST")]
    BatchUploadsList { data: Vec<BatchUploadItem> },
    #[serde(rename = "SUBSCRIBED")]
    Subscribed { data: i64 },
    #[serde(rename = "UPLOADS_UPDATE")]
    UploadsUpdate { data: Vec<UploadDelta> },
    #[serde(rename = "UPLOADS_COMPLETE")]
    UploadsComplete { data: i64 },
}
