//! Users, batches, upload requests, and their derived views.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::Label;
use super::time::iso_z;
use crate::sdc::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Duplicate,
}

impl UploadStatus {
    /// Terminal states admit no further transition and require the sealed
    /// token to be wiped.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Duplicate
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Queued => "queued",
            UploadStatus::InProgress => "in_progress",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Duplicate => "duplicate",
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(UploadStatus::Queued),
            "in_progress" => Ok(UploadStatus::InProgress),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            "duplicate" => Ok(UploadStatus::Duplicate),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// A wiki file page link surfaced in a duplicate outcome. The url is the
/// file *page* (`/wiki/File:…`), never the raw media url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLink {
    pub title: String,
    pub url: String,
}

/// Structured outcome payload persisted on `upload_requests.error` and
/// streamed to subscribers verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UploadError {
    Error {
        message: String,
    },
    Duplicate {
        message: String,
        links: Vec<ErrorLink>,
    },
    Blacklisted {
        message: String,
        reason: String,
    },
}

impl UploadError {
    pub fn message(&self) -> &str {
        match self {
            UploadError::Error { message }
            | UploadError::Duplicate { message, .. }
            | UploadError::Blacklisted { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub userid: String,
    pub username: String,
    #[serde(with = "iso_z")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_z")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub batch_uid: String,
    pub userid: String,
    #[serde(with = "iso_z")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_z")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub id: i64,
    pub batchid: i64,
    pub userid: String,
    /// Provider-local image id.
    pub key: String,
    pub handler: String,
    /// Target wiki title without the `File:` namespace prefix.
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikitext: Option<String>,
    /// Proposed claim list supplied by the client; when absent the worker
    /// derives it from the handler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdc: Option<Vec<Statement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, Label>>,
    /// Provider album/sequence context the image was selected from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    pub copyright_override: bool,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    /// Sealed credential ciphertext; non-null only while the request is open.
    #[serde(skip)]
    pub access_token: Option<String>,
    /// Userid of the last editor; resolved to a username for presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
    #[serde(with = "iso_z")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_z")]
    pub updated_at: DateTime<Utc>,
}

/// One item of an upload submission, as received from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUploadItem {
    /// Provider-local image id.
    pub id: String,
    /// Provider album/sequence the image was selected from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Target wiki title without the `File:` namespace prefix.
    pub title: String,
    pub wikitext: String,
    #[serde(default)]
    pub copyright_override: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdc: Option<Vec<Statement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, Label>>,
}

/// Per-user saved defaults for one handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: i64,
    pub userid: String,
    pub handler: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikitext: Option<String>,
    pub is_default: bool,
    #[serde(with = "iso_z")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_z")]
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counts over a batch's requests. Always the arithmetic sum:
/// `total` equals the other five added together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: i64,
    pub queued: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub duplicate: i64,
}

impl BatchStats {
    pub fn add(&mut self, status: UploadStatus, count: i64) {
        self.total += count;
        match status {
            UploadStatus::Queued => self.queued += count,
            UploadStatus::InProgress => self.in_progress += count,
            UploadStatus::Completed => self.completed += count,
            UploadStatus::Failed => self.failed += count,
            UploadStatus::Duplicate => self.duplicate += count,
        }
    }

    /// Requests that have not reached a terminal state yet.
    pub fn open(&self) -> i64 {
        self.queued + self.in_progress
    }
}

/// Minimal per-request delta streamed to batch subscribers on every status
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadDelta {
    pub id: i64,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadError>,
    #[serde(with = "iso_z")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
}

/// Presentation row for batch upload listings; `last_edited_by` here is the
/// editor's username, not the stored userid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchUploadItem {
    pub id: i64,
    pub batchid: i64,
    pub userid: String,
    pub key: String,
    pub handler: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikitext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, Label>>,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
    #[serde(with = "iso_z")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_z")]
    pub updated_at: DateTime<Utc>,
}
