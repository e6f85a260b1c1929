//! Row mapping helpers shared by the repositories.

use chrono::{DateTime, SecondsFormat, Utc};
use curator_core::AppError;

/// Fixed-width RFC 3339 with microseconds: lexicographic order matches
/// chronological order, which the `(batchid, status, updated_at)` index
/// relies on.
pub fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    fmt_ts(Utc::now())
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid stored timestamp {:?}: {}", s, e)))
}

/// Deserialize an optional JSON text column.
pub fn parse_json_opt<T: serde::de::DeserializeOwned>(
    column: &str,
    value: Option<String>,
) -> Result<Option<T>, AppError> {
    value
        .map(|s| {
            serde_json::from_str(&s).map_err(|e| {
                AppError::Internal(format!("Invalid JSON in column {}: {}", column, e))
            })
        })
        .transpose()
}

/// Serialize an optional value into a JSON text column.
pub fn to_json_opt<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>, AppError> {
    value
        .map(|v| {
            serde_json::to_string(v)
                .map_err(|e| AppError::Internal(format!("Failed to serialize column: {}", e)))
        })
        .transpose()
}
