//! Upload request repository: creation, atomic status transitions, listings,
//! and aggregate statistics.

use std::collections::HashMap;
use std::str::FromStr;

use curator_core::models::{
    BatchStats, BatchUploadItem, NewUploadItem, UploadError, UploadRequest, UploadStatus,
};
use curator_core::AppError;
use sqlx::{any::AnyRow, Row};
use uuid::Uuid;

use crate::pool::DbPool;
use crate::row::{now_ts, parse_json_opt, parse_ts, to_json_opt};
use crate::users::UserRepository;

/// Outcome fields accompanying a status transition. Absent fields leave the
/// stored columns untouched.
#[derive(Debug, Default, Clone)]
pub struct StatusUpdate {
    pub result: Option<String>,
    pub error: Option<UploadError>,
    pub success: Option<String>,
    pub last_edited_by: Option<String>,
}

#[derive(Clone)]
pub struct UploadRepository {
    pool: DbPool,
}

impl UploadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a batch of upload requests in one transaction: upsert the user,
    /// open a new batch, insert one `queued` row per item with the sealed
    /// token attached.
    #[tracing::instrument(skip(self, items, sealed_token))]
    pub async fn create_upload_request(
        &self,
        userid: &str,
        username: &str,
        handler: &str,
        items: &[NewUploadItem],
        sealed_token: &str,
    ) -> Result<Vec<UploadRequest>, AppError> {
        let mut tx = self.pool.begin().await?;
        let now = now_ts();
        let created_at = parse_ts(&now)?;

        UserRepository::upsert_in_tx(&mut tx, userid, username).await?;

        let batch_uid = Uuid::new_v4().to_string();
        let batch_result = sqlx::query(
            "INSERT INTO batches (batch_uid, userid, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&batch_uid)
        .bind(userid)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        let batchid = batch_result
            .last_insert_id()
            .ok_or_else(|| AppError::Internal("No batch id returned by insert".to_string()))?;

        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            let sdc_json = to_json_opt(item.sdc.as_ref())?;
            let labels_json = to_json_opt(item.labels.as_ref())?;

            let insert = sqlx::query(
                r#"
                INSERT INTO upload_requests
                    (batchid, userid, status, `key`, handler, filename, wikitext,
                     sdc_v2, labels, collection, copyright_override, access_token,
                     created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(batchid)
            .bind(userid)
            .bind(UploadStatus::Queued.as_str())
            .bind(&item.id)
            .bind(handler)
            .bind(&item.title)
            .bind(&item.wikitext)
            .bind(&sdc_json)
            .bind(&labels_json)
            .bind(&item.input)
            .bind(i64::from(item.copyright_override))
            .bind(sealed_token)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            let id = insert
                .last_insert_id()
                .ok_or_else(|| AppError::Internal("No request id returned by insert".to_string()))?;

            requests.push(UploadRequest {
                id,
                batchid,
                userid: userid.to_string(),
                key: item.id.clone(),
                handler: handler.to_string(),
                filename: item.title.clone(),
                wikitext: Some(item.wikitext.clone()),
                sdc: item.sdc.clone(),
                labels: item.labels.clone(),
                collection: item.input.clone(),
                copyright_override: item.copyright_override,
                status: UploadStatus::Queued,
                result: None,
                error: None,
                success: None,
                access_token: Some(sealed_token.to_string()),
                last_edited_by: None,
                created_at,
                updated_at: created_at,
            });
        }

        tx.commit().await?;

        tracing::info!(
            batchid = batchid,
            batch_uid = %batch_uid,
            requests = requests.len(),
            "Upload batch created"
        );
        Ok(requests)
    }

    pub async fn get_by_id(&self, upload_id: i64) -> Result<Option<UploadRequest>, AppError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_REQUEST))
            .bind(upload_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| upload_from_row(&row)).transpose()
    }

    /// Take the processing lease on a queued row. The conditional update is
    /// the sole exactly-once mechanism: a second worker observing the same id
    /// either sees a non-queued status or loses the conditional update, and
    /// gets `None` both ways.
    #[tracing::instrument(skip(self))]
    pub async fn acquire_for_processing(
        &self,
        upload_id: i64,
    ) -> Result<Option<UploadRequest>, AppError> {
        let Some(request) = self.get_by_id(upload_id).await? else {
            tracing::warn!(upload_id, "Upload request not found");
            return Ok(None);
        };
        if request.status != UploadStatus::Queued {
            tracing::debug!(upload_id, status = %request.status, "Request already owned, skipping");
            return Ok(None);
        }

        let result = sqlx::query(
            "UPDATE upload_requests SET status = 'in_progress', updated_at = ? WHERE id = ? AND status = 'queued'",
        )
        .bind(now_ts())
        .bind(upload_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(upload_id, "Lost the acquisition race");
            return Ok(None);
        }

        self.get_by_id(upload_id).await
    }

    /// Atomic status transition. Entering a terminal status wipes the sealed
    /// token in the same statement.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_status(
        &self,
        upload_id: i64,
        status: UploadStatus,
        update: StatusUpdate,
    ) -> Result<(), AppError> {
        let error_json = to_json_opt(update.error.as_ref())?;

        let sql = if status.is_terminal() {
            r#"
            UPDATE upload_requests
            SET status = ?,
                result = COALESCE(?, result),
                error = COALESCE(?, error),
                success = COALESCE(?, success),
                last_edited_by = COALESCE(?, last_edited_by),
                access_token = NULL,
                updated_at = ?
            WHERE id = ?
            "#
        } else {
            r#"
            UPDATE upload_requests
            SET status = ?,
                result = COALESCE(?, result),
                error = COALESCE(?, error),
                success = COALESCE(?, success),
                last_edited_by = COALESCE(?, last_edited_by),
                updated_at = ?
            WHERE id = ?
            "#
        };

        sqlx::query(sql)
            .bind(status.as_str())
            .bind(&update.result)
            .bind(&error_json)
            .bind(&update.success)
            .bind(&update.last_edited_by)
            .bind(now_ts())
            .bind(upload_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Presentation listing for one batch; `last_edited_by` is resolved to
    /// the editor's username.
    #[tracing::instrument(skip(self))]
    pub async fn get_upload_request(
        &self,
        batchid: i64,
    ) -> Result<Vec<BatchUploadItem>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE u.batchid = ? ORDER BY u.id",
            SELECT_ITEM
        ))
        .bind(batchid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// Admin listing across all batches.
    pub async fn get_all(&self, offset: i64, limit: i64) -> Result<Vec<BatchUploadItem>, AppError> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY u.id DESC LIMIT ? OFFSET ?",
            SELECT_ITEM
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    pub async fn count_all(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM upload_requests")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Aggregate per-batch statistics with a single grouped query. Requested
    /// batch ids with no rows come back as zero records; statuses with no
    /// rows count zero.
    #[tracing::instrument(skip(self))]
    pub async fn get_batches_stats(
        &self,
        batch_ids: &[i64],
    ) -> Result<HashMap<i64, BatchStats>, AppError> {
        let mut stats: HashMap<i64, BatchStats> = batch_ids
            .iter()
            .map(|id| (*id, BatchStats::default()))
            .collect();

        if batch_ids.is_empty() {
            return Ok(stats);
        }

        let placeholders = vec!["?"; batch_ids.len()].join(", ");
        let sql = format!(
            "SELECT batchid, status, COUNT(*) AS n FROM upload_requests WHERE batchid IN ({}) GROUP BY batchid, status",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in batch_ids {
            query = query.bind(*id);
        }

        for row in query.fetch_all(&self.pool).await? {
            let batchid: i64 = row.try_get("batchid")?;
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("n")?;
            let status = UploadStatus::from_str(&status)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            stats.entry(batchid).or_default().add(status, count);
        }

        Ok(stats)
    }

    /// Requests in the batch that have not reached a terminal state.
    pub async fn count_open_for_batch(&self, batchid: i64) -> Result<i64, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM upload_requests WHERE batchid = ? AND status IN ('queued', 'in_progress')",
        )
        .bind(batchid)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("n")?)
    }

    /// Oldest queued ids, for the worker's poll fallback.
    pub async fn list_queued_ids(&self, limit: i64) -> Result<Vec<i64>, AppError> {
        let rows = sqlx::query(
            "SELECT id FROM upload_requests WHERE status = 'queued' ORDER BY id LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(AppError::from))
            .collect()
    }
}

const SELECT_REQUEST: &str = r#"
    SELECT id, batchid, userid, status, `key`, handler, filename, wikitext,
           sdc_v2, labels, collection, copyright_override, result, error,
           success, access_token, last_edited_by, created_at, updated_at
    FROM upload_requests
"#;

const SELECT_ITEM: &str = r#"
    SELECT u.id, u.batchid, u.userid, u.status, u.`key`, u.handler, u.filename,
           u.wikitext, u.labels, u.result, u.error, u.success,
           u.created_at, u.updated_at,
           editor.username AS last_editor_username
    FROM upload_requests u
    LEFT JOIN users editor ON editor.userid = u.last_edited_by
"#;

fn upload_from_row(row: &AnyRow) -> Result<UploadRequest, AppError> {
    let status: String = row.try_get("status")?;
    Ok(UploadRequest {
        id: row.try_get("id")?,
        batchid: row.try_get("batchid")?,
        userid: row.try_get("userid")?,
        key: row.try_get("key")?,
        handler: row.try_get("handler")?,
        filename: row.try_get("filename")?,
        wikitext: row.try_get("wikitext")?,
        sdc: parse_json_opt("sdc_v2", row.try_get("sdc_v2")?)?,
        labels: parse_json_opt("labels", row.try_get("labels")?)?,
        collection: row.try_get("collection")?,
        copyright_override: row.try_get::<i64, _>("copyright_override")? != 0,
        status: UploadStatus::from_str(&status).map_err(|e| AppError::Internal(e.to_string()))?,
        result: row.try_get("result")?,
        error: parse_json_opt("error", row.try_get("error")?)?,
        success: row.try_get("success")?,
        access_token: row.try_get("access_token")?,
        last_edited_by: row.try_get("last_edited_by")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn item_from_row(row: &AnyRow) -> Result<BatchUploadItem, AppError> {
    let status: String = row.try_get("status")?;
    Ok(BatchUploadItem {
        id: row.try_get("id")?,
        batchid: row.try_get("batchid")?,
        userid: row.try_get("userid")?,
        key: row.try_get("key")?,
        handler: row.try_get("handler")?,
        filename: row.try_get("filename")?,
        wikitext: row.try_get("wikitext")?,
        labels: parse_json_opt("labels", row.try_get("labels")?)?,
        status: UploadStatus::from_str(&status).map_err(|e| AppError::Internal(e.to_string()))?,
        result: row.try_get("result")?,
        error: parse_json_opt("error", row.try_get("error")?)?,
        success: row.try_get("success")?,
        last_edited_by: row.try_get("last_editor_username")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}
