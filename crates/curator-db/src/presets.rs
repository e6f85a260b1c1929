//! Preset repository.
//!
//! Invariant: at most one default preset per `(userid, handler)`. SQLite
//! enforces it with a partial unique index; the clear-then-set transaction
//! below upholds it on both dialects.

use curator_core::models::Preset;
use curator_core::AppError;
use sqlx::{any::AnyRow, Row};

use crate::pool::DbPool;
use crate::row::{now_ts, parse_ts};

#[derive(Clone)]
pub struct PresetRepository {
    pool: DbPool,
}

impl PresetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_presets(&self, userid: &str) -> Result<Vec<Preset>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, userid, handler, name, wikitext, is_default, created_at, updated_at
            FROM presets
            WHERE userid = ?
            ORDER BY handler, name
            "#,
        )
        .bind(userid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(preset_from_row).collect()
    }

    /// Insert or update a preset by `(userid, handler, name)`. Setting a new
    /// default clears the previous one for the pair in the same transaction.
    #[tracing::instrument(skip(self, wikitext))]
    pub async fn upsert_preset(
        &self,
        userid: &str,
        handler: &str,
        name: &str,
        wikitext: Option<&str>,
        is_default: bool,
    ) -> Result<Preset, AppError> {
        let mut tx = self.pool.begin().await?;
        let now = now_ts();

        if is_default {
            sqlx::query(
                "UPDATE presets SET is_default = 0, updated_at = ? WHERE userid = ? AND handler = ? AND is_default = 1",
            )
            .bind(&now)
            .bind(userid)
            .bind(handler)
            .execute(&mut *tx)
            .await?;
        }

        let existing = sqlx::query(
            "SELECT id FROM presets WHERE userid = ? AND handler = ? AND name = ?",
        )
        .bind(userid)
        .bind(handler)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match existing {
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                sqlx::query(
                    "UPDATE presets SET wikitext = ?, is_default = ?, updated_at = ? WHERE id = ?",
                )
                .bind(wikitext)
                .bind(i64::from(is_default))
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO presets (userid, handler, name, wikitext, is_default, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(userid)
                .bind(handler)
                .bind(name)
                .bind(wikitext)
                .bind(i64::from(is_default))
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
                result.last_insert_id().ok_or_else(|| {
                    AppError::Internal("No preset id returned by insert".to_string())
                })?
            }
        };

        tx.commit().await?;

        let created_at = parse_ts(&now)?;
        Ok(Preset {
            id,
            userid: userid.to_string(),
            handler: handler.to_string(),
            name: name.to_string(),
            wikitext: wikitext.map(str::to_string),
            is_default,
            created_at,
            updated_at: created_at,
        })
    }

    pub async fn get_default(
        &self,
        userid: &str,
        handler: &str,
    ) -> Result<Option<Preset>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, userid, handler, name, wikitext, is_default, created_at, updated_at
            FROM presets
            WHERE userid = ? AND handler = ? AND is_default = 1
            "#,
        )
        .bind(userid)
        .bind(handler)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| preset_from_row(&row)).transpose()
    }
}

fn preset_from_row(row: &AnyRow) -> Result<Preset, AppError> {
    Ok(Preset {
        id: row.try_get("id")?,
        userid: row.try_get("userid")?,
        handler: row.try_get("handler")?,
        name: row.try_get("name")?,
        wikitext: row.try_get("wikitext")?,
        is_default: row.try_get::<i64, _>("is_default")? != 0,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}
