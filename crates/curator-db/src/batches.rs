//! Batch repository.

use curator_core::models::Batch;
use curator_core::AppError;
use sqlx::Row;

use crate::pool::DbPool;
use crate::row::parse_ts;

#[derive(Clone)]
pub struct BatchRepository {
    pool: DbPool,
}

impl BatchRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_batch(&self, id: i64) -> Result<Option<Batch>, AppError> {
        let row = sqlx::query(
            "SELECT id, batch_uid, userid, created_at, updated_at FROM batches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| batch_from_row(&row)).transpose()
    }

    /// Page through batches, newest first, optionally scoped to one user.
    #[tracing::instrument(skip(self))]
    pub async fn get_batches(
        &self,
        offset: i64,
        limit: i64,
        userid: Option<&str>,
    ) -> Result<Vec<Batch>, AppError> {
        let rows = match userid {
            Some(userid) => {
                sqlx::query(
                    r#"
                    SELECT id, batch_uid, userid, created_at, updated_at
                    FROM batches
                    WHERE userid = ?
                    ORDER BY id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(userid)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, batch_uid, userid, created_at, updated_at
                    FROM batches
                    ORDER BY id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(batch_from_row).collect()
    }

    pub async fn count_batches(&self, userid: Option<&str>) -> Result<i64, AppError> {
        let row = match userid {
            Some(userid) => {
                sqlx::query("SELECT COUNT(*) AS n FROM batches WHERE userid = ?")
                    .bind(userid)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT COUNT(*) AS n FROM batches")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.try_get("n")?)
    }
}

fn batch_from_row(row: &sqlx::any::AnyRow) -> Result<Batch, AppError> {
    Ok(Batch {
        id: row.try_get("id")?,
        batch_uid: row.try_get("batch_uid")?,
        userid: row.try_get("userid")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}
