//! User repository.

use curator_core::models::User;
use curator_core::AppError;
use sqlx::{Any, Row, Transaction};

use crate::pool::DbPool;
use crate::row::{now_ts, parse_ts};

#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a user inside an open transaction. Select-then-write
    /// keeps the statement portable across dialects; callers hold the
    /// transaction so there is no lost-update window.
    pub async fn upsert_in_tx(
        tx: &mut Transaction<'_, Any>,
        userid: &str,
        username: &str,
    ) -> Result<(), AppError> {
        let existing = sqlx::query("SELECT userid FROM users WHERE userid = ?")
            .bind(userid)
            .fetch_optional(&mut **tx)
            .await?;

        let now = now_ts();
        if existing.is_some() {
            sqlx::query("UPDATE users SET username = ?, updated_at = ? WHERE userid = ?")
                .bind(username)
                .bind(&now)
                .bind(userid)
                .execute(&mut **tx)
                .await?;
        } else {
            sqlx::query(
                "INSERT INTO users (userid, username, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(userid)
            .bind(username)
            .bind(&now)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Standalone upsert wrapping its own transaction.
    pub async fn upsert(&self, userid: &str, username: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_in_tx(&mut tx, userid, username).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT userid, username, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(User {
                    userid: row.try_get("userid")?,
                    username: row.try_get("username")?,
                    created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
                    updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
                })
            })
            .collect()
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn get_username(&self, userid: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT username FROM users WHERE userid = ?")
            .bind(userid)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get("username").map_err(AppError::from))
            .transpose()
    }
}
