//! Schema bootstrap.
//!
//! Migrations proper live outside the core; this module creates the tables
//! and indexes when they do not exist yet, with DDL per dialect. ToolsDB is
//! MariaDB, which accepts `CREATE INDEX IF NOT EXISTS`.

use curator_core::AppError;

use crate::pool::{DbFlavor, DbPool};

const SQLITE_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        userid VARCHAR(255) PRIMARY KEY,
        username VARCHAR(255) NOT NULL,
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_users_username ON users (username)",
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_uid VARCHAR(255) NOT NULL UNIQUE,
        userid VARCHAR(255) NOT NULL REFERENCES users (userid),
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_batches_userid ON batches (userid)",
    r#"
    CREATE TABLE IF NOT EXISTS upload_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        batchid INTEGER NOT NULL REFERENCES batches (id),
        userid VARCHAR(255) NOT NULL REFERENCES users (userid),
        status VARCHAR(50) NOT NULL,
        `key` VARCHAR(255) NOT NULL,
        handler VARCHAR(255) NOT NULL,
        filename VARCHAR(255) NOT NULL,
        wikitext TEXT,
        sdc TEXT,
        sdc_v2 TEXT,
        labels TEXT,
        collection VARCHAR(255),
        copyright_override INTEGER NOT NULL DEFAULT 0,
        result TEXT,
        error TEXT,
        success TEXT,
        access_token TEXT,
        last_edited_by VARCHAR(255) REFERENCES users (userid),
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_status ON upload_requests (status)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_key ON upload_requests (`key`)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_handler ON upload_requests (handler)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_filename ON upload_requests (filename)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_batch_stats ON upload_requests (batchid, status, updated_at)",
    r#"
    CREATE TABLE IF NOT EXISTS presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        userid VARCHAR(255) NOT NULL REFERENCES users (userid),
        handler VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL,
        wikitext TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL,
        UNIQUE (userid, handler, name)
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS ix_presets_unique_default ON presets (userid, handler) WHERE is_default",
];

const MYSQL_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        userid VARCHAR(255) PRIMARY KEY,
        username VARCHAR(255) NOT NULL,
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_users_username ON users (username)",
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        batch_uid VARCHAR(255) NOT NULL UNIQUE,
        userid VARCHAR(255) NOT NULL,
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_batches_userid ON batches (userid)",
    r#"
    CREATE TABLE IF NOT EXISTS upload_requests (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        batchid BIGINT NOT NULL,
        userid VARCHAR(255) NOT NULL,
        status VARCHAR(50) NOT NULL,
        `key` VARCHAR(255) NOT NULL,
        handler VARCHAR(255) NOT NULL,
        filename VARCHAR(255) NOT NULL,
        wikitext TEXT,
        sdc TEXT,
        sdc_v2 TEXT,
        labels TEXT,
        collection VARCHAR(255),
        copyright_override INTEGER NOT NULL DEFAULT 0,
        result TEXT,
        error TEXT,
        success TEXT,
        access_token TEXT,
        last_edited_by VARCHAR(255),
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_status ON upload_requests (status)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_key ON upload_requests (`key`)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_handler ON upload_requests (handler)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_filename ON upload_requests (filename)",
    "CREATE INDEX IF NOT EXISTS ix_upload_requests_batch_stats ON upload_requests (batchid, status, updated_at)",
    r#"
    CREATE TABLE IF NOT EXISTS presets (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        userid VARCHAR(255) NOT NULL,
        handler VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL,
        wikitext TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        created_at VARCHAR(64) NOT NULL,
        updated_at VARCHAR(64) NOT NULL,
        UNIQUE KEY ix_presets_user_handler_name (userid, handler, name)
    )
    "#,
    // MariaDB has no partial indexes; the single-default invariant is
    // enforced transactionally in PresetRepository for this dialect.
];

pub async fn ensure_schema(pool: &DbPool, flavor: DbFlavor) -> Result<(), AppError> {
    let statements = match flavor {
        DbFlavor::Sqlite => SQLITE_DDL,
        DbFlavor::MySql => MYSQL_DDL,
    };

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
    }

    tracing::debug!(statements = statements.len(), "Schema ensured");
    Ok(())
}
