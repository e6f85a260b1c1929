//! Test helpers: a fresh SQLite-backed pool per test.
//!
//! Run with: `cargo test -p curator-db`.

use curator_db::{connect, ensure_schema, DbFlavor, DbPool};
use tempfile::TempDir;

pub struct TestDb {
    pub pool: DbPool,
    _dir: TempDir,
}

pub async fn setup_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("test.sqlite").display()
    );
    let pool = connect(&url).await.expect("connect");
    ensure_schema(&pool, DbFlavor::Sqlite).await.expect("schema");
    TestDb { pool, _dir: dir }
}
