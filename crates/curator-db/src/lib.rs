//! Durable persistence for users, batches, upload requests, and presets.
//!
//! Runs on the `sqlx` Any driver so the same repositories serve the SQLite
//! default and the Toolforge ToolsDB (MariaDB) deployment. Timestamps are
//! persisted as fixed-width RFC 3339 text, which orders lexicographically.

pub mod pool;
pub mod row;
pub mod schema;

pub mod batches;
pub mod presets;
pub mod uploads;
pub mod users;

pub use batches::BatchRepository;
pub use pool::{connect, DbFlavor, DbPool};
pub use presets::PresetRepository;
pub use schema::ensure_schema;
pub use uploads::{StatusUpdate, UploadRepository};
pub use users::UserRepository;
