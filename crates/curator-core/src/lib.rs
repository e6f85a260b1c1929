//! Curator core library
//!
//! This crate provides the domain models, claim graph, SDC merge engine,
//! sealed-token encryption, and configuration shared across all Curator
//! components.

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod sdc;
pub mod task_error;
pub mod vault;

// Re-export commonly used types
pub use cache::{CacheBackend, MemoryCache, SealedCache};
pub use config::Config;
pub use error::AppError;
pub use task_error::{TaskError, TaskResultExt};
pub use vault::{AccessToken, TokenVault};
