//! Application state threaded through every handler.

use std::sync::Arc;

use curator_core::{Config, TokenVault};
use curator_db::{
    BatchRepository, DbPool, PresetRepository, UploadRepository, UserRepository,
};
use curator_handlers::HandlerRegistry;
use curator_worker::UploadQueue;

use crate::hub::ProgressHub;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DbPool,
    pub uploads: UploadRepository,
    pub batches: BatchRepository,
    pub users: UserRepository,
    pub presets: PresetRepository,
    pub registry: HandlerRegistry,
    pub vault: TokenVault,
    pub hub: Arc<ProgressHub>,
    pub queue: Arc<UploadQueue>,
    pub sessions: Arc<SessionStore>,
}
