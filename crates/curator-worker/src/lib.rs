//! Upload worker: queue, retry driver, and the per-request state machine.

pub mod context;
pub mod ingest;
pub mod queue;
pub mod retry;

pub use context::{HttpMediaFetcher, MediaFetcher, NoopProgress, ProgressSink, WorkerContext};
pub use ingest::process_one;
pub use queue::{UploadQueue, UploadQueueConfig};
pub use retry::RetryPolicy;
