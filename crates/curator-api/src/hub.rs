//! Live progress hub: per-batch pub/sub between the worker and connected
//! clients.
//!
//! The worker publishes one delta per status transition; the hub fans each
//! out to every subscriber of that batch. When the last open request in a
//! batch goes terminal the hub emits `UPLOADS_COMPLETE` and drops the topic.

use std::collections::HashMap;
use std::sync::Mutex;

use curator_core::models::UploadDelta;
use curator_worker::ProgressSink;
use tokio::sync::broadcast;

use crate::protocol::ServerMessage;

const TOPIC_CAPACITY: usize = 64;

#[derive(Default)]
pub struct ProgressHub {
    topics: Mutex<HashMap<i64, broadcast::Sender<ServerMessage>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a batch topic. Deltas published from this point on are received
    /// in the order the worker emitted them.
    pub fn subscribe(&self, batchid: i64) -> broadcast::Receiver<ServerMessage> {
        self.topics
            .lock()
            .unwrap()
            .entry(batchid)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Subscriber count for a batch (used by tests and introspection).
    pub fn subscriber_count(&self, batchid: i64) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(&batchid)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn send(&self, batchid: i64, message: ServerMessage) {
        let topics = self.topics.lock().unwrap();
        if let Some(tx) = topics.get(&batchid) {
            // A lagging or absent receiver is not an error.
            let _ = tx.send(message);
        }
    }
}

impl ProgressSink for ProgressHub {
    fn publish_update(&self, batchid: i64, delta: UploadDelta) {
        self.send(batchid, ServerMessage::UploadsUpdate { data: vec![delta] });
    }

    fn publish_complete(&self, batchid: i64) {
        self.send(batchid, ServerMessage::UploadsComplete { data: batchid });
        // The batch is finished; unsubscribe the topic.
        self.topics.lock().unwrap().remove(&batchid);
    }
}
