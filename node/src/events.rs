// In-process event fabric between the producer / ingest paths and the
// WebSocket surface. Bounded broadcast channel; a slow subscriber loses its
// oldest events (counted), never blocking the producer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    NewTransaction { hash: String },
    NewBlock { height: u64, hash: String, txs: Vec<String> },
    AiRiskPosted { tx_hash: String, score: f64 },
    BridgeApplied { id: String },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NodeEvent>,
    lagged: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, lagged: Arc::new(AtomicU64::new(0)) }
    }

    /// Publish to all current subscribers. A send with no subscribers is
    /// not an error.
    pub fn publish(&self, event: NodeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.sender.subscribe()
    }

    /// Record `n` events dropped for a lagging subscriber.
    pub fn note_lagged(&self, n: u64) {
        self.lagged.fetch_add(n, Ordering::Relaxed);
    }

    pub fn lagged_total(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
