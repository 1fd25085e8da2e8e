use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Named broadcast topic with bounded capacity.
///
/// Messages are shared as `Arc<T>`, so `T` must be `Send + Sync` to reach
/// subscribers on other tasks. A slow subscriber loses the oldest messages
/// and sees `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    name: &'static str,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { name, tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publisher handle for producers that already wrap messages in `Arc`.
    pub fn sender(&self) -> broadcast::Sender<Arc<T>> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        let rx = self.tx.subscribe();
        debug!(
            topic = self.name,
            subscribers = self.tx.receiver_count(),
            "New topic subscriber"
        );
        rx
    }
}
