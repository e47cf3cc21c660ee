use std::sync::Arc;
use tokio::sync::broadcast;

/// Latest-value broadcast channel between the simulator threads and the async tasks.
///
/// Messages are shared behind an `Arc` so large payloads such as scans are not
/// cloned per subscriber. Slow subscribers lag and skip old messages.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes `msg`. Returns false if nobody is subscribed.
    pub fn publish(&self, msg: T) -> bool {
        self.tx.send(Arc::new(msg)).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}
