use tokio::sync::broadcast;

use edubridge_types::RealtimeEvent;

/// In-process change feed of the local backend.
#[derive(Clone)]
pub struct Dispatcher {
    broadcast_tx: broadcast::Sender<RealtimeEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self { broadcast_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Publish to every subscriber. Nobody listening is not an error.
    pub fn broadcast(&self, event: RealtimeEvent) {
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
