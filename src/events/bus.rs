//! Typed service events.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::ServiceError;

/// Events emitted to in-process listeners.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// Tip height changed.
    Tip(u64),
    /// Verification progress reached 100%.
    Synced,
    /// New block hash, raw bytes as received.
    Block(Vec<u8>),
    /// New mempool transaction, raw serialization.
    Tx(Vec<u8>),
    /// New locked transaction, raw serialization.
    TxLock(Vec<u8>),
    /// Asynchronous failure that has no caller to return to.
    Fault(Arc<ServiceError>),
}

impl ServiceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceEvent::Tip(_) => "tip",
            ServiceEvent::Synced => "synced",
            ServiceEvent::Block(_) => "block",
            ServiceEvent::Tx(_) => "tx",
            ServiceEvent::TxLock(_) => "txlock",
            ServiceEvent::Fault(_) => "error",
        }
    }
}

/// Broadcast fan-out of [`ServiceEvent`]s. Slow listeners lag and lose events
/// rather than blocking the emitter.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServiceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ServiceEvent) {
        tracing::trace!(event = event.name(), "Emitting service event");
        let _ = self.tx.send(event);
    }

    pub fn fault(&self, error: ServiceError) {
        self.emit(ServiceEvent::Fault(Arc::new(error)));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
