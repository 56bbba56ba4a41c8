//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// A sticky `stopping` flag for loops that poll, plus a broadcast channel so
/// sleeping tasks wake up as soon as stop is requested.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    stopping: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            stopping: AtomicBool::new(false),
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested, including before this call.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if self.is_stopping() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Number of tasks currently waiting in [`Shutdown::cancelled`].
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("stopping", &self.is_stopping())
            .finish()
    }
}
