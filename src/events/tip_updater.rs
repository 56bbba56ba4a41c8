//! Coalescing trigger for tip refreshes.
//!
//! # Responsibilities
//! - Turn a burst of block notifications into a bounded number of refreshes
//! - Guarantee one trailing refresh with the newest hash after a burst
//!
//! # Design Decisions
//! - Single flight: one worker task at a time, started by the first trigger
//! - One pending slot: a trigger while a refresh runs overwrites the slot,
//!   so only the newest hash is refreshed next
//! - `spacing` is slept after each refresh, bounding refreshes by wall-clock time
//!
//! ```text
//! trigger(h1) ──► worker: refresh(h1) ─ sleep ─► refresh(h50) ─ sleep ─► exit
//! trigger(h2..h50) ──► pending slot (overwritten, last one wins)
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// The expensive part of a tip update.
#[async_trait]
pub trait TipRefresher: Send + Sync + 'static {
    async fn refresh_tip(&self, block_hash: String);
}

struct State {
    running: AtomicBool,
    pending: Mutex<Option<String>>,
    refreshes: AtomicU64,
}

pub struct TipUpdater<R: TipRefresher> {
    refresher: Arc<R>,
    spacing: Duration,
    state: Arc<State>,
}

impl<R: TipRefresher> TipUpdater<R> {
    pub fn new(refresher: Arc<R>, spacing: Duration) -> Self {
        Self {
            refresher,
            spacing,
            state: Arc::new(State {
                running: AtomicBool::new(false),
                pending: Mutex::new(None),
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Request a refresh for `block_hash`. Never blocks.
    pub fn trigger(&self, block_hash: String) {
        *self.state.pending.lock() = Some(block_hash);
        if claim(&self.state) {
            self.spawn_worker();
        }
    }

    /// Refreshes actually executed so far.
    pub fn refresh_count(&self) -> u64 {
        self.state.refreshes.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        !self.state.running.load(Ordering::Acquire)
    }

    fn spawn_worker(&self) {
        let state = self.state.clone();
        let refresher = self.refresher.clone();
        let spacing = self.spacing;

        tokio::spawn(async move {
            loop {
                let next = state.pending.lock().take();
                match next {
                    Some(hash) => {
                        refresher.refresh_tip(hash).await;
                        state.refreshes.fetch_add(1, Ordering::AcqRel);
                        metrics::record_tip_refresh();
                        tokio::time::sleep(spacing).await;
                    }
                    None => {
                        state.running.store(false, Ordering::Release);
                        // A trigger may have filled the slot after take() but
                        // before running was cleared, and found us still running.
                        if state.pending.lock().is_none() || !claim(&state) {
                            break;
                        }
                    }
                }
            }
        });
    }
}

fn claim(state: &State) -> bool {
    state
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}
