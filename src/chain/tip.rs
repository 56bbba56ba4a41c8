//! Chain tip snapshot.
//!
//! Written only by the tip refresh path and by initial chain loading; read
//! everywhere confirmations are computed. Readers get a consistent
//! height/hash pair without locking.

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::Serialize;
use std::sync::Arc;

/// Height and hash observed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TipSnapshot {
    pub height: u64,
    pub hash: String,
}

#[derive(Debug, Default)]
pub struct ChainTip {
    current: ArcSwap<TipSnapshot>,
    genesis: ArcSwapOption<Vec<u8>>,
}

impl ChainTip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<TipSnapshot> {
        self.current.load_full()
    }

    pub fn height(&self) -> u64 {
        self.current.load().height
    }

    pub fn hash(&self) -> String {
        self.current.load().hash.clone()
    }

    pub fn set(&self, height: u64, hash: impl Into<String>) {
        self.current.store(Arc::new(TipSnapshot {
            height,
            hash: hash.into(),
        }));
    }

    /// Raw genesis block, recorded once at startup.
    pub fn genesis(&self) -> Option<Arc<Vec<u8>>> {
        self.genesis.load_full()
    }

    pub fn set_genesis(&self, raw: Vec<u8>) {
        self.genesis.store(Some(Arc::new(raw)));
    }
}
