//! Upstream node abstraction.
//!
//! # Responsibilities
//! - Represent a single daemon endpoint and its RPC client
//! - Track per-call outcomes for the admin API (a node fails per call,
//!   it is never taken out of rotation)

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::rpc::RpcClient;

/// A single upstream daemon.
pub struct Node {
    /// Ordinal position in the pool.
    pub index: usize,
    /// ZMQ endpoint the event bridge subscribes to, if any.
    pub zmq_endpoint: Option<String>,
    /// Whether this node is the supervised local daemon.
    pub spawned: bool,

    client: Arc<dyn RpcClient>,
    consecutive_failures: AtomicUsize,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl Node {
    pub fn new(
        index: usize,
        client: Arc<dyn RpcClient>,
        zmq_endpoint: Option<String>,
        spawned: bool,
    ) -> Self {
        Self {
            index,
            zmq_endpoint,
            spawned,
            client,
            consecutive_failures: AtomicUsize::new(0),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> Arc<dyn RpcClient> {
        self.client.clone()
    }

    pub fn endpoint(&self) -> String {
        self.client.endpoint()
    }

    // --- Call accounting ---

    pub fn mark_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn mark_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("endpoint", &self.client.endpoint())
            .field("zmq_endpoint", &self.zmq_endpoint)
            .field("spawned", &self.spawned)
            .finish()
    }
}
