//! Fixed-size node pool with sequential failover.
//!
//! # Responsibilities
//! - Hold the ordered node list for the process lifetime
//! - Run one logical call against each node at most once, starting at the cursor
//! - Space attempts by `try_all_interval` so a degraded node is not hammered

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::pool::node::Node;
use crate::pool::round_robin::RoundRobin;
use crate::rpc::client::decode;
use crate::rpc::{RpcClient, RpcError, RpcResult};

/// Ordered node collection plus a rotation cursor.
pub struct NodePool {
    nodes: ArcSwap<Vec<Arc<Node>>>,
    cursor: RoundRobin,
    try_all_interval: Duration,
    register_lock: Mutex<()>,
}

impl NodePool {
    pub fn new(try_all_interval: Duration) -> Self {
        Self {
            nodes: ArcSwap::from_pointee(Vec::new()),
            cursor: RoundRobin::new(),
            try_all_interval,
            register_lock: Mutex::new(()),
        }
    }

    /// Append a node. Only called during startup.
    pub fn register(
        &self,
        client: Arc<dyn RpcClient>,
        zmq_endpoint: Option<String>,
        spawned: bool,
    ) -> Arc<Node> {
        let _guard = self.register_lock.lock();
        let mut next = Vec::clone(&self.nodes.load());
        let node = Arc::new(Node::new(next.len(), client, zmq_endpoint, spawned));
        next.push(node.clone());
        let count = next.len();
        self.nodes.store(Arc::new(next));

        metrics::record_node_count(count);
        tracing::info!(node = node.index, endpoint = %node.endpoint(), "Node registered");
        node
    }

    pub fn nodes(&self) -> Arc<Vec<Arc<Node>>> {
        self.nodes.load_full()
    }

    pub fn len(&self) -> usize {
        self.nodes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current rotation cursor.
    pub fn cursor(&self) -> usize {
        self.cursor.position()
    }

    pub fn set_cursor(&self, index: usize) {
        self.cursor.set(index);
    }

    /// Run `invoke` against the pool with failover.
    ///
    /// The cursor moves to the node after the starting one before any attempt,
    /// so it is already correct whether the call succeeds or every node fails.
    pub async fn call<T, F, Fut>(&self, invoke: F) -> RpcResult<T>
    where
        F: Fn(Arc<dyn RpcClient>) -> Fut,
        Fut: Future<Output = RpcResult<T>>,
    {
        let nodes = self.nodes.load_full();
        if nodes.is_empty() {
            return Err(RpcError::NoNodes);
        }

        let len = nodes.len();
        let start = self.cursor.advance(len);
        let mut last_error = RpcError::NoNodes;

        for attempt in 0..len {
            if attempt > 0 {
                tokio::time::sleep(self.try_all_interval).await;
            }
            let node = &nodes[(start + attempt) % len];
            match invoke(node.client()).await {
                Ok(value) => {
                    node.mark_success();
                    return Ok(value);
                }
                Err(e) => {
                    node.mark_failure();
                    if len > 1 {
                        tracing::warn!(node = node.index, attempt, error = %e, "Node call failed, trying next node");
                    }
                    last_error = e;
                }
            }
        }

        if len > 1 {
            metrics::record_failover_exhausted();
        }
        Err(last_error)
    }

    /// Named RPC call with failover and typed decoding.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> RpcResult<T> {
        let value = self
            .call(|client| {
                let params = params.clone();
                async move {
                    let result = client.call(method, params).await;
                    metrics::record_rpc_call(method, result.is_ok());
                    result
                }
            })
            .await?;
        decode(method, value)
    }
}

impl std::fmt::Debug for NodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePool")
            .field("nodes", &self.nodes.load())
            .field("cursor", &self.cursor.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockRpc;
    use serde_json::json;

    fn pool_of(count: usize) -> (NodePool, Vec<Arc<MockRpc>>) {
        let pool = NodePool::new(Duration::from_millis(1));
        let mocks: Vec<_> = (0..count).map(|_| MockRpc::new()).collect();
        for mock in &mocks {
            pool.register(mock.clone(), None, false);
        }
        (pool, mocks)
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let pool = NodePool::new(Duration::from_millis(1));
        let err = pool.request::<String>("getbestblockhash", vec![]).await.unwrap_err();
        assert_eq!(err, RpcError::NoNodes);
    }

    #[tokio::test]
    async fn test_failover_to_success() {
        let (pool, mocks) = pool_of(3);
        mocks[0].on("getbestblockhash", Err(RpcError::Transport("down".into())));
        mocks[1].on("getbestblockhash", Err(RpcError::Transport("down".into())));
        mocks[2].on("getbestblockhash", Ok(json!("abc")));

        let hash: String = pool.request("getbestblockhash", vec![]).await.unwrap();
        assert_eq!(hash, "abc");
        for mock in &mocks {
            assert_eq!(mock.calls("getbestblockhash"), 1);
        }
        assert_eq!(pool.cursor(), 1);
    }

    #[tokio::test]
    async fn test_all_fail_returns_last_error_and_moves_cursor() {
        let (pool, mocks) = pool_of(3);
        for (i, mock) in mocks.iter().enumerate() {
            mock.on("getinfo", Err(RpcError::upstream(-1, format!("node {}", i))));
        }
        pool.set_cursor(2);

        let err = pool.request::<Value>("getinfo", vec![]).await.unwrap_err();
        // Started at 2, so node 1 is the last one tried.
        assert_eq!(err, RpcError::upstream(-1, "node 1"));
        assert_eq!(pool.cursor(), 0);
    }

    #[tokio::test]
    async fn test_round_robin_on_success() {
        let (pool, mocks) = pool_of(2);
        for mock in &mocks {
            mock.on("getblockcount", Ok(json!(7)));
        }
        for _ in 0..4 {
            let count: u64 = pool.request("getblockcount", vec![]).await.unwrap();
            assert_eq!(count, 7);
        }
        assert_eq!(mocks[0].calls("getblockcount"), 2);
        assert_eq!(mocks[1].calls("getblockcount"), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_is_invalid_response() {
        let (pool, mocks) = pool_of(1);
        mocks[0].on("getblockcount", Ok(json!("not a number")));
        let err = pool.request::<u64>("getblockcount", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidResponse(_)));
    }
}
