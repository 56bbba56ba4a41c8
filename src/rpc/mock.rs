//! Scripted in-memory daemon for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::rpc::client::RpcClient;
use crate::rpc::types::{RpcError, RpcResult};

#[derive(Default)]
pub(crate) struct MockRpc {
    queued: Mutex<HashMap<String, VecDeque<RpcResult<Value>>>>,
    sticky: Mutex<HashMap<String, RpcResult<Value>>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockRpc {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every call to `method` with `result`.
    pub(crate) fn on(&self, method: &str, result: RpcResult<Value>) -> &Self {
        self.sticky.lock().insert(method.to_string(), result);
        self
    }

    /// Answer the next call to `method` with `result`, ahead of any sticky answer.
    pub(crate) fn once(&self, method: &str, result: RpcResult<Value>) -> &Self {
        self.queued
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub(crate) fn calls(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub(crate) fn params(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        self.calls.lock().push((method.to_string(), params));
        if let Some(result) = self.queued.lock().get_mut(method).and_then(|q| q.pop_front()) {
            return result;
        }
        self.sticky
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(RpcError::upstream(-32601, "Method not found")))
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}
