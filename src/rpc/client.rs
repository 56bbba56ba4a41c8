//! JSON-RPC client for a single daemon.
//!
//! # Responsibilities
//! - Issue named remote calls and return `(error, result)` as a `Result`
//! - Map daemon error objects to `RpcError::Upstream` with the original code
//! - Leave timeouts to the transport (reqwest) configuration

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use crate::rpc::types::{BlockchainInfo, RpcError, RpcResult, VerboseBlock};

/// A handle capable of named remote calls against one daemon.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Invoke `method` with positional `params`.
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value>;

    /// Endpoint description for logs and the admin API.
    fn endpoint(&self) -> String {
        "unknown".to_string()
    }
}

/// Decode a JSON-RPC result into a typed record.
pub fn decode<T: DeserializeOwned>(method: &str, value: Value) -> RpcResult<T> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
}

/// Typed calls used when talking to one specific node (startup, sync polling).
#[async_trait]
pub trait ChainRpc {
    async fn best_block_hash(&self) -> RpcResult<String>;
    async fn verbose_block(&self, hash: &str) -> RpcResult<VerboseBlock>;
    async fn blockchain_info(&self) -> RpcResult<BlockchainInfo>;
}

#[async_trait]
impl<T: RpcClient + ?Sized> ChainRpc for T {
    async fn best_block_hash(&self) -> RpcResult<String> {
        let value = self.call("getbestblockhash", Vec::new()).await?;
        decode("getbestblockhash", value)
    }

    async fn verbose_block(&self, hash: &str) -> RpcResult<VerboseBlock> {
        let value = self.call("getblock", vec![json!(hash), json!(true)]).await?;
        decode("getblock", value)
    }

    async fn blockchain_info(&self) -> RpcResult<BlockchainInfo> {
        let value = self.call("getblockchaininfo", Vec::new()).await?;
        decode("getblockchaininfo", value)
    }
}

/// Connection settings for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl RpcEndpoint {
    pub fn url(&self) -> String {
        format!("{}://{}:{}/", self.protocol, self.host, self.port)
    }
}

/// JSON-RPC 1.0 over HTTP, the dialect spoken by the daemon.
#[derive(Clone)]
pub struct HttpRpcClient {
    http: reqwest::Client,
    endpoint: RpcEndpoint,
}

impl HttpRpcClient {
    pub fn new(endpoint: RpcEndpoint) -> RpcResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.endpoint.url())
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout(self.endpoint.timeout_secs)
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        // The daemon reports RPC errors with HTTP 404/500 and a JSON body.
        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| {
            RpcError::Transport(format!("HTTP {} with unreadable body: {}", status, e))
        })?;

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(RpcError::Upstream { code, message });
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.endpoint.protocol, self.endpoint.host, self.endpoint.port)
    }
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("url", &self.endpoint.url())
            .field("user", &self.endpoint.user)
            .field("timeout_secs", &self.endpoint.timeout_secs)
            .finish()
    }
}
