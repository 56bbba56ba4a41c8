//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use chain_proxy::config::ServiceConfig;
use chain_proxy::rpc::{RpcClient, RpcError, RpcResult};

type Handler = dyn Fn(&str, &[Value]) -> RpcResult<Value> + Send + Sync;

/// In-memory daemon answering through a closure, with per-method call counters.
pub struct ScriptedRpc {
    name: String,
    handler: Box<Handler>,
    calls: Mutex<HashMap<String, Arc<AtomicU32>>>,
}

impl ScriptedRpc {
    pub fn new<F>(name: &str, handler: F) -> Arc<Self>
    where
        F: Fn(&str, &[Value]) -> RpcResult<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            handler: Box::new(handler),
            calls: Mutex::new(HashMap::new()),
        })
    }

    /// Daemon where every method fails with `code`.
    pub fn failing(name: &str, code: i64) -> Arc<Self> {
        let message = format!("{} failed", name);
        Self::new(name, move |_, _| Err(RpcError::upstream(code, message.clone())))
    }

    pub fn calls(&self, method: &str) -> u32 {
        self.calls
            .lock()
            .get(method)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    pub fn total_calls(&self) -> u32 {
        self.calls
            .lock()
            .values()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl RpcClient for ScriptedRpc {
    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let counter = self
            .calls
            .lock()
            .entry(method.to_string())
            .or_default()
            .clone();
        counter.fetch_add(1, Ordering::SeqCst);
        (self.handler)(method, &params)
    }

    fn endpoint(&self) -> String {
        format!("scripted://{}", self.name)
    }
}

/// Config with every timer shortened for tests.
pub fn fast_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.timing.try_all_interval_ms = 1;
    config.timing.start_retry_interval_ms = 5;
    config.timing.spawn_restart_ms = 10;
    config.timing.spawn_restart_max_ms = 100;
    config.timing.spawn_stop_ms = 5;
    config.timing.shutdown_timeout_ms = 3000;
    config.timing.tip_update_interval_ms = 20;
    config.timing.reindex_wait_ms = 5;
    config.timing.tip_coalesce_ms = 20;
    config.observability.metrics_enabled = false;
    config
}

/// JSON-RPC 1.0 daemon over HTTP on an ephemeral port.
///
/// Errors are answered the way the daemon does it: HTTP 500 with an
/// `{code, message}` error object in the body.
pub async fn start_rpc_backend<F>(handler: F) -> SocketAddr
where
    F: Fn(&str, &[Value]) -> Result<Value, (i64, String)> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let _ = serve_one(socket, handler.as_ref()).await;
            });
        }
    });
    addr
}

async fn serve_one<F>(mut socket: TcpStream, handler: &F) -> std::io::Result<()>
where
    F: Fn(&str, &[Value]) -> Result<Value, (i64, String)>,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let length: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request: Value = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].as_array().cloned().unwrap_or_default();
    let id = request["id"].clone();

    let (status, body) = match handler(&method, &params) {
        Ok(result) => ("200 OK", json!({"result": result, "error": null, "id": id})),
        Err((code, message)) => (
            "500 Internal Server Error",
            json!({"result": null, "error": {"code": code, "message": message}, "id": id}),
        ),
    };
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// An address nothing listens on.
pub async fn dead_endpoint() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

pub const BEST_HASH: &str = "000000000000000000000000000000000000000000000000000000000000beef";
pub const GENESIS_HASH: &str = "00000ffd590b1485b3caadc19b22e6379c733355108f107a430458cdf3407ab6";
pub const GENESIS_HEX: &str = "0100";

type BackendResult = Result<Value, (i64, String)>;

/// Fully synced daemon at `height` with just enough chain to start against.
pub fn chain_daemon(height: u64) -> impl Fn(&str, &[Value]) -> BackendResult + Send + Sync + 'static {
    move |method: &str, params: &[Value]| match method {
        "getbestblockhash" => Ok(json!(BEST_HASH)),
        "getblockhash" => match params.first().and_then(Value::as_u64) {
            Some(0) => Ok(json!(GENESIS_HASH)),
            _ => Ok(json!(BEST_HASH)),
        },
        "getblock" => {
            let hash = params.first().and_then(Value::as_str).unwrap_or_default();
            if params.get(1) == Some(&json!(false)) {
                return Ok(json!(GENESIS_HEX));
            }
            let block_height = if hash == GENESIS_HASH { 0 } else { height };
            Ok(json!({
                "hash": hash, "height": block_height, "version": 536870912,
                "confirmations": 1, "time": 1528761600u64, "tx": ["coinbase"]
            }))
        }
        "getblockheader" => Ok(json!({"hash": params[0], "height": height, "confirmations": 1})),
        "getblockchaininfo" => Ok(json!({
            "chain": "regtest", "blocks": height, "bestblockhash": BEST_HASH,
            "difficulty": 1, "verificationprogress": 1.0
        })),
        "getnetworkinfo" => Ok(json!({
            "version": 1020100, "protocolversion": 70210, "subversion": "/Alterdot Core:1.2.1/",
            "timeoffset": 0, "connections": 8, "relayfee": 0.00001, "warnings": ""
        })),
        other => Err((-32601, format!("Method {} not found", other))),
    }
}

/// Daemon config for a spawned node answering on `rpc_port`.
pub fn daemon_conf(rpc_port: u16) -> String {
    format!(
        "server=1\ntxindex=1\naddressindex=1\ntimestampindex=1\nspentindex=1\n\
         zmqpubrawtx=tcp://127.0.0.1:28332\nzmqpubhashblock=tcp://127.0.0.1:28332\n\
         rpcuser=alterdot\nrpcpassword=local321\nrpcport={}\n",
        rpc_port
    )
}
