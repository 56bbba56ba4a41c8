//! Inbound message sources for the event bridge.
//!
//! A source yields `(topic, payload)` pairs. The real one is a ZMQ SUB socket
//! (cargo feature `zmq`); without it a node falls back to polling its best
//! block hash. Tests feed messages through [`ChannelSource`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::rpc::{ChainRpc, RpcClient};

pub const TOPIC_HASHBLOCK: &str = "hashblock";
pub const TOPIC_RAWTX: &str = "rawtx";
pub const TOPIC_RAWTXLOCK: &str = "rawtxlock";

/// Topics subscribed on every node.
pub const TOPICS: [&str; 3] = [TOPIC_HASHBLOCK, TOPIC_RAWTX, TOPIC_RAWTXLOCK];

/// One inbound message.
pub type Message = (String, Vec<u8>);

#[async_trait]
pub trait EventSource: Send {
    /// Next message, or `None` once the source is closed.
    async fn next_message(&mut self) -> Option<Message>;
}

/// Source backed by an mpsc channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<Message>,
}

/// Create a channel source and the sender that feeds it.
pub fn channel_source(buffer: usize) -> (mpsc::Sender<Message>, ChannelSource) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (tx, ChannelSource { rx })
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_message(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

/// Emits `hashblock` whenever the node's best block hash changes.
pub struct PollingSource {
    client: Arc<dyn RpcClient>,
    interval: Duration,
    last: Option<String>,
}

impl PollingSource {
    pub fn new(client: Arc<dyn RpcClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            last: None,
        }
    }
}

#[async_trait]
impl EventSource for PollingSource {
    async fn next_message(&mut self) -> Option<Message> {
        loop {
            tokio::time::sleep(self.interval).await;
            let hash = match self.client.best_block_hash().await {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::debug!(endpoint = %self.client.endpoint(), error = %e, "Best block poll failed");
                    continue;
                }
            };
            if self.last.as_deref() == Some(hash.as_str()) {
                continue;
            }
            match hex::decode(&hash) {
                Ok(bytes) => {
                    self.last = Some(hash);
                    return Some((TOPIC_HASHBLOCK.to_string(), bytes));
                }
                Err(e) => {
                    tracing::warn!(hash = %hash, error = %e, "Daemon returned a malformed block hash");
                }
            }
        }
    }
}

#[cfg(feature = "zmq")]
pub use zmq_source::connect_zmq;

#[cfg(feature = "zmq")]
mod zmq_source {
    use super::{channel_source, ChannelSource, TOPICS};

    /// Subscribe to `endpoint` on a dedicated thread and forward multipart
    /// messages into a [`ChannelSource`].
    pub fn connect_zmq(endpoint: &str) -> Result<ChannelSource, zmq::Error> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::SUB)?;
        socket.set_rcvtimeo(1000)?;
        socket.connect(endpoint)?;
        for topic in TOPICS {
            socket.set_subscribe(topic.as_bytes())?;
        }
        tracing::info!(endpoint = %endpoint, "ZMQ subscriber connected");

        let (tx, source) = channel_source(1024);
        let endpoint = endpoint.to_string();
        std::thread::spawn(move || {
            let _context = context;
            loop {
                if tx.is_closed() {
                    break;
                }
                match socket.recv_multipart(0) {
                    Ok(mut parts) if parts.len() >= 2 => {
                        let payload = parts.swap_remove(1);
                        let topic = String::from_utf8_lossy(&parts[0]).into_owned();
                        if tx.blocking_send((topic, payload)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(zmq::Error::EAGAIN) => {}
                    Err(e) => {
                        tracing::error!(endpoint = %endpoint, error = %e, "ZMQ receive failed");
                        break;
                    }
                }
            }
            tracing::debug!(endpoint = %endpoint, "ZMQ subscriber closed");
        });
        Ok(source)
    }
}
