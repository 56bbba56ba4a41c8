//! Real-time event bridge.
//!
//! # Responsibilities
//! - Poll a freshly attached node until it reports synced
//! - Then pump its `(topic, payload)` messages into the handlers
//! - Deduplicate blocks and transactions seen from several nodes
//! - Emit service events, republish to hub listeners, trigger tip refreshes
//!
//! # Data Flow
//! ```text
//! EventSource (zmq / polling / channel)
//!     → handle_message(topic, payload)
//!         hashblock  → seen_blocks → Block event → TipUpdater → hub "hashblock"
//!         rawtx      → seen_txs    → Tx event    → hub "rawtransaction" → address listeners
//!         rawtxlock  → seen_locks  → TxLock event → hub "transactionlock"
//!         other      → ignored
//! ```
//!
//! # Design Decisions
//! - Handlers never await; RPC work (tip refresh, address lookup) runs in
//!   spawned tasks so the delivery loop is never blocked
//! - Lock notifications have their own seen-set since a locked transaction
//!   was usually already seen as `rawtx`

use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::chain::hash::txid;
use crate::events::bus::ServiceEvent;
use crate::events::seen::SeenSet;
use crate::events::source::{EventSource, TOPIC_HASHBLOCK, TOPIC_RAWTX, TOPIC_RAWTXLOCK};
use crate::events::tip_updater::TipUpdater;
use crate::observability::metrics;
use crate::pool::Node;
use crate::rpc::types::RawTransaction;
use crate::rpc::ChainRpc;
use crate::service::core::ServiceCore;
use crate::subscriptions::{Topic, TopicEvent};

pub struct EventBridge {
    core: Arc<ServiceCore>,
    updater: TipUpdater<ServiceCore>,
    seen_blocks: SeenSet,
    seen_txs: SeenSet,
    seen_locks: SeenSet,
}

impl EventBridge {
    pub fn new(core: Arc<ServiceCore>) -> Arc<Self> {
        let cache = &core.config.cache;
        let updater = TipUpdater::new(core.clone(), core.config.timing.tip_coalesce());
        Arc::new(Self {
            seen_blocks: SeenSet::new(cache.seen_blocks),
            seen_txs: SeenSet::new(cache.seen_transactions),
            seen_locks: SeenSet::new(cache.seen_transactions),
            updater,
            core,
        })
    }

    pub fn tip_updater(&self) -> &TipUpdater<ServiceCore> {
        &self.updater
    }

    /// Start the per-node task: sync polling, then message processing.
    pub fn attach<S>(self: &Arc<Self>, node: Arc<Node>, mut source: S) -> JoinHandle<()>
    where
        S: EventSource + 'static,
    {
        let bridge = self.clone();
        tokio::spawn(async move {
            if !bridge.wait_for_sync(&node).await {
                return;
            }
            tracing::info!(node = node.index, "Node synced, processing real-time events");

            let shutdown = &bridge.core.shutdown;
            loop {
                tokio::select! {
                    message = source.next_message() => match message {
                        Some((topic, payload)) => bridge.handle_message(&topic, &payload),
                        None => {
                            tracing::warn!(node = node.index, "Event source closed");
                            break;
                        }
                    },
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    /// Feed the node's best hash into the tip until the chain reports synced.
    /// Returns `false` when shutdown interrupts the wait.
    async fn wait_for_sync(&self, node: &Node) -> bool {
        let shutdown = &self.core.shutdown;
        let interval = self.core.config.timing.tip_update_interval();
        loop {
            if shutdown.is_stopping() {
                return false;
            }
            match node.client().best_block_hash().await {
                Ok(hash) => self.core.update_tip(&hash).await,
                Err(e) => tracing::warn!(node = node.index, error = %e, "Failed to fetch best block hash"),
            }
            match self.core.is_synced().await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => tracing::warn!(node = node.index, error = %e, "Failed to check sync state"),
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => return false,
            }
        }
    }

    /// Dispatch one inbound message. Unknown topics are ignored.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        match topic {
            TOPIC_HASHBLOCK => self.handle_block(payload),
            TOPIC_RAWTX => self.handle_transaction(payload, false),
            TOPIC_RAWTXLOCK => self.handle_transaction(payload, true),
            other => tracing::trace!(topic = %other, "Ignoring unknown topic"),
        }
    }

    fn handle_block(&self, payload: &[u8]) {
        let hash = hex::encode(payload);
        let fresh = self.seen_blocks.insert(&hash);
        metrics::record_zmq_message(TOPIC_HASHBLOCK, !fresh);
        if !fresh {
            return;
        }

        self.core.events.emit(ServiceEvent::Block(payload.to_vec()));
        self.updater.trigger(hash.clone());
        self.core
            .hub
            .publish(Topic::HashBlock, TopicEvent::HashBlock(hash));
    }

    fn handle_transaction(&self, payload: &[u8], lock: bool) {
        let id = txid(payload);
        let (seen, topic_name) = if lock {
            (&self.seen_locks, TOPIC_RAWTXLOCK)
        } else {
            (&self.seen_txs, TOPIC_RAWTX)
        };
        let fresh = seen.insert(&id);
        metrics::record_zmq_message(topic_name, !fresh);
        if !fresh {
            return;
        }

        let hex_payload = hex::encode(payload);
        if lock {
            self.core.events.emit(ServiceEvent::TxLock(payload.to_vec()));
            self.core.hub.publish(
                Topic::TransactionLock,
                TopicEvent::TransactionLock(hex_payload),
            );
        } else {
            self.core.events.emit(ServiceEvent::Tx(payload.to_vec()));
            self.core
                .hub
                .publish(Topic::RawTransaction, TopicEvent::RawTransaction(hex_payload));
        }

        // Address listeners hear once per txid, whichever of rawtx or rawtxlock
        // arrives first.
        let counterpart = if lock { &self.seen_txs } else { &self.seen_locks };
        if counterpart.contains(&id) {
            return;
        }
        if self.core.hub.has_address_subscribers() {
            self.notify_addresses(id);
        }
    }

    fn notify_addresses(&self, txid: String) {
        let core = self.core.clone();
        tokio::spawn(async move {
            let tx: RawTransaction = match core
                .pool
                .request("getrawtransaction", vec![json!(txid), json!(1)])
                .await
            {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::warn!(txid = %txid, error = %e, "Failed to resolve transaction addresses");
                    return;
                }
            };
            for address in tx.addresses() {
                core.hub.publish_address(&address, &txid);
            }
        });
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("tip_refreshes", &self.updater.refresh_count())
            .finish()
    }
}
