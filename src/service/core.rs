//! Shared service state.
//!
//! One long-lived [`ServiceCore`] owns the pool, caches, tip, hub and event
//! bus; every component holds an `Arc` to it instead of reaching for globals.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::cache::Caches;
use crate::chain::ChainTip;
use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::events::{EventBus, ServiceEvent, TipRefresher};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pool::NodePool;
use crate::rpc::types::{BlockchainInfo, VerboseBlock};
use crate::subscriptions::SubscriptionHub;
use crate::transaction::confirmations;

pub struct ServiceCore {
    pub config: ServiceConfig,
    pub pool: NodePool,
    pub caches: Caches,
    pub tip: ChainTip,
    pub hub: SubscriptionHub,
    pub events: EventBus,
    pub shutdown: Shutdown,
}

impl ServiceCore {
    pub fn new(config: ServiceConfig) -> Arc<Self> {
        Arc::new(Self {
            pool: NodePool::new(config.timing.try_all_interval()),
            caches: Caches::new(&config.cache),
            tip: ChainTip::new(),
            hub: SubscriptionHub::new(),
            events: EventBus::default(),
            shutdown: Shutdown::new(),
            config,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    /// Confirmations for a transaction at `height` against the current tip.
    pub fn confirmations(&self, height: i64) -> u64 {
        confirmations(self.tip.height(), height)
    }

    pub async fn blockchain_info(&self) -> ServiceResult<BlockchainInfo> {
        Ok(self.pool.request("getblockchaininfo", Vec::new()).await?)
    }

    /// Verification progress in percent.
    pub async fn sync_percentage(&self) -> ServiceResult<f64> {
        let info = self.blockchain_info().await?;
        Ok(info.verificationprogress * 100.0)
    }

    pub async fn is_synced(&self) -> ServiceResult<bool> {
        Ok(self.sync_percentage().await?.round() >= 100.0)
    }

    /// Refresh the tip from `block_hash`. Failures are logged and emitted as
    /// faults; there is no caller to return them to.
    pub async fn update_tip(&self, block_hash: &str) {
        if let Err(e) = self.try_update_tip(block_hash).await {
            tracing::error!(hash = %block_hash, error = %e, "Tip update failed");
            self.events.fault(e);
        }
    }

    async fn try_update_tip(&self, block_hash: &str) -> ServiceResult<()> {
        let block: VerboseBlock = self
            .pool
            .request("getblock", vec![json!(block_hash), json!(true)])
            .await?;
        if self.shutdown.is_stopping() {
            return Ok(());
        }

        if block.height != self.tip.height() {
            self.caches.reset_all();
            self.tip.set(block.height, block_hash);
            metrics::record_tip_height(block.height);
            tracing::info!(height = block.height, hash = %block_hash, "Tip updated");
            self.events.emit(ServiceEvent::Tip(block.height));
        }

        let percentage = self.sync_percentage().await?;
        if percentage.round() >= 100.0 {
            self.events.emit(ServiceEvent::Synced);
        } else {
            tracing::info!(progress = format!("{:.2}%", percentage), "Alterdot daemon sync progress");
        }
        Ok(())
    }
}

#[async_trait]
impl TipRefresher for ServiceCore {
    async fn refresh_tip(&self, block_hash: String) {
        self.update_tip(&block_hash).await;
    }
}

impl std::fmt::Debug for ServiceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCore")
            .field("service_name", &self.config.service_name)
            .field("tip", &self.tip.snapshot())
            .field("nodes", &self.pool.len())
            .finish()
    }
}
