//! Query facade over the node pool.
//!
//! # Data Flow
//! ```text
//! Caller (admin API, embedding application)
//!     → ChainService method
//!     → address engine / blocks / chain_info / governance / transaction fetch
//!     → caches (hit) or node pool request with failover (miss)
//!
//! Supervisor ─ nodes ─▶ pool      Event bridge ─▶ tip, caches, hub, bus
//! ```
//!
//! # Design Decisions
//! - All shared state lives in one `ServiceCore`; the facade only routes
//! - Raw blocks and transactions come back as bytes, hex stays internal

pub mod blocks;
pub mod chain_info;
pub mod core;
pub mod governance;

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::address::{
    AddressArg, AddressEngine, AddressHistory, AddressOptions, AddressSummary, UnspentOutput,
};
use crate::chain::tip::TipSnapshot;
use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::events::ServiceEvent;
use crate::lifecycle::{Supervisor, SupervisorState};
use crate::rpc::types::{AddressBalance, RawTransaction, RpcError, SpentInfo};
use crate::subscriptions::{Subscriber, SubscriberId, Topic, TopicEvent};
use crate::transaction::fetch;
use crate::transaction::DetailedTransaction;

pub use blocks::{BlockHeader, BlockOverview, BlockRef};
pub use chain_info::{ChainInfo, OutPoint};
pub use self::core::ServiceCore;
pub use governance::{GovObject, GovObjectType, MasternodeEntry, SporkList};

/// Snapshot for the admin status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub network: &'static str,
    pub state: SupervisorState,
    pub tip: TipSnapshot,
    pub nodes: usize,
    pub daemon_pid: Option<u32>,
}

/// The chain proxy: supervisor plus every query it serves.
pub struct ChainService {
    core: Arc<ServiceCore>,
    supervisor: Arc<Supervisor>,
}

impl ChainService {
    pub fn new(config: ServiceConfig) -> Arc<Self> {
        let core = ServiceCore::new(config);
        let supervisor = Supervisor::new(core.clone());
        Arc::new(Self { core, supervisor })
    }

    pub fn core(&self) -> &Arc<ServiceCore> {
        &self.core
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub async fn start(&self) -> ServiceResult<()> {
        self.supervisor.start().await
    }

    pub async fn stop(&self) -> ServiceResult<()> {
        self.supervisor.stop().await
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            service: self.core.service_name().to_string(),
            network: self.core.config.network.name(),
            state: self.supervisor.state(),
            tip: TipSnapshot::clone(&self.core.tip.snapshot()),
            nodes: self.core.pool.len(),
            daemon_pid: self.supervisor.daemon_pid(),
        }
    }

    // --- Events and subscriptions ---

    /// Typed events: tip, synced, block, tx, txlock, error.
    pub fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.core.events.subscribe()
    }

    pub fn new_subscriber(&self) -> (Subscriber, mpsc::UnboundedReceiver<TopicEvent>) {
        self.core.hub.new_subscriber()
    }

    pub fn subscribe(&self, topic: Topic, subscriber: &Subscriber) {
        self.core.hub.subscribe(topic, subscriber);
    }

    pub fn unsubscribe(&self, topic: Topic, id: SubscriberId) {
        self.core.hub.unsubscribe(topic, id);
    }

    /// Watch addresses for new transactions; invalid addresses are ignored.
    pub fn subscribe_address(&self, subscriber: &Subscriber, addresses: impl Into<AddressArg>) {
        let addresses = addresses.into().into_list();
        self.core.hub.subscribe_address(subscriber, &addresses);
    }

    /// Stop watching the given addresses, or every address when `None`.
    pub fn unsubscribe_address(&self, id: SubscriberId, addresses: Option<AddressArg>) {
        let addresses = addresses.map(AddressArg::into_list);
        self.core.hub.unsubscribe_address(id, addresses.as_deref());
    }

    // --- Addresses ---

    pub async fn get_address_balance(
        &self,
        addresses: impl Into<AddressArg>,
    ) -> ServiceResult<AddressBalance> {
        AddressEngine::new(&self.core).balance(addresses).await
    }

    pub async fn get_address_unspent_outputs(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<Vec<UnspentOutput>> {
        AddressEngine::new(&self.core)
            .unspent_outputs(addresses, options)
            .await
    }

    pub async fn get_address_txids(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<Vec<String>> {
        AddressEngine::new(&self.core).txids(addresses, options).await
    }

    pub async fn get_address_history(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<AddressHistory> {
        AddressEngine::new(&self.core).history(addresses, options).await
    }

    pub async fn get_address_summary(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<AddressSummary> {
        AddressEngine::new(&self.core).summary(addresses, options).await
    }

    // --- Blocks ---

    pub async fn get_raw_block(&self, block: impl Into<BlockRef>) -> ServiceResult<Vec<u8>> {
        blocks::raw_block(&self.core, block).await
    }

    pub async fn get_block_overview(
        &self,
        block: impl Into<BlockRef>,
    ) -> ServiceResult<BlockOverview> {
        blocks::block_overview(&self.core, block).await
    }

    pub async fn get_block_header(&self, block: impl Into<BlockRef>) -> ServiceResult<BlockHeader> {
        blocks::block_header(&self.core, block).await
    }

    /// `count` defaults to `limits.block_headers_count`.
    pub async fn get_block_headers(
        &self,
        block: impl Into<BlockRef>,
        count: Option<usize>,
    ) -> ServiceResult<Vec<BlockHeader>> {
        let count = count.unwrap_or(self.core.config.limits.block_headers_count);
        blocks::block_headers(&self.core, block, count).await
    }

    pub async fn get_block_hashes_by_timestamp(
        &self,
        high: u64,
        low: u64,
    ) -> ServiceResult<Vec<String>> {
        blocks::block_hashes_by_timestamp(&self.core, high, low).await
    }

    pub async fn maybe_get_block_hash(&self, block: impl Into<BlockRef>) -> ServiceResult<String> {
        blocks::maybe_get_block_hash(&self.core, block).await
    }

    // --- Chain ---

    pub async fn get_best_block_hash(&self) -> ServiceResult<String> {
        chain_info::best_block_hash(&self.core).await
    }

    pub async fn get_best_chain_lock(&self) -> ServiceResult<Value> {
        chain_info::best_chain_lock(&self.core).await
    }

    pub async fn get_spent_info(&self, outpoint: &OutPoint) -> ServiceResult<SpentInfo> {
        chain_info::spent_info(&self.core, outpoint).await
    }

    pub async fn get_info(&self) -> ServiceResult<ChainInfo> {
        chain_info::info(&self.core).await
    }

    pub async fn estimate_fee(&self, blocks: u32) -> ServiceResult<f64> {
        chain_info::estimate_fee(&self.core, blocks).await
    }

    pub async fn send_transaction(
        &self,
        tx_hex: &str,
        allow_absurd_fees: bool,
    ) -> ServiceResult<String> {
        chain_info::send_transaction(&self.core, tx_hex, allow_absurd_fees).await
    }

    pub async fn generate_block(&self, blocks: u32) -> ServiceResult<Vec<String>> {
        chain_info::generate_blocks(&self.core, blocks).await
    }

    pub async fn is_synced(&self) -> ServiceResult<bool> {
        self.core.is_synced().await
    }

    pub async fn sync_percentage(&self) -> ServiceResult<f64> {
        self.core.sync_percentage().await
    }

    // --- Transactions ---

    pub async fn get_raw_transaction(&self, txid: &str) -> ServiceResult<Vec<u8>> {
        let hex_tx = fetch::raw_transaction(&self.core, txid).await?;
        let bytes = hex::decode(&hex_tx)
            .map_err(|e| RpcError::InvalidResponse(format!("getrawtransaction: {}", e)))?;
        Ok(bytes)
    }

    pub async fn get_transaction(&self, txid: &str) -> ServiceResult<RawTransaction> {
        fetch::verbose_transaction(&self.core, txid).await
    }

    pub async fn get_detailed_transaction(&self, txid: &str) -> ServiceResult<DetailedTransaction> {
        fetch::detailed_transaction(&self.core, txid).await
    }

    // --- Governance ---

    pub async fn gov_object_list(&self, kind: GovObjectType) -> ServiceResult<Vec<GovObject>> {
        governance::gov_object_list(&self.core, kind).await
    }

    pub async fn gov_object_hash(&self, hash: &str) -> ServiceResult<Vec<GovObject>> {
        governance::gov_object_hash(&self.core, hash).await
    }

    pub async fn get_spork_list(&self) -> ServiceResult<SporkList> {
        governance::spork_list(&self.core).await
    }

    pub async fn get_masternode_list(&self) -> ServiceResult<Vec<MasternodeEntry>> {
        governance::masternode_list(&self.core).await
    }
}

impl std::fmt::Debug for ChainService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainService")
            .field("core", &self.core)
            .field("supervisor", &self.supervisor)
            .finish()
    }
}
