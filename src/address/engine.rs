//! Address queries over the node pool.
//!
//! # Responsibilities
//! - Balance, unspent outputs, txids, history and summary for an address set
//! - Validate every argument before the first RPC call
//! - Cache confirmed data per address set; mempool data is always fetched fresh
//!
//! # Data Flow
//! ```text
//! AddressArg + AddressOptions
//!     → options.rs (normalise, validate windows and ranges)
//!     → Caches (confirmed results keyed by the address set)
//!     → NodePool (getaddress* RPCs on miss, getaddressmempool always)
//!     → mempool.rs (merge pending data on top)
//! ```

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::address::mempool::{
    addresses_needing_script, balance_from_mempool, reconcile_utxos, txids_from_mempool,
    UnspentOutput,
};
use crate::address::options::{
    check_address_count, check_order, check_window, height_range, paginate, AddressArg,
    AddressOptions, HeightRange,
};
use crate::error::ServiceResult;
use crate::rpc::types::{AddressBalance, AddressUtxo, MempoolDelta};
use crate::service::core::ServiceCore;
use crate::transaction::fetch::address_detailed_transaction;
use crate::transaction::AddressDetailedTransaction;

/// Confirmed part of a summary; cached per address set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedSummary {
    pub balance: AddressBalance,
    /// Confirmed txids, newest first.
    pub txids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressHistory {
    pub total_count: usize,
    pub items: Vec<AddressDetailedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSummary {
    pub total_received: i64,
    pub total_spent: i64,
    pub balance: i64,
    pub appearances: usize,
    pub unconfirmed_balance: i64,
    pub unconfirmed_appearances: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ValidateAddress {
    #[serde(default, rename = "scriptPubKey")]
    script_pub_key: Option<String>,
}

fn cache_key(addresses: &[String]) -> String {
    addresses.join(",")
}

/// Address queries bound to one [`ServiceCore`].
pub struct AddressEngine<'a> {
    core: &'a ServiceCore,
}

impl<'a> AddressEngine<'a> {
    pub fn new(core: &'a ServiceCore) -> Self {
        Self { core }
    }

    /// Confirmed balance; mempool is not applied.
    pub async fn balance(&self, addresses: impl Into<AddressArg>) -> ServiceResult<AddressBalance> {
        let addresses = addresses.into().into_list();
        let caches = &self.core.caches;
        let key = cache_key(&addresses);
        if let Some(balance) = caches.lookup(&caches.balance, &key) {
            return Ok(balance);
        }
        let generation = caches.generation();
        let balance: AddressBalance = self
            .core
            .pool
            .request("getaddressbalance", vec![json!({ "addresses": addresses })])
            .await?;
        caches.store(&caches.balance, generation, key, balance);
        Ok(balance)
    }

    /// Confirmed UTXOs merged with the mempool when `queryMempool` is set.
    pub async fn unspent_outputs(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<Vec<UnspentOutput>> {
        let addresses = addresses.into().into_list();

        let deltas = if options.query_mempool() {
            Some(self.mempool_deltas(&addresses).await?)
        } else {
            None
        };
        let confirmed = self.confirmed_utxos(&addresses).await?;

        match deltas {
            Some(deltas) if !deltas.is_empty() => {
                let scripts = self.scripts_for(&deltas).await?;
                Ok(reconcile_utxos(confirmed, &deltas, &scripts))
            }
            _ => Ok(confirmed.into_iter().map(UnspentOutput::from).collect()),
        }
    }

    /// Txids, newest first. Mempool txids lead unless a height range is given.
    pub async fn txids(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<Vec<String>> {
        let addresses = addresses.into().into_list();
        let range = height_range(options)?;

        let mempool = if options.query_mempool() && range.is_none() {
            let deltas = self.mempool_deltas(&addresses).await?;
            let mut txids = txids_from_mempool(&deltas);
            txids.reverse();
            txids
        } else {
            Vec::new()
        };

        let confirmed = self.confirmed_txids(&addresses, range).await?;
        let mut txids = mempool;
        txids.extend(confirmed);
        Ok(txids)
    }

    /// Detailed transactions for a window of the txid list.
    pub async fn history(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<AddressHistory> {
        let addresses = addresses.into().into_list();
        let limits = &self.core.config.limits;
        check_address_count(&addresses, limits.max_addresses_query)?;

        let (from, to) = options.window(limits.max_history_query_length)?;
        check_window(from, to, limits.max_history_query_length)?;
        check_order(from, to)?;

        let txids = self.txids(addresses.clone(), options).await?;
        let total_count = txids.len();
        let page = paginate(&txids, from, to)?;

        let core = self.core;
        let addresses = &addresses;
        let items: Vec<AddressDetailedTransaction> = stream::iter(page)
            .map(|txid| async move { address_detailed_transaction(core, &txid, addresses).await })
            .buffered(limits.transaction_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(AddressHistory { total_count, items })
    }

    /// Balance, appearance counts and (unless `noTxList`) a window of txids.
    pub async fn summary(
        &self,
        addresses: impl Into<AddressArg>,
        options: &AddressOptions,
    ) -> ServiceResult<AddressSummary> {
        let addresses = addresses.into().into_list();
        let max_txids = self.core.config.limits.max_txids;
        let (from, to) = options.window(max_txids)?;
        check_window(from, to, max_txids)?;
        if !options.no_tx_list {
            check_order(from, to)?;
        }

        let deltas = if options.query_mempool() {
            self.mempool_deltas(&addresses).await?
        } else {
            Vec::new()
        };
        let confirmed = self.confirmed_summary(&addresses).await?;

        let mempool_txids = txids_from_mempool(&deltas);
        let mut summary = AddressSummary {
            total_received: confirmed.balance.received,
            total_spent: confirmed.balance.received - confirmed.balance.balance,
            balance: confirmed.balance.balance,
            appearances: confirmed.txids.len(),
            unconfirmed_balance: balance_from_mempool(&deltas),
            unconfirmed_appearances: mempool_txids.len(),
            txids: None,
        };

        if !options.no_tx_list {
            let mut all: Vec<String> = mempool_txids.into_iter().rev().collect();
            all.extend(confirmed.txids);
            summary.txids = Some(paginate(&all, from, to)?);
        }
        Ok(summary)
    }

    async fn confirmed_summary(&self, addresses: &[String]) -> ServiceResult<ConfirmedSummary> {
        let caches = &self.core.caches;
        let key = cache_key(addresses);
        if let Some(summary) = caches.lookup(&caches.summary, &key) {
            return Ok(summary);
        }
        let generation = caches.generation();
        let balance = self.balance(addresses.to_vec()).await?;
        let txids = self
            .txids(
                addresses.to_vec(),
                &AddressOptions { query_mempool: Some(false), ..Default::default() },
            )
            .await?;
        let summary = ConfirmedSummary { balance, txids };
        caches.store(&caches.summary, generation, key, summary.clone());
        Ok(summary)
    }

    async fn confirmed_utxos(&self, addresses: &[String]) -> ServiceResult<Vec<AddressUtxo>> {
        let caches = &self.core.caches;
        let key = cache_key(addresses);
        if let Some(utxos) = caches.lookup(&caches.utxos, &key) {
            return Ok(utxos);
        }
        let generation = caches.generation();
        let utxos: Vec<AddressUtxo> = self
            .core
            .pool
            .request("getaddressutxos", vec![json!({ "addresses": addresses })])
            .await?;
        caches.store(&caches.utxos, generation, key, utxos.clone());
        Ok(utxos)
    }

    /// Confirmed txids newest first. Range queries bypass the cache.
    async fn confirmed_txids(
        &self,
        addresses: &[String],
        range: Option<HeightRange>,
    ) -> ServiceResult<Vec<String>> {
        let caches = &self.core.caches;
        let key = cache_key(addresses);

        if let Some(range) = range {
            let params = json!({ "addresses": addresses, "start": range.start, "end": range.end });
            let mut txids: Vec<String> =
                self.core.pool.request("getaddresstxids", vec![params]).await?;
            txids.reverse();
            return Ok(txids);
        }

        if let Some(txids) = caches.lookup(&caches.txids, &key) {
            return Ok(txids);
        }
        let generation = caches.generation();
        let mut txids: Vec<String> = self
            .core
            .pool
            .request("getaddresstxids", vec![json!({ "addresses": addresses })])
            .await?;
        txids.reverse();
        caches.store(&caches.txids, generation, key, txids.clone());
        Ok(txids)
    }

    async fn mempool_deltas(&self, addresses: &[String]) -> ServiceResult<Vec<MempoolDelta>> {
        Ok(self
            .core
            .pool
            .request("getaddressmempool", vec![json!({ "addresses": addresses })])
            .await?)
    }

    /// Output scripts for addresses whose pending outputs lack one.
    async fn scripts_for(&self, deltas: &[MempoolDelta]) -> ServiceResult<HashMap<String, String>> {
        let mut scripts = HashMap::new();
        for address in addresses_needing_script(deltas) {
            if let Some(script) = self.address_script(&address).await? {
                scripts.insert(address, script);
            }
        }
        Ok(scripts)
    }

    async fn address_script(&self, address: &str) -> ServiceResult<Option<String>> {
        let caches = &self.core.caches;
        let key = address.to_string();
        if let Some(script) = caches.lookup(&caches.address_script, &key) {
            return Ok(Some(script));
        }
        let generation = caches.generation();
        let info: ValidateAddress = self
            .core
            .pool
            .request("validateaddress", vec![Value::String(key.clone())])
            .await?;
        if let Some(script) = &info.script_pub_key {
            caches.store(&caches.address_script, generation, key, script.clone());
        }
        Ok(info.script_pub_key)
    }
}
