//! The set of tip-synchronized caches.
//!
//! # Responsibilities
//! - Own one LRU per logical cache, sized from `[cache]` config
//! - Clear all of them as one step when the tip moves
//! - Drop results computed against a tip that has since been replaced
//!
//! # Design Decisions
//! - A reset holds the write side of `reset_lock`; lookups and stores hold the
//!   read side, so no reader sees some caches cleared and others not
//! - Each reset bumps `generation`; a query captures the generation before
//!   its RPC calls and its result is only stored if no reset happened since
//! - `address_script` maps an address to its script form, which never
//!   depends on the tip, so it is not cleared

use parking_lot::RwLock;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::address::ConfirmedSummary;
use crate::cache::lru::TipCache;
use crate::config::schema::CacheConfig;
use crate::observability::metrics;
use crate::rpc::types::{AddressBalance, AddressUtxo, RawTransaction, VerboseBlock};
use crate::service::governance::MasternodeEntry;
use crate::transaction::DetailedTransaction;

/// Occupancy of one logical cache, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub capacity: usize,
}

pub struct Caches {
    pub block: TipCache<String, VerboseBlock>,
    pub raw_block: TipCache<String, String>,
    pub block_header: TipCache<String, VerboseBlock>,
    pub transaction: TipCache<String, RawTransaction>,
    pub raw_transaction: TipCache<String, String>,
    pub transaction_detailed: TipCache<String, DetailedTransaction>,
    pub utxos: TipCache<String, Vec<AddressUtxo>>,
    pub txids: TipCache<String, Vec<String>>,
    pub balance: TipCache<String, AddressBalance>,
    pub summary: TipCache<String, ConfirmedSummary>,
    pub masternode_list: TipCache<String, Vec<MasternodeEntry>>,
    pub address_script: TipCache<String, String>,

    generation: AtomicU64,
    reset_lock: RwLock<()>,
}

impl Caches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            block: TipCache::new("block", config.block),
            raw_block: TipCache::new("raw_block", config.raw_block),
            block_header: TipCache::new("block_header", config.block_header),
            transaction: TipCache::new("transaction", config.transaction),
            raw_transaction: TipCache::new("raw_transaction", config.raw_transaction),
            transaction_detailed: TipCache::new(
                "transaction_detailed",
                config.transaction_detailed,
            ),
            utxos: TipCache::new("utxos", config.utxos),
            txids: TipCache::new("txids", config.txids),
            balance: TipCache::new("balance", config.balance),
            summary: TipCache::new("summary", config.summary),
            masternode_list: TipCache::new("masternode_list", config.masternode_list),
            address_script: TipCache::new("address_script", config.address_script),
            generation: AtomicU64::new(0),
            reset_lock: RwLock::new(()),
        }
    }

    /// Generation to capture before issuing the RPC calls behind a cache fill.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn lookup<K: Hash + Eq, V: Clone>(&self, cache: &TipCache<K, V>, key: &K) -> Option<V> {
        let _guard = self.reset_lock.read();
        cache.get(key)
    }

    /// Store `value` unless a reset happened after `generation` was captured.
    pub fn store<K: Hash + Eq, V: Clone>(
        &self,
        cache: &TipCache<K, V>,
        generation: u64,
        key: K,
        value: V,
    ) {
        let _guard = self.reset_lock.read();
        if self.generation() == generation {
            cache.put(key, value);
        } else {
            tracing::debug!(cache = cache.name(), "Discarding result computed before tip change");
        }
    }

    /// Clear every tip-dependent cache as one step.
    pub fn reset_all(&self) {
        let _guard = self.reset_lock.write();
        self.block.clear();
        self.raw_block.clear();
        self.block_header.clear();
        self.transaction.clear();
        self.raw_transaction.clear();
        self.transaction_detailed.clear();
        self.utxos.clear();
        self.txids.clear();
        self.balance.clear();
        self.summary.clear();
        self.masternode_list.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        metrics::record_cache_reset();
        tracing::debug!("Tip caches reset");
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        fn entry<K: Hash + Eq, V: Clone>(cache: &TipCache<K, V>) -> CacheStats {
            CacheStats {
                name: cache.name(),
                entries: cache.len(),
                capacity: cache.capacity(),
            }
        }
        vec![
            entry(&self.block),
            entry(&self.raw_block),
            entry(&self.block_header),
            entry(&self.transaction),
            entry(&self.raw_transaction),
            entry(&self.transaction_detailed),
            entry(&self.utxos),
            entry(&self.txids),
            entry(&self.balance),
            entry(&self.summary),
            entry(&self.masternode_list),
            entry(&self.address_script),
        ]
    }
}

impl std::fmt::Debug for Caches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caches")
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caches() -> Caches {
        Caches::new(&CacheConfig::default())
    }

    #[test]
    fn test_reset_clears_tip_caches_but_not_scripts() {
        let caches = caches();
        let gen = caches.generation();
        caches.store(&caches.raw_transaction, gen, "tx".into(), "00".into());
        caches.store(&caches.address_script, gen, "addr".into(), "76a9".into());
        caches.store(
            &caches.balance,
            gen,
            "addr".into(),
            AddressBalance { balance: 5, received: 10 },
        );

        caches.reset_all();

        assert!(caches.lookup(&caches.raw_transaction, &"tx".to_string()).is_none());
        assert!(caches.lookup(&caches.balance, &"addr".to_string()).is_none());
        assert_eq!(
            caches.lookup(&caches.address_script, &"addr".to_string()),
            Some("76a9".to_string())
        );
        assert_eq!(caches.generation(), gen + 1);
    }

    #[test]
    fn test_stale_generation_is_not_stored() {
        let caches = caches();
        let gen = caches.generation();
        caches.reset_all();
        caches.store(&caches.txids, gen, "addr".into(), vec!["a".into()]);
        assert!(caches.lookup(&caches.txids, &"addr".to_string()).is_none());
    }

    #[test]
    fn test_stats_cover_every_cache() {
        let stats = caches().stats();
        assert_eq!(stats.len(), 12);
        assert!(stats.iter().any(|s| s.name == "masternode_list" && s.capacity == 4));
    }
}
