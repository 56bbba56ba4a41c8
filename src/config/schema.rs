//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the chain proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Chain the daemons run on.
    pub network: Network,

    /// Prefix for published channel names (`<service_name>/hashblock`).
    pub service_name: String,

    /// Local daemon to spawn and supervise.
    pub spawn: Option<SpawnConfig>,

    /// Already running daemons to connect to.
    pub connect: Vec<ConnectConfig>,

    /// Retry, polling and shutdown timings.
    pub timing: TimingConfig,

    /// Query size limits.
    pub limits: LimitsConfig,

    /// Capacity of every logical cache.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            network: Network::Livenet,
            service_name: "alterdotd".to_string(),
            spawn: None,
            connect: Vec::new(),
            timing: TimingConfig::default(),
            limits: LimitsConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Chain selection; drives daemon defaults.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Livenet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Livenet => "livenet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    /// Default daemon RPC port.
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Network::Livenet => 31050,
            Network::Testnet | Network::Regtest => 31450,
        }
    }

    /// Sub-directory of the datadir holding network specific files.
    pub fn data_subdir(&self) -> Option<&'static str> {
        match self {
            Network::Livenet => None,
            Network::Testnet => Some("testnet3"),
            Network::Regtest => Some("regtest"),
        }
    }

    /// Network specific daemon config, relative to the datadir.
    pub fn config_path(&self) -> Option<String> {
        self.data_subdir().map(|dir| format!("{}/alterdot.conf", dir))
    }

    /// Command line flag selecting the network on the daemon.
    pub fn daemon_flag(&self) -> Option<&'static str> {
        match self {
            Network::Livenet => None,
            Network::Testnet => Some("--testnet"),
            Network::Regtest => Some("--regtest"),
        }
    }
}

/// Spawned daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Daemon data directory. Relative paths resolve against the config file.
    pub datadir: PathBuf,

    /// Daemon executable.
    pub exec: PathBuf,

    /// Explicit daemon config file (default `<datadir>/alterdot.conf`).
    pub conf_path: Option<PathBuf>,

    /// Transport timeout for RPC calls to the spawned daemon.
    pub rpc_timeout_secs: u64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            datadir: PathBuf::from(".alterdot"),
            exec: PathBuf::from("alterdotd"),
            conf_path: None,
            rpc_timeout_secs: 30,
        }
    }
}

impl SpawnConfig {
    pub fn conf_file(&self) -> PathBuf {
        self.conf_path
            .clone()
            .unwrap_or_else(|| self.datadir.join("alterdot.conf"))
    }

    pub fn pid_file(&self, network: Network) -> PathBuf {
        match network.data_subdir() {
            Some(dir) => self.datadir.join(dir).join("alterdotd.pid"),
            None => self.datadir.join("alterdotd.pid"),
        }
    }
}

/// Connection to an externally managed daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub rpc_protocol: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_user: String,
    pub rpc_password: String,

    /// ZMQ endpoint publishing `hashblock`, `rawtx` and `rawtxlock`.
    pub zmq_pub_raw_tx: Option<String>,

    /// Transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            rpc_protocol: "http".to_string(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: Network::Livenet.default_rpc_port(),
            rpc_user: "alterdot".to_string(),
            rpc_password: String::new(),
            zmq_pub_raw_tx: None,
            timeout_secs: 30,
        }
    }
}

/// Timings for failover, startup, respawn and polling loops.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between failover attempts on successive nodes.
    pub try_all_interval_ms: u64,

    /// Delay between "is the daemon responsive" probes.
    pub start_retry_interval_ms: u64,

    /// Probe budget before startup fails.
    pub start_retry_count: u32,

    /// Base delay before respawning a crashed daemon.
    pub spawn_restart_ms: u64,

    /// Upper bound for the respawn backoff.
    pub spawn_restart_max_ms: u64,

    /// Poll interval while waiting for a stale daemon to exit.
    pub spawn_stop_ms: u64,

    /// Maximum wait for the daemon to exit on stop.
    pub shutdown_timeout_ms: u64,

    /// Poll interval for the tip while the node syncs.
    pub tip_update_interval_ms: u64,

    /// Poll interval while the daemon reindexes.
    pub reindex_wait_ms: u64,

    /// Minimum spacing between two tip refreshes.
    pub tip_coalesce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            try_all_interval_ms: 1000,
            start_retry_interval_ms: 5000,
            start_retry_count: 60,
            spawn_restart_ms: 5000,
            spawn_restart_max_ms: 60_000,
            spawn_stop_ms: 10_000,
            shutdown_timeout_ms: 15_000,
            tip_update_interval_ms: 15_000,
            reindex_wait_ms: 10_000,
            tip_coalesce_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn try_all_interval(&self) -> Duration {
        Duration::from_millis(self.try_all_interval_ms)
    }

    pub fn start_retry_interval(&self) -> Duration {
        Duration::from_millis(self.start_retry_interval_ms)
    }

    pub fn spawn_restart(&self) -> Duration {
        Duration::from_millis(self.spawn_restart_ms)
    }

    pub fn spawn_restart_max(&self) -> Duration {
        Duration::from_millis(self.spawn_restart_max_ms)
    }

    pub fn spawn_stop_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_stop_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn tip_update_interval(&self) -> Duration {
        Duration::from_millis(self.tip_update_interval_ms)
    }

    pub fn reindex_wait(&self) -> Duration {
        Duration::from_millis(self.reindex_wait_ms)
    }

    pub fn tip_coalesce(&self) -> Duration {
        Duration::from_millis(self.tip_coalesce_ms)
    }
}

/// Query size limits enforced before any RPC call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of addresses in one query.
    pub max_addresses_query: usize,

    /// Maximum `to - from` window for address history.
    pub max_history_query_length: usize,

    /// Maximum `to - from` window for summary txid lists.
    pub max_txids: usize,

    /// Detailed transactions fetched concurrently for history pages.
    pub transaction_concurrency: usize,

    /// Headers returned by `get_block_headers` when no count is given.
    pub block_headers_count: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_addresses_query: 100,
            max_history_query_length: 50,
            max_txids: 1000,
            transaction_concurrency: 5,
            block_headers_count: 25,
        }
    }
}

/// Capacity of each logical cache (entries).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub block: usize,
    pub raw_block: usize,
    pub block_header: usize,
    pub transaction: usize,
    pub raw_transaction: usize,
    pub transaction_detailed: usize,
    pub utxos: usize,
    pub txids: usize,
    pub balance: usize,
    pub summary: usize,
    pub masternode_list: usize,

    /// Address → output script lookups (never invalidated).
    pub address_script: usize,

    /// Recently seen ZMQ block hashes.
    pub seen_blocks: usize,

    /// Recently seen ZMQ transaction hashes.
    pub seen_transactions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block: 144,
            raw_block: 72,
            block_header: 288,
            transaction: 100_000,
            raw_transaction: 50_000,
            transaction_detailed: 100_000,
            utxos: 50_000,
            txids: 50_000,
            balance: 50_000,
            summary: 50_000,
            masternode_list: 4,
            address_script: 10_000,
            seen_blocks: 50,
            seen_transactions: 5000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_defaults() {
        assert_eq!(Network::Livenet.default_rpc_port(), 31050);
        assert_eq!(Network::Testnet.default_rpc_port(), 31450);
        assert_eq!(Network::Regtest.default_rpc_port(), 31450);

        assert_eq!(Network::Livenet.config_path(), None);
        assert_eq!(Network::Testnet.config_path().as_deref(), Some("testnet3/alterdot.conf"));
        assert_eq!(Network::Regtest.config_path().as_deref(), Some("regtest/alterdot.conf"));

        assert_eq!(Network::Livenet.daemon_flag(), None);
        assert_eq!(Network::Testnet.daemon_flag(), Some("--testnet"));
        assert_eq!(Network::Regtest.daemon_flag(), Some("--regtest"));
    }

    #[test]
    fn test_minimal_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            network = "testnet"

            [[connect]]
            rpc_port = 31450
            rpc_password = "secret"
            zmq_pub_raw_tx = "tcp://127.0.0.1:28332"
            "#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.connect.len(), 1);
        assert_eq!(config.connect[0].rpc_host, "127.0.0.1");
        assert_eq!(config.timing.start_retry_count, 60);
        assert_eq!(config.limits.max_addresses_query, 100);
        assert!(config.spawn.is_none());
    }

    #[test]
    fn test_pid_file_location() {
        let spawn = SpawnConfig {
            datadir: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(spawn.pid_file(Network::Livenet), PathBuf::from("/data/alterdotd.pid"));
        assert_eq!(
            spawn.pid_file(Network::Testnet),
            PathBuf::from("/data/testnet3/alterdotd.pid")
        );
        assert_eq!(spawn.conf_file(), PathBuf::from("/data/alterdot.conf"));
    }
}
