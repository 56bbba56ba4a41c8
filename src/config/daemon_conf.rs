//! The spawned daemon's own `alterdot.conf`.
//!
//! # Responsibilities
//! - Parse `key=value` daemon config files
//! - Write a default file when none exists
//! - Check the indexes and ZMQ publishers the proxy depends on
//!
//! # Design Decisions
//! - Missing indexes and mismatched ZMQ endpoints are fatal before spawn
//! - `reindex=1` is only a warning; the supervisor waits for it to finish

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::loader::ConfigError;
use crate::config::schema::Network;

/// Indexes without which address and transaction queries cannot be served.
const REQUIRED_INDEXES: [&str; 4] = ["txindex", "addressindex", "spentindex", "timestampindex"];

/// Parsed daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonConf {
    entries: BTreeMap<String, String>,
}

/// What the proxy needs from a validated daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub rpc_port: u16,
    pub rpc_user: String,
    pub rpc_password: String,
    pub zmq_endpoint: String,
    pub reindex: bool,
}

impl DaemonConf {
    /// Parse `key=value` lines; `#` starts a comment, later keys win.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    entries.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        Self { entries }
    }

    /// Read `path`, writing [`default_conf`] there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(ConfigError::Io)?;
            }
            fs::write(path, default_conf()).map_err(ConfigError::Io)?;
            tracing::info!(path = %path.display(), "Wrote default daemon configuration");
        }
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Ok(Self::parse(&text))
    }

    /// Overlay another file's entries (network specific config).
    pub fn merge(&mut self, other: DaemonConf) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }

    /// Check required indexes and ZMQ publishers and extract connection settings.
    pub fn validate(&self, network: Network) -> Result<DaemonSettings, ConfigError> {
        for index in REQUIRED_INDEXES {
            if !self.flag(index) {
                return Err(ConfigError::MissingIndex(format!(
                    "\"{}\" option is required in order to use the address and transaction queries; \
                     please add \"{}=1\" to alterdot.conf",
                    index, index
                )));
            }
        }

        let raw_tx = self.get("zmqpubrawtx").ok_or_else(|| {
            ConfigError::Endpoint(
                "\"zmqpubrawtx\" option is required to get event updates from alterdotd; \
                 please add \"zmqpubrawtx=tcp://127.0.0.1:<port>\" to alterdot.conf"
                    .to_string(),
            )
        })?;
        let hash_block = self.get("zmqpubhashblock").ok_or_else(|| {
            ConfigError::Endpoint(
                "\"zmqpubhashblock\" option is required to get event updates from alterdotd; \
                 please add \"zmqpubhashblock=tcp://127.0.0.1:<port>\" to alterdot.conf"
                    .to_string(),
            )
        })?;
        if !same_host_and_port(raw_tx, hash_block) {
            return Err(ConfigError::Endpoint(
                "\"zmqpubrawtx\" and \"zmqpubhashblock\" are expected to the same host and port in alterdot.conf"
                    .to_string(),
            ));
        }

        let reindex = self.flag("reindex");
        if reindex {
            tracing::warn!(
                "Reindex option is currently enabled, the node will wait for the reindex to finish; \
                 remove \"reindex=1\" from alterdot.conf afterwards"
            );
        }

        let rpc_port = match self.get("rpcport") {
            Some(port) => port.parse().map_err(|_| {
                ConfigError::Endpoint(format!("\"rpcport\" value '{}' is not a port", port))
            })?,
            None => network.default_rpc_port(),
        };

        Ok(DaemonSettings {
            rpc_port,
            rpc_user: self.get("rpcuser").unwrap_or_default().to_string(),
            rpc_password: self.get("rpcpassword").unwrap_or_default().to_string(),
            zmq_endpoint: raw_tx.to_string(),
            reindex,
        })
    }
}

fn same_host_and_port(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a.host_str() == b.host_str() && a.port() == b.port(),
        _ => false,
    }
}

/// Daemon configuration written when none exists.
pub fn default_conf() -> String {
    [
        "server=1",
        "whitelist=127.0.0.1",
        "txindex=1",
        "addressindex=1",
        "timestampindex=1",
        "spentindex=1",
        "zmqpubrawtx=tcp://127.0.0.1:28332",
        "zmqpubrawtxlock=tcp://127.0.0.1:28332",
        "zmqpubhashblock=tcp://127.0.0.1:28332",
        "rpcallowip=127.0.0.1",
        "rpcuser=alterdot",
        "rpcpassword=local321",
        "uacomment=chain-proxy",
        "",
    ]
    .join("\n")
}
