//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! service config file (TOML)
//!     → loader.rs (parse, resolve relative datadir)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! spawned daemon:
//!     alterdot.conf (+ network override)
//!     → daemon_conf.rs (write default, parse, check indexes and ZMQ)
//!     → DaemonSettings (rpc port/credentials, ZMQ endpoint, reindex)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod daemon_conf;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, ConnectConfig, LimitsConfig, Network, ServiceConfig, SpawnConfig,
    TimingConfig,
};
