//! Resilient proxy and indexing layer in front of Alterdot full-node daemons.
//!
//! Adds multi-node failover, tip-synchronized caching, mempool-aware address
//! queries and a subscription hub for blocks, transactions and addresses on
//! top of the daemon's JSON-RPC and ZMQ interfaces.

pub mod address;
pub mod admin;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod rpc;
pub mod service;
pub mod subscriptions;
pub mod transaction;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use lifecycle::Shutdown;
pub use service::ChainService;
