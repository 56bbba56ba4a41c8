//! Upstream daemon RPC subsystem.
//!
//! # Data Flow
//! ```text
//! NodePool::request(method, params)
//!     → client.rs (RpcClient::call, JSON-RPC over HTTP)
//!     → types.rs (decode into daemon records / RpcError)
//! ```

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ChainRpc, HttpRpcClient, RpcClient, RpcEndpoint};
pub use types::{RpcError, RpcResult};
