//! Upstream node pool.
//!
//! # Data Flow
//! ```text
//! Query (service / address engine / event bridge)
//!     → node_pool.rs (start at cursor, advance cursor)
//!     → node.rs (one RPC client per daemon)
//!     → on error: sleep try_all_interval, next node
//!     → all nodes failed: last error returned
//! ```
//!
//! # Design Decisions
//! - The pool is fixed after startup; nodes are never removed
//! - Health is per call, a failed node stays in rotation
//! - Attempts within one call are sequential, never fanned out

pub mod node;
pub mod node_pool;
pub mod round_robin;

pub use node::Node;
pub use node_pool::NodePool;
