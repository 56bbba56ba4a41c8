//! Resilience helpers for daemon supervision.
//!
//! # Data Flow
//! ```text
//! Daemon not yet answering:
//!     → retries.rs (fixed interval, fixed budget, stop-aware)
//!
//! Daemon crashed:
//!     → backoff.rs (growing respawn delay with jitter)
//! ```
//!
//! Failover across nodes lives in the pool; these helpers only cover
//! waiting on a single daemon.

pub mod backoff;
pub mod retries;

pub use backoff::respawn_delay;
pub use retries::{retry_fixed, RetryError, RetryPolicy};
