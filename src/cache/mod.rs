//! Tip-synchronized caching.
//!
//! # Data Flow
//! ```text
//! Query
//!     → store.rs lookup (hit: return)
//!     → miss: capture generation, RPC via pool, store if generation unchanged
//!
//! Tip height changes (event bridge)
//!     → store.rs reset_all (every tip cache cleared, generation bumped)
//! ```
//!
//! # Design Decisions
//! - No per-entry expiry; invalidation is whole-cache on tip change only
//! - Keys are request fingerprints built by the query modules

pub mod lru;
pub mod store;

pub use lru::TipCache;
pub use store::{CacheStats, Caches};
