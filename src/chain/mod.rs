//! Chain state shared across the service.
//!
//! - tip.rs: current best height/hash and the genesis block
//! - hash.rs: txids of raw payloads, address checksums

pub mod hash;
pub mod tip;

pub use tip::{ChainTip, TipSnapshot};
