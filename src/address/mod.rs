//! Address and UTXO reconciliation.
//!
//! # Data Flow
//! ```text
//! caller (address, options)
//!     → options.rs (argument normalisation and validation)
//!     → engine.rs (cached confirmed queries + fresh mempool deltas)
//!     → mempool.rs (spent filtering, pending outputs, mempool balance)
//! ```
//!
//! # Design Decisions
//! - Validation errors are raised before any RPC is issued
//! - Mempool deltas are never cached; they change between blocks

pub mod engine;
pub mod mempool;
pub mod options;

pub use engine::{AddressEngine, AddressHistory, AddressSummary, ConfirmedSummary};
pub use mempool::UnspentOutput;
pub use options::{AddressArg, AddressOptions, PageBound};
