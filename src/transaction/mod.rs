//! Detailed transaction assembly.
//!
//! # Data Flow
//! ```text
//! getrawtransaction(txid, 1)
//!     → detailed.rs (inputs, outputs, totals, fee, height -1 when unconfirmed)
//!     → address_details.rs (positions and net amount for queried addresses)
//!     → confirmations from the current tip, clamped at zero
//!     → fetch.rs (cached lookups through the pool)
//! ```

pub mod address_details;
pub mod detailed;
pub mod fetch;

pub use address_details::{address_details, AddressDetailedTransaction, AddressDetails, AddressIndexes};
pub use detailed::{confirmations, DetailedInput, DetailedOutput, DetailedTransaction, SpendInput};
