//! Real-time events.
//!
//! # Data Flow
//! ```text
//! Node registered by the supervisor
//!     → bridge.rs attach (sync polling, then message pump)
//!     → source.rs (ZMQ SUB socket, best-hash polling, or test channel)
//!     → seen.rs (drop repeats across nodes)
//!     → tip_updater.rs (coalesced tip refresh)
//!     → bus.rs (typed ServiceEvent broadcast) + subscription hub
//! ```

pub mod bridge;
pub mod bus;
pub mod seen;
pub mod source;
pub mod tip_updater;

pub use bridge::EventBridge;
pub use bus::{EventBus, ServiceEvent};
pub use source::{channel_source, ChannelSource, EventSource, PollingSource};
pub use tip_updater::{TipRefresher, TipUpdater};
