//! Subscription hub.
//!
//! # Data Flow
//! ```text
//! Event bridge (new block / tx / txlock)
//!     → hub.publish(topic, hex payload)
//!     → hub.publish_address(address, txid) for watched addresses
//!     → each listener's mpsc channel
//! ```

pub mod hub;

pub use hub::{HubStats, Subscriber, SubscriberId, SubscriptionHub, Topic, TopicEvent};
