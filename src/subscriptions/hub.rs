//! Listener registry for topic and address notifications.
//!
//! # Responsibilities
//! - Keep listeners per topic (`rawtransaction`, `transactionlock`, `hashblock`)
//! - Keep listeners per watched address, at most once per address
//! - Fan published events out over each listener's channel
//!
//! # Design Decisions
//! - Listeners are channel senders; a closed receiver is pruned on the next publish
//! - Address keys that lose their last listener are removed entirely
//! - Invalid addresses are ignored on subscribe rather than rejected

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::chain::hash::is_valid_address;

/// Event kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    RawTransaction,
    TransactionLock,
    HashBlock,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::RawTransaction, Topic::TransactionLock, Topic::HashBlock];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::RawTransaction => "rawtransaction",
            Topic::TransactionLock => "transactionlock",
            Topic::HashBlock => "hashblock",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Notification delivered to a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum TopicEvent {
    RawTransaction(String),
    TransactionLock(String),
    HashBlock(String),
    AddressTxid { address: String, txid: String },
}

impl TopicEvent {
    /// Channel name as seen by external consumers, e.g. `alterdotd/hashblock`.
    pub fn channel(&self, service: &str) -> String {
        let name = match self {
            TopicEvent::RawTransaction(_) => "rawtransaction",
            TopicEvent::TransactionLock(_) => "transactionlock",
            TopicEvent::HashBlock(_) => "hashblock",
            TopicEvent::AddressTxid { .. } => "addresstxid",
        };
        format!("{}/{}", service, name)
    }
}

pub type SubscriberId = u64;

/// Handle identifying one listener.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    tx: mpsc::UnboundedSender<TopicEvent>,
}

impl Subscriber {
    fn deliver(&self, event: TopicEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Registry counts for the admin API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    pub topics: HashMap<&'static str, usize>,
    pub addresses: usize,
    pub address_listeners: usize,
}

#[derive(Default)]
pub struct SubscriptionHub {
    next_id: AtomicU64,
    topics: RwLock<HashMap<Topic, Vec<Subscriber>>>,
    addresses: DashMap<String, Vec<Subscriber>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a listener handle and the receiving end of its channel.
    pub fn new_subscriber(&self) -> (Subscriber, mpsc::UnboundedReceiver<TopicEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        (Subscriber { id, tx }, rx)
    }

    // --- Topics ---

    pub fn subscribe(&self, topic: Topic, subscriber: &Subscriber) {
        let mut topics = self.topics.write();
        let list = topics.entry(topic).or_default();
        if !list.iter().any(|s| s.id == subscriber.id) {
            list.push(subscriber.clone());
            tracing::debug!(topic = topic.name(), subscriber = subscriber.id, "Subscribed");
        }
    }

    pub fn unsubscribe(&self, topic: Topic, id: SubscriberId) {
        if let Some(list) = self.topics.write().get_mut(&topic) {
            list.retain(|s| s.id != id);
        }
    }

    pub fn topic_subscribers(&self, topic: Topic) -> usize {
        self.topics.read().get(&topic).map_or(0, Vec::len)
    }

    pub fn publish(&self, topic: Topic, event: TopicEvent) {
        let dead: Vec<SubscriberId> = match self.topics.read().get(&topic) {
            Some(list) => list
                .iter()
                .filter(|s| !s.deliver(event.clone()))
                .map(|s| s.id)
                .collect(),
            None => return,
        };
        if !dead.is_empty() {
            if let Some(list) = self.topics.write().get_mut(&topic) {
                list.retain(|s| !dead.contains(&s.id));
            }
        }
    }

    // --- Addresses ---

    pub fn subscribe_address(&self, subscriber: &Subscriber, addresses: &[String]) {
        for address in addresses {
            if !is_valid_address(address) {
                tracing::debug!(address = %address, "Ignoring subscription to invalid address");
                continue;
            }
            let mut list = self.addresses.entry(address.clone()).or_default();
            if !list.iter().any(|s| s.id == subscriber.id) {
                list.push(subscriber.clone());
            }
        }
    }

    /// Remove `id` from the given addresses, or from every address when `None`.
    pub fn unsubscribe_address(&self, id: SubscriberId, addresses: Option<&[String]>) {
        match addresses {
            Some(addresses) => {
                for address in addresses {
                    let emptied = match self.addresses.get_mut(address) {
                        Some(mut list) => {
                            list.retain(|s| s.id != id);
                            list.is_empty()
                        }
                        None => false,
                    };
                    if emptied {
                        self.addresses.remove_if(address, |_, list| list.is_empty());
                    }
                }
            }
            None => {
                self.addresses.retain(|_, list| {
                    list.retain(|s| s.id != id);
                    !list.is_empty()
                });
            }
        }
    }

    pub fn has_address_subscribers(&self) -> bool {
        !self.addresses.is_empty()
    }

    pub fn address_subscribers(&self, address: &str) -> usize {
        self.addresses.get(address).map_or(0, |list| list.len())
    }

    /// Notify every listener watching `address` that `txid` touched it.
    pub fn publish_address(&self, address: &str, txid: &str) {
        let Some(list) = self.addresses.get(address).map(|l| l.value().clone()) else {
            return;
        };
        for subscriber in &list {
            let event = TopicEvent::AddressTxid {
                address: address.to_string(),
                txid: txid.to_string(),
            };
            if !subscriber.deliver(event) {
                self.unsubscribe_address(subscriber.id, Some(&[address.to_string()]));
            }
        }
    }

    /// Drop a listener from every topic and address.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        for list in self.topics.write().values_mut() {
            list.retain(|s| s.id != id);
        }
        self.unsubscribe_address(id, None);
    }

    pub fn stats(&self) -> HubStats {
        let topics = self
            .topics
            .read()
            .iter()
            .map(|(topic, list)| (topic.name(), list.len()))
            .collect();
        HubStats {
            topics,
            addresses: self.addresses.len(),
            address_listeners: self.addresses.iter().map(|e| e.value().len()).sum(),
        }
    }
}

impl std::fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("addresses", &self.addresses.len())
            .finish()
    }
}
