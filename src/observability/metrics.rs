//! Metrics collection and exposition.
//!
//! # Metrics
//! - `chain_proxy_rpc_requests_total` (counter): RPC attempts by method and outcome
//! - `chain_proxy_rpc_failover_exhausted_total` (counter): calls where every node failed
//! - `chain_proxy_cache_lookups_total` (counter): hits/misses per logical cache
//! - `chain_proxy_cache_resets_total` (counter): tip driven invalidations
//! - `chain_proxy_zmq_messages_total` (counter): inbound messages by topic, duplicates flagged
//! - `chain_proxy_tip_refreshes_total` (counter): tip refreshes actually executed
//! - `chain_proxy_daemon_respawns_total` (counter)
//! - `chain_proxy_tip_height` (gauge), `chain_proxy_nodes` (gauge)
//!
//! Without an installed recorder every call is a no-op, so tests need no setup.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rpc_call(method: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "chain_proxy_rpc_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_failover_exhausted() {
    counter!("chain_proxy_rpc_failover_exhausted_total").increment(1);
}

pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("chain_proxy_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}

pub fn record_cache_reset() {
    counter!("chain_proxy_cache_resets_total").increment(1);
}

pub fn record_zmq_message(topic: &str, duplicate: bool) {
    counter!(
        "chain_proxy_zmq_messages_total",
        "topic" => topic.to_string(),
        "duplicate" => if duplicate { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_tip_refresh() {
    counter!("chain_proxy_tip_refreshes_total").increment(1);
}

pub fn record_tip_height(height: u64) {
    gauge!("chain_proxy_tip_height").set(height as f64);
}

pub fn record_node_count(count: usize) {
    gauge!("chain_proxy_nodes").set(count as f64);
}

pub fn record_respawn() {
    counter!("chain_proxy_daemon_respawns_total").increment(1);
}
