use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::cache::CacheStats;
use crate::service::ServiceStatus;
use crate::subscriptions::HubStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    #[serde(flatten)]
    pub service: ServiceStatus,
}

#[derive(Debug, Serialize)]
pub struct NodeStatus {
    pub index: usize,
    pub endpoint: String,
    pub spawned: bool,
    pub zmq_endpoint: Option<String>,
    pub consecutive_failures: usize,
    pub total_calls: u64,
    pub total_failures: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        service: state.service.status(),
    })
}

pub async fn get_nodes(State(state): State<AdminState>) -> Json<Vec<NodeStatus>> {
    let nodes = state.service.core().pool.nodes();
    let statuses = nodes
        .iter()
        .map(|node| NodeStatus {
            index: node.index,
            endpoint: node.endpoint(),
            spawned: node.spawned,
            zmq_endpoint: node.zmq_endpoint.clone(),
            consecutive_failures: node.consecutive_failures(),
            total_calls: node.total_calls(),
            total_failures: node.total_failures(),
        })
        .collect();
    Json(statuses)
}

pub async fn get_caches(State(state): State<AdminState>) -> Json<Vec<CacheStats>> {
    Json(state.service.core().caches.stats())
}

pub async fn get_subscriptions(State(state): State<AdminState>) -> Json<HubStats> {
    Json(state.service.core().hub.stats())
}
