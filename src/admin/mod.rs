//! Operator admin API.
//!
//! Read-only JSON views of the running proxy, guarded by a bearer token:
//! `/admin/status`, `/admin/nodes`, `/admin/caches`, `/admin/subscriptions`.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::service::ChainService;

#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<ChainService>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(service: Arc<ChainService>, api_key: &str) -> Self {
        Self {
            service,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/nodes", get(get_nodes))
        .route("/admin/caches", get(get_caches))
        .route("/admin/subscriptions", get(get_subscriptions))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until the service begins shutting down.
pub async fn serve(listener: TcpListener, state: AdminState) -> std::io::Result<()> {
    let service = state.service.clone();
    let local = listener.local_addr()?;
    tracing::info!(address = %local, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { service.core().shutdown.cancelled().await })
        .await
}
