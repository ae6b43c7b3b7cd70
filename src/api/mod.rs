//! REST facade over the same Proxmox operations the bot uses.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod resources;

use crate::auth::TokenIssuer;
use crate::proxmox::{ProxmoxClient, ResourceKind};
use crate::store::Store;
use anyhow::{Context, Result};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub proxmox: Arc<ProxmoxClient>,
    pub store: Store,
    pub tokens: TokenIssuer,
    /// Guest agent wait for single-resource lookups.
    pub ip_timeout: Duration,
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Proxmox Cloud API", "status": "running" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn resource_routes(prefix: &str, kind: ResourceKind) -> Router<AppState> {
    Router::new()
        .route(prefix, get(resources::list).post(resources::create))
        .route(
            &format!("{}/{{id}}", prefix),
            get(resources::get).delete(resources::delete),
        )
        .route(&format!("{}/{{id}}/start", prefix), post(resources::start))
        .route(&format!("{}/{{id}}/stop", prefix), post(resources::stop))
        .route(
            &format!("{}/{{id}}/shutdown", prefix),
            post(resources::shutdown),
        )
        .route(&format!("{}/{{id}}/restart", prefix), post(resources::restart))
        .layer(Extension(kind))
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(resource_routes("/vms", ResourceKind::Qemu))
        .merge(resource_routes("/lxc", ResourceKind::Lxc))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("REST API listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("REST API server failed")?;
    Ok(())
}
