//! Bundled routes and listener used by the `tenant-env serve` command.

use crate::{TenantConfig, TenantConfigState, admin_router, tenant_router};
use axum::routing::get;
use axum::{Json, Router};
use log::{info, warn};
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use tenant_env_config::{ConfigLayer, TenantKey};
use tokio::net::TcpListener;

/// What `/tenant` reports: which layers served the request, never values.
#[derive(Debug, Serialize)]
struct TenantSummary {
    tenant: Option<TenantKey>,
    overlay_applied: bool,
    keys: usize,
    layers: Vec<ConfigLayer>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn tenant_summary(TenantConfig(config): TenantConfig) -> Json<TenantSummary> {
    Json(TenantSummary {
        tenant: config.tenant().cloned(),
        overlay_applied: config.overlay_applied(),
        keys: config.len(),
        layers: config.layers().to_vec(),
    })
}

/// Tenant-facing routes: `/healthz` and tenant-resolved `/tenant`.
///
/// Admin routes are not included; serve [`build_admin_router`] on a separate,
/// internal listener.
pub fn build_router(state: TenantConfigState) -> Router {
    let tenant_routes = tenant_router(Router::new().route("/tenant", get(tenant_summary)), state);
    Router::new()
        .route("/healthz", get(healthz))
        .merge(tenant_routes)
}

/// Cache control routes under `/admin`, for the internal listener.
pub fn build_admin_router(state: TenantConfigState) -> Router {
    Router::new().nest("/admin", admin_router(state))
}

/// Serve `router` on `bind` until Ctrl-C.
pub async fn serve(router: Router, bind: SocketAddr) -> io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("listening (addr={})", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!("failed to install Ctrl-C handler: {err}");
            std::future::pending::<()>().await;
        }
    }
}
