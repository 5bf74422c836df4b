//! Admin routes for the tenant configuration cache.
//!
//! - `POST /cache/invalidate` drops every cached tenant
//! - `POST /cache/invalidate/{tenant}` drops one tenant
//! - `POST /cache/reload/{tenant}` re-reads one tenant's overlay, keeping the
//!   cached entry when the new overlay fails

use crate::TenantConfigState;
use crate::middleware::GENERIC_ERROR;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info};
use serde::Serialize;
use tenant_env_config::{ConfigLayer, TenantKey};

#[derive(Debug, Serialize)]
struct InvalidateAllResponse {
    invalidated: usize,
}

#[derive(Debug, Serialize)]
struct InvalidateTenantResponse {
    tenant: TenantKey,
    invalidated: bool,
}

/// Layer metadata only; values never leave the process through admin routes.
#[derive(Debug, Serialize)]
struct ReloadResponse {
    tenant: TenantKey,
    overlay_applied: bool,
    layers: Vec<ConfigLayer>,
}

/// Router exposing the cache control surface. Mount under an admin prefix.
///
/// The routes are unauthenticated. Serve them only on an internal listener,
/// never on the one that accepts tenant traffic.
pub fn admin_router(state: TenantConfigState) -> Router {
    Router::new()
        .route("/cache/invalidate", post(invalidate_all))
        .route("/cache/invalidate/{tenant}", post(invalidate_tenant))
        .route("/cache/reload/{tenant}", post(reload_tenant))
        .with_state(state)
}

async fn invalidate_all(State(state): State<TenantConfigState>) -> Json<InvalidateAllResponse> {
    let invalidated = state.resolver.invalidate_all();
    info!("admin invalidated all tenants (count={invalidated})");
    Json(InvalidateAllResponse { invalidated })
}

async fn invalidate_tenant(
    State(state): State<TenantConfigState>,
    Path(raw): Path<String>,
) -> Response {
    let Some(tenant) = TenantKey::parse(&raw) else {
        return (StatusCode::BAD_REQUEST, "invalid tenant key").into_response();
    };
    let invalidated = state.resolver.invalidate(&tenant);
    Json(InvalidateTenantResponse {
        tenant,
        invalidated,
    })
    .into_response()
}

async fn reload_tenant(
    State(state): State<TenantConfigState>,
    Path(raw): Path<String>,
) -> Response {
    let Some(tenant) = TenantKey::parse(&raw) else {
        return (StatusCode::BAD_REQUEST, "invalid tenant key").into_response();
    };
    let resolver = state.resolver.clone();
    let key = tenant.clone();
    let reloaded = tokio::task::spawn_blocking(move || resolver.reload(&key)).await;

    match reloaded {
        Ok(Ok(config)) => {
            info!(
                "admin reloaded tenant (tenant={tenant}, overlay={})",
                config.overlay_applied()
            );
            Json(ReloadResponse {
                tenant,
                overlay_applied: config.overlay_applied(),
                layers: config.layers().to_vec(),
            })
            .into_response()
        }
        Ok(Err(err)) => {
            error!(
                "admin reload failed (tenant={tenant}, kind={}, at={})",
                err.kind(),
                err.redacted()
            );
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
        }
        Err(err) => {
            error!("admin reload task failed (tenant={tenant}): {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
        }
    }
}
