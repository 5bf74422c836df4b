//! Per-request tenant configuration resolution.
//!
//! # Behavior
//!
//! - No host (header or URI authority): 400 Bad Request
//! - Overlay resolved, or tenant has none: configuration inserted into the
//!   request extensions, request passes through
//! - Overlay failed with `ErrorPolicy::Reject`: 500 with a generic body
//! - Overlay failed with `ErrorPolicy::FallbackToBase`: base configuration
//!   inserted, request passes through

use crate::TenantConfigState;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use log::{debug, error, warn};

/// Body returned for every server-side resolution failure.
pub(crate) const GENERIC_ERROR: &str = "internal server error";

/// Wrap application routes so every request carries its tenant's configuration.
pub fn tenant_router(routes: Router, state: TenantConfigState) -> Router {
    routes.layer(from_fn_with_state(state, resolve_tenant_config))
}

/// Host a request was addressed to: the `Host` header, else the URI authority.
pub fn request_host(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|host| !host.is_empty());
    match from_header {
        Some(host) => Some(host.to_string()),
        None => request.uri().authority().map(|authority| {
            match authority.port_u16() {
                Some(port) => format!("{}:{port}", authority.host()),
                None => authority.host().to_string(),
            }
        }),
    }
}

/// Middleware resolving the effective configuration for the request host.
///
/// Install with `axum::middleware::from_fn_with_state` or `tenant_router`.
pub async fn resolve_tenant_config(
    State(state): State<TenantConfigState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(host) = request_host(&request) else {
        warn!("rejecting request without host (path={})", request.uri().path());
        return (StatusCode::BAD_REQUEST, "missing host").into_response();
    };

    let resolver = state.resolver.clone();
    let policy = state.policy;
    let resolved =
        tokio::task::spawn_blocking(move || resolver.resolve_with_policy(&host, policy)).await;

    match resolved {
        Ok(Ok(config)) => {
            debug!(
                "resolved tenant config (tenant={}, overlay={})",
                config.tenant().map_or("-", |tenant| tenant.as_str()),
                config.overlay_applied()
            );
            request.extensions_mut().insert(config);
            next.run(request).await
        }
        Ok(Err(err)) => {
            error!(
                "tenant config resolution failed (tenant={}, kind={}, at={})",
                err.tenant(),
                err.kind(),
                err.redacted()
            );
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
        }
        Err(err) => {
            error!("tenant config resolution task failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
        }
    }
}
