//! HTTP integration for tenant configuration overlays.
//!
//! Provides an axum middleware that resolves the effective configuration for
//! each request from its host and hands it to handlers through request
//! extensions, plus an admin router for cache invalidation and reloads.

mod admin;
mod extract;
mod middleware;
mod routes;
mod state;

/// Admin control surface.
pub use admin::admin_router;
/// Handler extractor for the resolved configuration.
pub use extract::TenantConfig;
/// Per-request resolution middleware.
pub use middleware::{request_host, resolve_tenant_config, tenant_router};
/// Bundled routes and listener.
pub use routes::{build_admin_router, build_router, serve};
pub use state::TenantConfigState;
