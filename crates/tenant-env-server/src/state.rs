//! Shared state for the middleware and admin routes.

use std::sync::Arc;
use tenant_env_config::{ConfigOverlayResolver, ErrorPolicy};

/// Resolver handle plus the policy applied when an overlay fails.
#[derive(Clone)]
pub struct TenantConfigState {
    pub resolver: Arc<ConfigOverlayResolver>,
    pub policy: ErrorPolicy,
}

impl TenantConfigState {
    pub fn new(resolver: Arc<ConfigOverlayResolver>, policy: ErrorPolicy) -> Self {
        Self { resolver, policy }
    }
}
