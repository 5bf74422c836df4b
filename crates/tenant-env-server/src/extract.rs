//! Extractor for the configuration resolved by the middleware.

use crate::middleware::GENERIC_ERROR;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use log::error;
use tenant_env_config::EffectiveConfig;

/// The request's effective configuration.
///
/// Rejects with 500 when `resolve_tenant_config` did not run for the route.
#[derive(Debug, Clone)]
pub struct TenantConfig(pub EffectiveConfig);

impl<S> FromRequestParts<S> for TenantConfig
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<EffectiveConfig>() {
            Some(config) => Ok(Self(config.clone())),
            None => {
                error!(
                    "tenant config missing; is the middleware installed? (path={})",
                    parts.uri.path()
                );
                Err((StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR))
            }
        }
    }
}
