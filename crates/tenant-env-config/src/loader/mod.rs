//! Overlay resolution: host -> tenant key -> merged configuration.
//!
//! The resolver derives a tenant key from the request host, fetches the
//! tenant's overlay from an `OverlaySource`, parses it with the env grammar,
//! and merges it over the shared base configuration. Results may be cached
//! per tenant; nothing here mutates the base or any process-wide state.

mod cache;
mod merge;
mod source;


pub use cache::{DEFAULT_ABSENT_CAPACITY, OverlayCache};
pub use merge::merge_overlay;
pub use source::{FileOverlaySource, MemoryOverlaySource, OverlayDocument, OverlaySource};

use crate::parser::parse_env;
use crate::{
    BaseConfig, ConfigLayer, ConfigLayerSource, EffectiveConfig, ErrorPolicy, ResolveError,
    TenantKey,
};
use log::{debug, info, warn};
use std::sync::Arc;

/// Maps request hosts to effective configurations.
///
/// Safe to share across request threads behind an `Arc`. `resolve` performs
/// blocking reads on a cache miss.
pub struct ConfigOverlayResolver {
    /// Process-wide base configuration.
    base: BaseConfig,
    /// Where tenant overlays are looked up.
    source: Arc<dyn OverlaySource>,
    /// Optional per-tenant cache.
    cache: Option<OverlayCache>,
}

impl ConfigOverlayResolver {
    /// Create an uncached resolver over the given base and overlay source.
    pub fn new(base: BaseConfig, source: impl OverlaySource + 'static) -> Self {
        Self::with_shared_source(base, Arc::new(source))
    }

    /// Create a resolver over a source that is also held elsewhere.
    pub fn with_shared_source(base: BaseConfig, source: Arc<dyn OverlaySource>) -> Self {
        Self {
            base,
            source,
            cache: None,
        }
    }

    /// Cache effective configurations per tenant until invalidated.
    pub fn with_cache(self) -> Self {
        self.with_overlay_cache(OverlayCache::new())
    }

    /// Use a preconfigured cache, e.g. one with a custom base-only bound.
    pub fn with_overlay_cache(mut self, cache: OverlayCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The shared base configuration.
    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    /// The per-tenant cache, when enabled.
    pub fn cache(&self) -> Option<&OverlayCache> {
        self.cache.as_ref()
    }

    /// Resolve the effective configuration for a request host.
    ///
    /// Hosts without a usable tenant key and tenants without an overlay get
    /// the base configuration.
    pub fn resolve(&self, host: &str) -> Result<EffectiveConfig, ResolveError> {
        let tenant = TenantKey::from_host(host);
        self.resolve_key(tenant.as_ref())
    }

    /// Resolve for an already derived tenant key.
    pub fn resolve_key(&self, tenant: Option<&TenantKey>) -> Result<EffectiveConfig, ResolveError> {
        let Some(tenant) = tenant else {
            return Ok(EffectiveConfig::from_base(&self.base, None));
        };
        match &self.cache {
            Some(cache) => cache.get_or_load(tenant, || self.load(tenant)),
            None => self.load(tenant),
        }
    }

    /// Resolve and apply the caller's error policy.
    ///
    /// With `ErrorPolicy::FallbackToBase` a failed overlay is logged and the
    /// base configuration is returned for that tenant.
    pub fn resolve_with_policy(
        &self,
        host: &str,
        policy: ErrorPolicy,
    ) -> Result<EffectiveConfig, ResolveError> {
        let tenant = TenantKey::from_host(host);
        match self.resolve_key(tenant.as_ref()) {
            Ok(config) => Ok(config),
            Err(err) if policy == ErrorPolicy::FallbackToBase => {
                warn!(
                    "overlay failed, serving base config (tenant={}, kind={}, at={})",
                    err.tenant(),
                    err.kind(),
                    err.redacted()
                );
                Ok(EffectiveConfig::from_base(&self.base, tenant))
            }
            Err(err) => Err(err),
        }
    }

    /// Re-read a tenant's overlay, replacing the cached entry on success.
    ///
    /// On failure any previously cached configuration stays in place.
    pub fn reload(&self, tenant: &TenantKey) -> Result<EffectiveConfig, ResolveError> {
        match &self.cache {
            Some(cache) => cache.reload(tenant, || self.load(tenant)),
            None => self.load(tenant),
        }
    }

    /// Drop a tenant's cached configuration.
    pub fn invalidate(&self, tenant: &TenantKey) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.invalidate(tenant))
    }

    /// Drop every cached configuration.
    pub fn invalidate_all(&self) -> usize {
        self.cache.as_ref().map_or(0, OverlayCache::invalidate_all)
    }

    fn load(&self, tenant: &TenantKey) -> Result<EffectiveConfig, ResolveError> {
        let document = self.source.fetch(tenant).map_err(|source| {
            ResolveError::OverlaySourceUnreadable {
                tenant: tenant.clone(),
                source,
            }
        })?;
        let Some(document) = document else {
            debug!(
                "no overlay for tenant (tenant={tenant}, source={})",
                self.source.describe(tenant)
            );
            return Ok(EffectiveConfig::from_base(&self.base, Some(tenant.clone())));
        };

        let overlay = parse_env(&document.origin, &document.contents).map_err(|source| {
            ResolveError::OverlayParseError {
                tenant: tenant.clone(),
                source,
            }
        })?;
        let overridden = overlay
            .keys()
            .filter(|key| self.base.values().contains_key(*key))
            .count();
        let values = merge_overlay(self.base.values(), &overlay);
        info!(
            "applied tenant overlay (tenant={tenant}, source={}, keys={}, overridden={overridden})",
            document.origin,
            overlay.len()
        );
        let layer = ConfigLayer {
            source: ConfigLayerSource::Overlay,
            origin: Some(document.origin),
            keys: overlay.len(),
        };
        Ok(EffectiveConfig::with_overlay(
            &self.base,
            tenant.clone(),
            values,
            layer,
        ))
    }
}
