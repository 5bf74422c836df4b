//! Tenant configuration overlays keyed by request subdomain.
//!
//! This crate owns the env-file grammar, tenant key derivation, overlay
//! sources, and the resolver that merges a tenant's overlay over the
//! process-wide base configuration.

mod error;
mod loader;
mod model;
mod parser;
mod settings;
mod tenant;

/// Error types returned by loading, parsing, and resolution.
pub use error::{ConfigError, ParseError, ResolveError};
/// Resolver, overlay sources, and the per-tenant cache.
pub use loader::{
    ConfigOverlayResolver, DEFAULT_ABSENT_CAPACITY, FileOverlaySource, MemoryOverlaySource,
    OverlayCache, OverlayDocument, OverlaySource, merge_overlay,
};
/// Configuration value models.
pub use model::{BaseConfig, ConfigLayer, ConfigLayerSource, ConfigValues, EffectiveConfig};
/// Env-file grammar.
pub use parser::parse_env;
/// Resolver settings file models.
pub use settings::{CacheSettings, ErrorPolicy, ResolverSettings, ServerSettings};
pub use tenant::TenantKey;
