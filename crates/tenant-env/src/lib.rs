//! Public surface for tenant-env.
//!
//! Re-exports the config and server crates and provides a small logging
//! helper so binaries wire up output the same way.

/// Re-export for convenience.
pub use tenant_env_config as config;
/// Re-export for convenience.
pub use tenant_env_server as server;

pub use tenant_env_config::{ConfigOverlayResolver, EffectiveConfig, ErrorPolicy, TenantKey};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
