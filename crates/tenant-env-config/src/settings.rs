//! Resolver settings loaded from `tenant-env.json5`.

use crate::loader::{
    ConfigOverlayResolver, DEFAULT_ABSENT_CAPACITY, FileOverlaySource, OverlayCache,
};
use crate::model::read_config_file;
use crate::{BaseConfig, ConfigError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// What a caller does when a tenant's overlay cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Fail the request with a generic server error.
    #[default]
    #[serde(rename = "reject")]
    Reject,
    /// Log the failure and serve the base configuration.
    #[serde(rename = "fallback")]
    FallbackToBase,
}

/// Root settings for building a resolver and serving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSettings {
    /// Base env file; overlays live beside it unless `overlay_dir` is set.
    #[serde(default = "default_base_path")]
    pub base: PathBuf,
    /// Directory holding `<base-name>.<tenant>` overlay files.
    #[serde(default)]
    pub overlay_dir: Option<PathBuf>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            base: default_base_path(),
            overlay_dir: None,
            cache: CacheSettings::default(),
            on_error: ErrorPolicy::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Per-tenant cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How many tenants without an overlay stay cached; `0` caches none.
    #[serde(default = "default_max_absent")]
    pub max_absent: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_absent: default_max_absent(),
        }
    }
}

/// Listener settings for the bundled server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Tenant-facing listener.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Listener for the `/admin` cache routes. Keep it off public interfaces.
    #[serde(default = "default_admin_bind")]
    pub admin_bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_bind: default_admin_bind(),
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from(".env")
}

fn default_true() -> bool {
    true
}

fn default_max_absent() -> usize {
    DEFAULT_ABSENT_CAPACITY
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_admin_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

impl ResolverSettings {
    /// Load settings from a json5 file.
    ///
    /// Relative `base` and `overlay_dir` paths are resolved against the
    /// directory containing the settings file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading resolver settings (path={})", path.display());
        let contents = read_config_file(path)?;
        let mut settings = Self::load_from_str(&contents)?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            settings.base = dir.join(&settings.base);
            settings.overlay_dir = settings.overlay_dir.map(|overlay| dir.join(overlay));
        }
        Ok(settings)
    }

    /// Load settings from json5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("parsing resolver settings (len={})", contents.len());
        let settings: Self = json5::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base.file_name().is_none() {
            return Err(ConfigError::Invalid(format!(
                "base must name a file: {}",
                self.base.display()
            )));
        }
        let server = &self.server;
        if server.bind.port() != 0 && server.bind == server.admin_bind {
            return Err(ConfigError::Invalid(format!(
                "admin_bind must differ from bind: {}",
                server.bind
            )));
        }
        Ok(())
    }

    /// Load the base file and build a resolver with file overlays.
    pub fn build_resolver(&self) -> Result<ConfigOverlayResolver, ConfigError> {
        let base = BaseConfig::load_from_path(&self.base)?;
        let source = match &self.overlay_dir {
            Some(dir) => {
                let name = self
                    .base
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "base file name is not utf-8: {}",
                            self.base.display()
                        ))
                    })?;
                FileOverlaySource::new(dir, name)
            }
            None => FileOverlaySource::beside(&self.base)?,
        };
        let resolver = ConfigOverlayResolver::new(base, source);
        Ok(if self.cache.enabled {
            let cache = OverlayCache::with_absent_capacity(self.cache.max_absent);
            resolver.with_overlay_cache(cache)
        } else {
            resolver
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = ResolverSettings::load_from_str("{}").expect("settings");
        assert_eq!(settings, ResolverSettings::default());
        assert_eq!(settings.base, PathBuf::from(".env"));
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.max_absent, DEFAULT_ABSENT_CAPACITY);
        assert_eq!(settings.on_error, ErrorPolicy::Reject);
        assert_ne!(settings.server.bind, settings.server.admin_bind);
    }

    #[test]
    fn parses_all_fields() {
        let json5 = r#"{
            // comments are allowed
            base: "conf/app.env",
            overlay_dir: "tenants",
            cache: { enabled: false, max_absent: 16 },
            on_error: "fallback",
            server: { bind: "0.0.0.0:9000", admin_bind: "127.0.0.1:9001" },
        }"#;
        let settings = ResolverSettings::load_from_str(json5).expect("settings");
        assert_eq!(settings.base, PathBuf::from("conf/app.env"));
        assert_eq!(settings.overlay_dir, Some(PathBuf::from("tenants")));
        assert!(!settings.cache.enabled);
        assert_eq!(settings.cache.max_absent, 16);
        assert_eq!(settings.on_error, ErrorPolicy::FallbackToBase);
        assert_eq!(settings.server.bind.port(), 9000);
        assert_eq!(settings.server.admin_bind.port(), 9001);
    }

    #[test]
    fn rejects_admin_on_the_tenant_listener() {
        let err = ResolverSettings::load_from_str(
            r#"{ server: { bind: "0.0.0.0:9000", admin_bind: "0.0.0.0:9000" } }"#,
        )
        .expect_err("shared listener");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ResolverSettings::load_from_str("{ unexpected: true }").expect_err("unknown");
        assert!(matches!(err, ConfigError::SettingsParseFailed(_)));
        assert!(err.to_string().contains("unexpected"));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = ResolverSettings::load_from_str(r#"{ on_error: "ignore" }"#).expect_err("policy");
        assert!(matches!(err, ConfigError::SettingsParseFailed(_)));
    }

    #[test]
    fn non_utf8_settings_file_is_a_decode_error() {
        let temp = TempDir::new().expect("tmp");
        let path = temp.path().join("tenant-env.json5");
        fs::write(&path, [b'{', 0xff, b'}']).expect("write");

        let err = ResolverSettings::load_from_path(&path).expect_err("decode");
        assert!(matches!(err, ConfigError::DecodeFailed { .. }));
    }

    #[test]
    fn relative_paths_resolve_against_settings_dir() {
        let temp = TempDir::new().expect("tmp");
        let path = temp.path().join("tenant-env.json5");
        fs::write(&path, r#"{ base: "app.env", overlay_dir: "tenants" }"#).expect("write");

        let settings = ResolverSettings::load_from_path(&path).expect("settings");
        assert_eq!(settings.base, temp.path().join("app.env"));
        assert_eq!(settings.overlay_dir, Some(temp.path().join("tenants")));
    }

    #[test]
    fn builds_resolver_with_overlay_dir() {
        let temp = TempDir::new().expect("tmp");
        fs::write(temp.path().join("app.env"), "APP_NAME=Main\n").expect("base");
        fs::create_dir_all(temp.path().join("tenants")).expect("dir");
        fs::write(temp.path().join("tenants/app.env.alpha"), "APP_NAME=Alpha\n").expect("overlay");
        let path = temp.path().join("tenant-env.json5");
        fs::write(
            &path,
            r#"{ base: "app.env", overlay_dir: "tenants", cache: { max_absent: 4 } }"#,
        )
        .expect("write");

        let resolver = ResolverSettings::load_from_path(&path)
            .expect("settings")
            .build_resolver()
            .expect("resolver");
        let cache = resolver.cache().expect("cache");
        assert_eq!(cache.absent_capacity(), 4);
        let config = resolver.resolve("alpha.example.com").expect("resolve");
        assert_eq!(config.get("APP_NAME"), Some("Alpha"));
    }
}
