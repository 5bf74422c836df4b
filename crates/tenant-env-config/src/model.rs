//! Configuration value models.

use crate::parser::parse_env;
use crate::{ConfigError, TenantKey};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Key/value pairs of a configuration source.
pub type ConfigValues = BTreeMap<String, String>;

/// Process-wide default configuration, immutable after load.
///
/// Cloning is cheap; every clone shares the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseConfig {
    values: Arc<ConfigValues>,
    origin: Option<String>,
}

impl BaseConfig {
    /// Load the base configuration from an env file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = read_config_file(path)?;
        let origin = path.display().to_string();
        let values = parse_env(&origin, &contents)?;
        info!(
            "loaded base config (path={}, keys={})",
            path.display(),
            values.len()
        );
        Ok(Self {
            values: Arc::new(values),
            origin: Some(origin),
        })
    }

    /// Parse the base configuration from env-file contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        let values = parse_env("base", contents)?;
        Ok(Self::from_values(values))
    }

    /// Wrap already parsed values.
    pub fn from_values(values: ConfigValues) -> Self {
        Self {
            values: Arc::new(values),
            origin: None,
        }
    }

    /// Look up a single value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// All base values.
    pub fn values(&self) -> &ConfigValues {
        &self.values
    }

    /// Where the values were loaded from, when loaded from a file.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn shared_values(&self) -> Arc<ConfigValues> {
        Arc::clone(&self.values)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BaseConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_values(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Read a config file, separating I/O failures from undecodable contents.
pub(crate) fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|source| ConfigError::DecodeFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Origin of a layer that contributed to an effective configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayerSource {
    /// Process-wide base configuration.
    Base,
    /// Tenant overlay (highest precedence).
    Overlay,
}

/// Metadata about a layer, without its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Source name (a path for file-backed layers), if known.
    pub origin: Option<String>,
    /// Number of keys the layer defined.
    pub keys: usize,
}

/// The merged configuration that serves a single request.
///
/// Read-only; cloning shares the underlying values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    tenant: Option<TenantKey>,
    values: Arc<ConfigValues>,
    layers: Arc<[ConfigLayer]>,
}

impl EffectiveConfig {
    /// Configuration made of the base layer only.
    pub(crate) fn from_base(base: &BaseConfig, tenant: Option<TenantKey>) -> Self {
        Self {
            tenant,
            values: base.shared_values(),
            layers: Arc::from(vec![base_layer(base)]),
        }
    }

    /// Configuration with an overlay applied on top of the base.
    pub(crate) fn with_overlay(
        base: &BaseConfig,
        tenant: TenantKey,
        values: ConfigValues,
        overlay: ConfigLayer,
    ) -> Self {
        Self {
            tenant: Some(tenant),
            values: Arc::new(values),
            layers: Arc::from(vec![base_layer(base), overlay]),
        }
    }

    /// Tenant the configuration was resolved for.
    pub fn tenant(&self) -> Option<&TenantKey> {
        self.tenant.as_ref()
    }

    /// Look up a single value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// All effective values.
    pub fn values(&self) -> &ConfigValues {
        &self.values
    }

    /// Layers in precedence order (low -> high).
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Whether a tenant overlay contributed to this configuration.
    pub fn overlay_applied(&self) -> bool {
        self.layers
            .iter()
            .any(|layer| layer.source == ConfigLayerSource::Overlay)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

fn base_layer(base: &BaseConfig) -> ConfigLayer {
    ConfigLayer {
        source: ConfigLayerSource::Base,
        origin: base.origin.clone(),
        keys: base.len(),
    }
}
