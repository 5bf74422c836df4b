//! Overlay sources: where a tenant's overrides are read from.

use crate::{ConfigError, TenantKey};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Raw overlay text plus the name it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayDocument {
    /// Source name used in errors and layer metadata.
    pub origin: String,
    /// Unparsed env-file contents.
    pub contents: String,
}

/// Lookup of tenant overlays by the `<base-name>.<tenant>` convention.
///
/// Implementations must be safe to call from many request threads at once.
pub trait OverlaySource: Send + Sync {
    /// Read the overlay for a tenant. `Ok(None)` means the tenant has none.
    fn fetch(&self, tenant: &TenantKey) -> io::Result<Option<OverlayDocument>>;

    /// Conventional name of the tenant's overlay, for logs.
    fn describe(&self, tenant: &TenantKey) -> String;
}

/// Overlay files stored beside the base env file, e.g. `.env.alpha`.
#[derive(Debug, Clone)]
pub struct FileOverlaySource {
    /// Directory containing overlay files.
    dir: PathBuf,
    /// File name of the base config that overlays are suffixed onto.
    base_name: String,
}

impl FileOverlaySource {
    /// Look for `<dir>/<base_name>.<tenant>`.
    pub fn new(dir: impl AsRef<Path>, base_name: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            base_name: base_name.into(),
        }
    }

    /// Derive directory and base name from the base file path, so that
    /// `/srv/app/.env` looks up `/srv/app/.env.<tenant>`.
    pub fn beside(base_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base_path = base_path.as_ref();
        let base_name = base_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "base path has no usable file name: {}",
                    base_path.display()
                ))
            })?;
        let dir = match base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self::new(dir, base_name))
    }

    /// Full path of a tenant's overlay file.
    pub fn overlay_path(&self, tenant: &TenantKey) -> PathBuf {
        self.dir.join(format!("{}.{}", self.base_name, tenant))
    }
}

impl OverlaySource for FileOverlaySource {
    fn fetch(&self, tenant: &TenantKey) -> io::Result<Option<OverlayDocument>> {
        let path = self.overlay_path(tenant);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(OverlayDocument {
                origin: path.display().to_string(),
                contents,
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("overlay file missing (path={})", path.display());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn describe(&self, tenant: &TenantKey) -> String {
        self.overlay_path(tenant).display().to_string()
    }
}

/// In-memory overlays, e.g. prefetched from a secret store.
///
/// Entries can be replaced at runtime; resolvers with a cache only observe
/// the change after the tenant is invalidated or reloaded.
#[derive(Debug, Default)]
pub struct MemoryOverlaySource {
    base_name: String,
    overlays: RwLock<HashMap<TenantKey, String>>,
}

impl MemoryOverlaySource {
    /// Create an empty source whose overlays are named `<base_name>.<tenant>`.
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            overlays: RwLock::new(HashMap::new()),
        }
    }

    /// Add an overlay while building the source.
    pub fn with_overlay(self, tenant: TenantKey, contents: impl Into<String>) -> Self {
        self.insert(tenant, contents);
        self
    }

    /// Set or replace a tenant's overlay contents.
    pub fn insert(&self, tenant: TenantKey, contents: impl Into<String>) {
        self.overlays.write().insert(tenant, contents.into());
    }

    /// Remove a tenant's overlay; returns whether one existed.
    pub fn remove(&self, tenant: &TenantKey) -> bool {
        self.overlays.write().remove(tenant).is_some()
    }
}

impl OverlaySource for MemoryOverlaySource {
    fn fetch(&self, tenant: &TenantKey) -> io::Result<Option<OverlayDocument>> {
        Ok(self
            .overlays
            .read()
            .get(tenant)
            .map(|contents| OverlayDocument {
                origin: self.describe(tenant),
                contents: contents.clone(),
            }))
    }

    fn describe(&self, tenant: &TenantKey) -> String {
        format!("{}.{}", self.base_name, tenant)
    }
}
