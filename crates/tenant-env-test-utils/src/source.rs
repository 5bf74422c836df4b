use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tenant_env_config::{OverlayDocument, OverlaySource, TenantKey};

/// In-memory source that records every tenant it was asked for.
#[derive(Clone, Default)]
pub struct RecordingSource {
    overlays: Arc<Mutex<HashMap<String, String>>>,
    fetches: Arc<Mutex<Vec<String>>>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlay(self, tenant: &str, contents: &str) -> Self {
        self.set_overlay(tenant, contents);
        self
    }

    pub fn set_overlay(&self, tenant: &str, contents: &str) {
        self.overlays
            .lock()
            .insert(tenant.to_string(), contents.to_string());
    }

    /// Tenant keys fetched so far, in call order.
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }
}

impl OverlaySource for RecordingSource {
    fn fetch(&self, tenant: &TenantKey) -> io::Result<Option<OverlayDocument>> {
        self.fetches.lock().push(tenant.to_string());
        Ok(self
            .overlays
            .lock()
            .get(tenant.as_str())
            .map(|contents| OverlayDocument {
                origin: self.describe(tenant),
                contents: contents.clone(),
            }))
    }

    fn describe(&self, tenant: &TenantKey) -> String {
        format!("recording.{tenant}")
    }
}

/// Source whose every read fails with the given I/O error kind.
#[derive(Debug, Clone)]
pub struct FailingSource {
    kind: io::ErrorKind,
}

impl FailingSource {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind }
    }
}

impl OverlaySource for FailingSource {
    fn fetch(&self, _tenant: &TenantKey) -> io::Result<Option<OverlayDocument>> {
        Err(io::Error::new(self.kind, "scripted failure"))
    }

    fn describe(&self, tenant: &TenantKey) -> String {
        format!("failing.{tenant}")
    }
}
