use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tenant_env_config::{BaseConfig, ConfigOverlayResolver, FileOverlaySource};

/// Temporary directory holding a base env file and its tenant overlays.
pub struct EnvFixture {
    dir: TempDir,
    base_name: String,
}

impl EnvFixture {
    /// Create a fixture whose base file is `.env` with the given contents.
    pub fn new(base_contents: &str) -> Self {
        Self::with_base_name(".env", base_contents)
    }

    pub fn with_base_name(base_name: &str, base_contents: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let fixture = Self {
            dir,
            base_name: base_name.to_string(),
        };
        fixture.write(base_name, base_contents);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn base_path(&self) -> PathBuf {
        self.dir.path().join(&self.base_name)
    }

    /// Write (or replace) the overlay file for a tenant key.
    pub fn write_overlay(&self, tenant: &str, contents: &str) -> PathBuf {
        self.write(&format!("{}.{tenant}", self.base_name), contents)
    }

    pub fn remove_overlay(&self, tenant: &str) {
        fs::remove_file(self.dir.path().join(format!("{}.{tenant}", self.base_name)))
            .expect("remove overlay");
    }

    /// Write a file relative to the fixture root.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("dir");
        }
        fs::write(&path, contents).expect("write");
        path
    }

    /// Uncached resolver over the fixture's files.
    pub fn resolver(&self) -> ConfigOverlayResolver {
        let base = BaseConfig::load_from_path(self.base_path()).expect("base config");
        let source = FileOverlaySource::beside(self.base_path()).expect("overlay source");
        ConfigOverlayResolver::new(base, source)
    }

    pub fn cached_resolver(&self) -> ConfigOverlayResolver {
        self.resolver().with_cache()
    }
}
