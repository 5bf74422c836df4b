//! Per-tenant cache of effective configurations.
//!
//! Loads for one tenant are serialized through a per-key slot so concurrent
//! cold requests read the source once. A generation counter, bumped on every
//! invalidation, keeps a load that raced an invalidation from publishing its
//! result afterwards.
//!
//! Tenants with an overlay are bounded by the overlays that exist. Base-only
//! results are keyed by whatever label a client puts in its `Host` header, so
//! they are kept in a FIFO of at most `absent_capacity` tenants.

use crate::{EffectiveConfig, ResolveError, TenantKey};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default cap on cached tenants that have no overlay.
pub const DEFAULT_ABSENT_CAPACITY: usize = 1024;

/// Cached entries plus the invalidation generation they belong to.
#[derive(Debug, Default)]
struct Entries {
    map: HashMap<TenantKey, EffectiveConfig>,
    /// Base-only tenants in `map`, oldest first.
    absent: VecDeque<TenantKey>,
    generation: u64,
}

/// Concurrency-safe cache keyed by tenant.
#[derive(Debug)]
pub struct OverlayCache {
    entries: RwLock<Entries>,
    /// In-flight load slots, one per tenant currently loading.
    loading: Mutex<HashMap<TenantKey, Arc<Mutex<()>>>>,
    absent_capacity: usize,
}

impl Default for OverlayCache {
    fn default() -> Self {
        Self::with_absent_capacity(DEFAULT_ABSENT_CAPACITY)
    }
}

impl OverlayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache at most `capacity` base-only results; `0` disables caching them.
    pub fn with_absent_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::default(),
            loading: Mutex::default(),
            absent_capacity: capacity,
        }
    }

    pub fn absent_capacity(&self) -> usize {
        self.absent_capacity
    }

    /// Cached configuration for a tenant, if any.
    pub fn get(&self, tenant: &TenantKey) -> Option<EffectiveConfig> {
        self.entries.read().map.get(tenant).cloned()
    }

    pub fn contains(&self, tenant: &TenantKey) -> bool {
        self.entries.read().map.contains_key(tenant)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map.is_empty()
    }

    /// Drop a tenant's entry; returns whether one was cached.
    pub fn invalidate(&self, tenant: &TenantKey) -> bool {
        let mut entries = self.entries.write();
        entries.generation += 1;
        entries.absent.retain(|key| key != tenant);
        let removed = entries.map.remove(tenant).is_some();
        info!("invalidated tenant config (tenant={tenant}, cached={removed})");
        removed
    }

    /// Drop every entry; returns how many were cached.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.write();
        entries.generation += 1;
        let count = entries.map.len();
        entries.map.clear();
        entries.absent.clear();
        info!("invalidated all tenant configs (count={count})");
        count
    }

    /// Return the cached entry or run `load` and cache its result.
    pub(crate) fn get_or_load<F>(
        &self,
        tenant: &TenantKey,
        load: F,
    ) -> Result<EffectiveConfig, ResolveError>
    where
        F: FnOnce() -> Result<EffectiveConfig, ResolveError>,
    {
        if let Some(hit) = self.get(tenant) {
            return Ok(hit);
        }
        self.load_exclusive(tenant, false, load)
    }

    /// Run `load` and replace the cached entry only if it succeeds.
    pub(crate) fn reload<F>(&self, tenant: &TenantKey, load: F) -> Result<EffectiveConfig, ResolveError>
    where
        F: FnOnce() -> Result<EffectiveConfig, ResolveError>,
    {
        self.load_exclusive(tenant, true, load)
    }

    fn load_exclusive<F>(
        &self,
        tenant: &TenantKey,
        force: bool,
        load: F,
    ) -> Result<EffectiveConfig, ResolveError>
    where
        F: FnOnce() -> Result<EffectiveConfig, ResolveError>,
    {
        let slot = self.acquire_slot(tenant);
        let result = {
            let _guard = slot.lock();
            match self.get(tenant).filter(|_| !force) {
                Some(hit) => {
                    debug!("config loaded by concurrent request (tenant={tenant})");
                    Ok(hit)
                }
                None => {
                    let generation = self.entries.read().generation;
                    load().inspect(|config| self.publish(tenant, config, generation))
                }
            }
        };
        self.release_slot(tenant, slot);
        result
    }

    fn publish(&self, tenant: &TenantKey, config: &EffectiveConfig, generation: u64) {
        let mut guard = self.entries.write();
        if guard.generation != generation {
            debug!("discarding config loaded before invalidation (tenant={tenant})");
            return;
        }
        let entries = &mut *guard;
        entries.absent.retain(|key| key != tenant);
        if !config.overlay_applied() {
            if self.absent_capacity == 0 {
                entries.map.remove(tenant);
                return;
            }
            while entries.absent.len() >= self.absent_capacity {
                let Some(evicted) = entries.absent.pop_front() else {
                    break;
                };
                entries.map.remove(&evicted);
                debug!("evicted base-only tenant config (tenant={evicted})");
            }
            entries.absent.push_back(tenant.clone());
        }
        entries.map.insert(tenant.clone(), config.clone());
    }

    fn acquire_slot(&self, tenant: &TenantKey) -> Arc<Mutex<()>> {
        Arc::clone(self.loading.lock().entry(tenant.clone()).or_default())
    }

    /// Slots are cloned and dropped only under the `loading` lock, so the
    /// strong count is exact here: the map's reference plus ours.
    fn release_slot(&self, tenant: &TenantKey, slot: Arc<Mutex<()>>) {
        let mut loading = self.loading.lock();
        let shared = Arc::strong_count(&slot) > 2;
        drop(slot);
        if !shared {
            loading.remove(tenant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OverlayCache;
    use crate::{
        BaseConfig, ConfigLayer, ConfigLayerSource, EffectiveConfig, ResolveError, TenantKey,
    };
    use pretty_assertions::assert_eq;
    use std::io;

    fn tenant(key: &str) -> TenantKey {
        TenantKey::parse(key).expect("tenant")
    }

    fn config(value: &str, key: &TenantKey) -> EffectiveConfig {
        let base: BaseConfig = [("APP_NAME", value)].into_iter().collect();
        EffectiveConfig::from_base(&base, Some(key.clone()))
    }

    fn overlaid(value: &str, key: &TenantKey) -> EffectiveConfig {
        let base: BaseConfig = [("APP_NAME", "Main")].into_iter().collect();
        let layer = ConfigLayer {
            source: ConfigLayerSource::Overlay,
            origin: Some(format!(".env.{key}")),
            keys: 1,
        };
        let values = [("APP_NAME".to_string(), value.to_string())].into_iter().collect();
        EffectiveConfig::with_overlay(&base, key.clone(), values, layer)
    }

    fn unreadable(key: &TenantKey) -> ResolveError {
        ResolveError::OverlaySourceUnreadable {
            tenant: key.clone(),
            source: io::Error::other("boom"),
        }
    }

    #[test]
    fn caches_successful_loads() {
        let cache = OverlayCache::new();
        let alpha = tenant("alpha");
        let first = cache
            .get_or_load(&alpha, || Ok(config("one", &alpha)))
            .expect("load");
        let second = cache
            .get_or_load(&alpha, || Ok(config("two", &alpha)))
            .expect("hit");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert!(cache.loading.lock().is_empty());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = OverlayCache::new();
        let alpha = tenant("alpha");
        cache
            .get_or_load(&alpha, || Err(unreadable(&alpha)))
            .expect_err("error");
        assert!(!cache.contains(&alpha));
    }

    #[test]
    fn invalidate_drops_entries() {
        let cache = OverlayCache::new();
        let alpha = tenant("alpha");
        let beta = tenant("beta");
        cache.get_or_load(&alpha, || Ok(config("a", &alpha))).expect("alpha");
        cache.get_or_load(&beta, || Ok(config("b", &beta))).expect("beta");

        assert!(cache.invalidate(&alpha));
        assert!(!cache.invalidate(&alpha));
        assert!(cache.contains(&beta));
        assert_eq!(cache.invalidate_all(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_reload_keeps_previous_entry() {
        let cache = OverlayCache::new();
        let alpha = tenant("alpha");
        let original = cache
            .get_or_load(&alpha, || Ok(config("one", &alpha)))
            .expect("load");
        cache
            .reload(&alpha, || Err(unreadable(&alpha)))
            .expect_err("reload fails");
        assert_eq!(cache.get(&alpha), Some(original));

        let reloaded = cache
            .reload(&alpha, || Ok(config("two", &alpha)))
            .expect("reload");
        assert_eq!(cache.get(&alpha), Some(reloaded));
    }

    #[test]
    fn load_racing_an_invalidation_is_not_published() {
        let cache = OverlayCache::new();
        let alpha = tenant("alpha");
        let loaded = cache
            .get_or_load(&alpha, || {
                cache.invalidate_all();
                Ok(config("stale", &alpha))
            })
            .expect("load");
        assert_eq!(loaded.get("APP_NAME"), Some("stale"));
        assert!(!cache.contains(&alpha));
    }

    #[test]
    fn base_only_entries_are_bounded() {
        let cache = OverlayCache::with_absent_capacity(2);
        let alpha = tenant("alpha");
        cache
            .get_or_load(&alpha, || Ok(overlaid("Alpha", &alpha)))
            .expect("alpha");
        for label in ["junk1", "junk2", "junk3"] {
            let key = tenant(label);
            cache.get_or_load(&key, || Ok(config("Main", &key))).expect(label);
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&alpha));
        assert!(!cache.contains(&tenant("junk1")));
        assert!(cache.contains(&tenant("junk2")));
        assert!(cache.contains(&tenant("junk3")));
    }

    #[test]
    fn zero_absent_capacity_caches_only_overlays() {
        let cache = OverlayCache::with_absent_capacity(0);
        let alpha = tenant("alpha");
        let beta = tenant("beta");
        cache
            .get_or_load(&alpha, || Ok(overlaid("Alpha", &alpha)))
            .expect("alpha");
        cache.get_or_load(&beta, || Ok(config("Main", &beta))).expect("beta");
        assert!(cache.contains(&alpha));
        assert!(!cache.contains(&beta));

        cache.reload(&alpha, || Ok(config("Main", &alpha))).expect("reload");
        assert!(cache.is_empty());
    }

    #[test]
    fn reloading_into_an_overlay_frees_the_absent_slot() {
        let cache = OverlayCache::with_absent_capacity(1);
        let alpha = tenant("alpha");
        let beta = tenant("beta");
        cache.get_or_load(&alpha, || Ok(config("Main", &alpha))).expect("alpha");
        cache
            .reload(&alpha, || Ok(overlaid("Alpha", &alpha)))
            .expect("reload");
        cache.get_or_load(&beta, || Ok(config("Main", &beta))).expect("beta");

        assert!(cache.contains(&alpha));
        assert!(cache.contains(&beta));
        assert_eq!(cache.entries.read().absent.len(), 1);
    }
}
