//! Tenant registry
//!
//! Keeps per-tenant index managers cached in memory behind `Arc<RwLock<..>>`
//! handles. Entries are loaded from disk on first access, evicted after a
//! TTL of inactivity or when the cache outgrows its capacity (least recently
//! used first), and persisted before eviction so no writes are lost.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{MmIndexError, Result};
use crate::index::{
    clear_tenant_dir, load_manager, save_manager, tenant_exists, IndexSettings,
    MultimodalIndexManager,
};

struct CachedTenant {
    manager: Arc<RwLock<MultimodalIndexManager>>,
    last_accessed: DateTime<Utc>,
}

/// Registry cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub cached_tenants: usize,
    pub capacity: usize,
    pub ttl_minutes: i64,
}

/// Cache of live tenant index managers
pub struct TenantRegistry {
    clients_dir: PathBuf,
    default_settings: IndexSettings,
    capacity: usize,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedTenant>>,
}

impl TenantRegistry {
    pub fn new(
        clients_dir: PathBuf,
        default_settings: IndexSettings,
        capacity: usize,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            clients_dir,
            default_settings,
            capacity,
            ttl: Duration::minutes(ttl_minutes),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Get the manager for a tenant, loading it from disk or creating a
    /// fresh one. Updates the tenant's last-accessed time.
    pub fn get_or_create(&self, client_id: &str) -> Result<Arc<RwLock<MultimodalIndexManager>>> {
        let mut cache = self.lock_cache();

        if let Some(entry) = cache.get_mut(client_id) {
            entry.last_accessed = Utc::now();
            return Ok(Arc::clone(&entry.manager));
        }

        let manager = match load_manager(&self.clients_dir, client_id)? {
            Some(loaded) => {
                debug!(client_id, "Loaded tenant from disk");
                loaded
            }
            None => {
                info!(client_id, "Creating new tenant index");
                MultimodalIndexManager::new(client_id, self.default_settings.clone())
            }
        };

        let handle = Arc::new(RwLock::new(manager));
        cache.insert(
            client_id.to_string(),
            CachedTenant {
                manager: Arc::clone(&handle),
                last_accessed: Utc::now(),
            },
        );

        self.evict_over_capacity(&mut cache)?;
        Ok(handle)
    }

    /// Persist a cached tenant to disk. No-op for tenants not in the cache.
    pub fn save(&self, client_id: &str) -> Result<()> {
        let handle = {
            let cache = self.lock_cache();
            cache.get(client_id).map(|entry| Arc::clone(&entry.manager))
        };
        if let Some(handle) = handle {
            let manager = handle
                .read()
                .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;
            save_manager(&self.clients_dir, &manager)?;
        }
        Ok(())
    }

    /// Persist every cached tenant
    pub fn save_all(&self) -> Result<()> {
        let handles: Vec<Arc<RwLock<MultimodalIndexManager>>> = {
            let cache = self.lock_cache();
            cache
                .values()
                .map(|entry| Arc::clone(&entry.manager))
                .collect()
        };
        for handle in handles {
            let manager = handle
                .read()
                .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;
            save_manager(&self.clients_dir, &manager)?;
        }
        Ok(())
    }

    /// Evict every entry idle longer than the TTL, persisting each first
    pub fn evict_expired(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.ttl;
        let mut cache = self.lock_cache();

        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.last_accessed < cutoff)
            .map(|(client_id, _)| client_id.clone())
            .collect();

        for client_id in &expired {
            self.evict_entry(&mut cache, client_id)?;
        }

        if !expired.is_empty() {
            info!(evicted = expired.len(), "Evicted idle tenants");
        }
        Ok(expired.len())
    }

    /// Delete a tenant entirely: drop it from the cache and remove its
    /// persisted directory
    pub fn remove_tenant(&self, client_id: &str) -> Result<()> {
        {
            let mut cache = self.lock_cache();
            cache.remove(client_id);
        }
        clear_tenant_dir(&self.clients_dir, client_id)
    }

    /// Whether a tenant exists in the cache or on disk
    pub fn tenant_known(&self, client_id: &str) -> bool {
        {
            let cache = self.lock_cache();
            if cache.contains_key(client_id) {
                return true;
            }
        }
        tenant_exists(&self.clients_dir, client_id)
    }

    pub fn stats(&self) -> RegistryStats {
        let cache = self.lock_cache();
        RegistryStats {
            cached_tenants: cache.len(),
            capacity: self.capacity,
            ttl_minutes: self.ttl.num_minutes(),
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedTenant>> {
        // A poisoned registry lock means a panic mid-bookkeeping; the map
        // itself is still structurally sound, so keep serving.
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn evict_over_capacity(
        &self,
        cache: &mut HashMap<String, CachedTenant>,
    ) -> Result<()> {
        while cache.len() > self.capacity {
            let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(client_id, _)| client_id.clone())
            else {
                break;
            };
            debug!(client_id = %oldest, "Evicting least recently used tenant");
            self.evict_entry(cache, &oldest)?;
        }
        Ok(())
    }

    fn evict_entry(
        &self,
        cache: &mut HashMap<String, CachedTenant>,
        client_id: &str,
    ) -> Result<()> {
        // Save while the entry is still cached; a failed save must not drop
        // the only copy of the manager state
        if let Some(entry) = cache.get(client_id) {
            let manager = entry
                .manager
                .read()
                .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;
            save_manager(&self.clients_dir, &manager)?;
        }
        cache.remove(client_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::TextChunk;
    use crate::index::{HnswParams, IndexKind};
    use tempfile::TempDir;

    fn settings() -> IndexSettings {
        IndexSettings {
            model_name: "stub".to_string(),
            kind: IndexKind::Flat,
            enable_visual_search: false,
            text_dimension: 4,
            visual_dimension: 4,
            hnsw_params: HnswParams::default(),
        }
    }

    fn registry(dir: &TempDir, capacity: usize, ttl_minutes: i64) -> TenantRegistry {
        TenantRegistry::new(dir.path().to_path_buf(), settings(), capacity, ttl_minutes)
    }

    fn chunk(id: &str) -> TextChunk {
        TextChunk {
            chunk_id: id.to_string(),
            text: "text".to_string(),
            source_file: "doc.pdf".to_string(),
            chunk_index: 0,
            metadata: HashMap::new(),
            start_char: 0,
            end_char: 4,
        }
    }

    #[test]
    fn test_same_tenant_shares_manager() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, 10, 60);

        let a = registry.get_or_create("acme").unwrap();
        let b = registry.get_or_create("acme").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.stats().cached_tenants, 1);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, 10, 60);

        let acme = registry.get_or_create("acme").unwrap();
        acme.write()
            .unwrap()
            .add_text_chunk(&chunk("a"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();

        let other = registry.get_or_create("other").unwrap();
        assert_eq!(other.read().unwrap().text_total(), 0);
        assert_eq!(acme.read().unwrap().text_total(), 1);
    }

    #[test]
    fn test_lru_eviction_persists_state() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, 1, 60);

        let first = registry.get_or_create("first").unwrap();
        first
            .write()
            .unwrap()
            .add_text_chunk(&chunk("a"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();

        // Capacity 1: loading a second tenant evicts the first, saving it
        registry.get_or_create("second").unwrap();
        assert_eq!(registry.stats().cached_tenants, 1);
        assert!(tenant_exists(dir.path(), "first"));

        // Reloading the evicted tenant restores its data from disk
        let reloaded = registry.get_or_create("first").unwrap();
        assert_eq!(reloaded.read().unwrap().text_total(), 1);
    }

    #[test]
    fn test_failed_eviction_save_keeps_tenant_cached() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, 1, 60);

        // A plain file where the tenant directory should go makes the save
        // fail
        std::fs::write(dir.path().join("blocked"), b"").unwrap();

        let blocked = registry.get_or_create("blocked").unwrap();
        blocked
            .write()
            .unwrap()
            .add_text_chunk(&chunk("a"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();

        // Capacity eviction targets "blocked"; its save fails, so the entry
        // must stay cached instead of losing the unsaved state
        assert!(registry.get_or_create("other").is_err());
        let again = registry.get_or_create("blocked").unwrap();
        assert_eq!(again.read().unwrap().text_total(), 1);
    }

    #[test]
    fn test_ttl_eviction() {
        let dir = TempDir::new().unwrap();
        // Zero TTL: everything is expired immediately
        let registry = registry(&dir, 10, 0);

        registry.get_or_create("acme").unwrap();
        let evicted = registry.evict_expired().unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(registry.stats().cached_tenants, 0);
    }

    #[test]
    fn test_remove_tenant_deletes_disk_state() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir, 10, 60);

        let acme = registry.get_or_create("acme").unwrap();
        acme.write()
            .unwrap()
            .add_text_chunk(&chunk("a"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        registry.save("acme").unwrap();
        assert!(registry.tenant_known("acme"));

        registry.remove_tenant("acme").unwrap();
        assert!(!registry.tenant_known("acme"));
        assert!(!tenant_exists(dir.path(), "acme"));
    }

    #[test]
    fn test_save_all_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let registry = registry(&dir, 10, 60);
            let acme = registry.get_or_create("acme").unwrap();
            acme.write()
                .unwrap()
                .add_text_chunk(&chunk("a"), vec![0.0, 1.0, 0.0, 0.0])
                .unwrap();
            registry.save_all().unwrap();
        }

        let fresh = registry(&dir, 10, 60);
        let acme = fresh.get_or_create("acme").unwrap();
        assert_eq!(acme.read().unwrap().text_total(), 1);
    }
}
