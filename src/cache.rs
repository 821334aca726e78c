//! In-memory caching using moka
//!
//! Resource definitions are read on every availability check and booking, but
//! change rarely, so lookups go through a short-TTL cache. Bookings are never
//! cached: capacity decisions always read the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::booking::models::Resource;
use crate::booking::store::{ResourceStore, StoreError};

/// Application cache holding resource definitions
#[derive(Clone)]
pub struct AppCache {
    /// Resources (id -> Resource)
    pub resources: Cache<Uuid, Arc<Resource>>,
}

impl AppCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            resources: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resources_size: self.resources.entry_count(),
        }
    }

    /// Drop a resource so the next lookup reads the store
    pub async fn invalidate_resource(&self, id: Uuid) {
        self.resources.invalidate(&id).await;
        info!("Cache invalidated for resource: {}", id);
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Cache statistics for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub resources_size: u64,
}

/// [`ResourceStore`] decorator that serves lookups from [`AppCache`]
pub struct CachedResourceStore {
    inner: Arc<dyn ResourceStore>,
    cache: AppCache,
}

impl CachedResourceStore {
    pub fn new(inner: Arc<dyn ResourceStore>, cache: AppCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl ResourceStore for CachedResourceStore {
    async fn find_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        if let Some(cached) = self.cache.resources.get(&id).await {
            debug!("Cache HIT for resource: {}", id);
            return Ok(Some((*cached).clone()));
        }

        debug!("Cache MISS for resource: {}", id);
        let resource = self.inner.find_resource(id).await?;
        // Misses are not cached so new resources show up immediately
        if let Some(resource) = &resource {
            self.cache
                .resources
                .insert(id, Arc::new(resource.clone()))
                .await;
        }
        Ok(resource)
    }
}
