use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::clients::AccessPolicy;
use crate::models::SyncError;

/// Memoized `(user, project)` authorization decisions.
///
/// Entries live at most `ttl` after insertion and the least recently used
/// entry makes room once `capacity` is reached. Denials are cached like
/// grants; collaborator failures are never cached.
pub struct AccessCache {
    cache: Cache<String, bool>,
    policy: Arc<dyn AccessPolicy>,
}

impl AccessCache {
    pub fn new(policy: Arc<dyn AccessPolicy>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        info!("Access cache initialized (capacity {}, ttl {:?})", capacity, ttl);
        Self { cache, policy }
    }

    pub async fn check_access(&self, user_id: &str, project_id: &str) -> Result<bool, SyncError> {
        let key = format!("{}:{}", user_id, project_id);

        if let Some(allowed) = self.cache.get(&key).await {
            debug!("Access cache hit for {}", key);
            return Ok(allowed);
        }

        // Concurrent misses for the same key share one collaborator call
        let policy = self.policy.clone();
        let (uid, pid) = (user_id.to_string(), project_id.to_string());
        self.cache
            .try_get_with(key, async move {
                info!("Access cache miss for user {} on project {}", uid, pid);
                policy.has_access(&uid, &pid).await
            })
            .await
            .map_err(|e: Arc<SyncError>| {
                error!("Access check failed for user {} on project {}: {}", user_id, project_id, e);
                (*e).clone()
            })
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}
