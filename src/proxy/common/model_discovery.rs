// Model discovery cache for backends configured with model "auto".
//
// Successful lookups are cached per backend URL for a short TTL so every
// request does not hit /v1/models. Failures are never cached.

use std::time::{Duration, Instant};

use dashmap::DashMap;

const DISCOVERY_TTL: Duration = Duration::from_secs(60);

struct CachedModel {
    model: String,
    fetched_at: Instant,
}

impl CachedModel {
    fn new(model: String) -> Self {
        Self {
            model,
            fetched_at: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > DISCOVERY_TTL
    }
}

/// Keyed by backend URL so the default and vision backends cache
/// independently.
#[derive(Default)]
pub struct ModelDiscoveryCache {
    entries: DashMap<String, CachedModel>,
}

impl ModelDiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, backend_url: &str) -> Option<String> {
        let entry = self.entries.get(backend_url)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(backend_url);
            return None;
        }
        Some(entry.model.clone())
    }

    pub fn insert(&self, backend_url: &str, model: String) {
        tracing::debug!(
            "[ModelDiscovery] Caching model '{}' for {}",
            model,
            backend_url
        );
        self.entries
            .insert(backend_url.to_string(), CachedModel::new(model));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_on_empty_cache() {
        let cache = ModelDiscoveryCache::new();
        assert_eq!(cache.get("http://localhost:8000"), None);
    }

    #[test]
    fn test_hit_after_insert() {
        let cache = ModelDiscoveryCache::new();
        cache.insert("http://localhost:8000", "qwen2.5-72b".to_string());
        assert_eq!(
            cache.get("http://localhost:8000"),
            Some("qwen2.5-72b".to_string())
        );
    }

    #[test]
    fn test_backends_cache_independently() {
        let cache = ModelDiscoveryCache::new();
        cache.insert("http://a:8000", "model-a".to_string());
        cache.insert("http://b:8000", "model-b".to_string());
        assert_eq!(cache.get("http://a:8000"), Some("model-a".to_string()));
        assert_eq!(cache.get("http://b:8000"), Some("model-b".to_string()));
    }

    #[test]
    fn test_expired_entry_evicted() {
        let cache = ModelDiscoveryCache::new();
        cache.entries.insert(
            "http://a:8000".to_string(),
            CachedModel {
                model: "stale".to_string(),
                fetched_at: Instant::now() - DISCOVERY_TTL - Duration::from_secs(1),
            },
        );
        assert_eq!(cache.get("http://a:8000"), None);
        assert!(cache.entries.is_empty());
    }
}
