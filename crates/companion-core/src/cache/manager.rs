use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::store::KeyValueStore;

/// Typed JSON view over a `KeyValueStore`.
///
/// Every operation is best-effort: read failures and parse failures come
/// back as `None`, write failures as `false`, and all of them are logged.
/// Clone is cheap - the store is shared.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let contents = match self.store.get(key).await {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to load cache");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => {
                debug!(key = key, "Loaded cached data");
                Some(value)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Failed to parse cache");
                None
            }
        }
    }

    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> bool {
        let contents = match serde_json::to_string(data) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to serialize cache");
                return false;
            }
        };

        match self.store.set(key, &contents).await {
            Ok(()) => {
                debug!(key = key, "Cached data");
                true
            }
            Err(e) => {
                warn!(key = key, error = %e, "Failed to cache");
                false
            }
        }
    }

    pub async fn remove(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to remove cache entry");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::testing::BrokenStore;
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_save_then_load_returns_equal_value() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let data = json!({
            "locations": [{"latitude": 1.0, "longitude": 2.0}],
            "details": [{"id": 3, "title": "Library", "tags": ["quiet", null]}],
            "nested": {"flag": true, "n": -4.25}
        });
        assert!(cache.save("userLocationsCache", &data).await);
        let loaded: Option<serde_json::Value> = cache.load("userLocationsCache").await;
        assert_eq!(loaded, Some(data));

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![1u8, 2, 3]);
        assert!(cache.save("map", &map).await);
        assert_eq!(cache.load::<BTreeMap<String, Vec<u8>>>("map").await, Some(map));
    }

    #[tokio::test]
    async fn test_missing_key_loads_none() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        assert_eq!(cache.load::<serde_json::Value>("nothing").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_loads_none() {
        let store = Arc::new(MemoryStore::new());
        store.set("lastKnownLocation", "{not json").await.unwrap();
        let cache = CacheManager::new(store);
        assert_eq!(cache.load::<serde_json::Value>("lastKnownLocation").await, None);
    }

    #[tokio::test]
    async fn test_broken_store_is_a_miss() {
        let cache = CacheManager::new(Arc::new(BrokenStore));
        assert_eq!(cache.load::<serde_json::Value>("k").await, None);
        assert!(!cache.save("k", &1).await);
        assert!(!cache.remove("k").await);
    }
}
