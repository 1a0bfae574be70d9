//! In-memory segment provider with the same semantics as the durable
//! backend. Used by tests; not suitable for production since nothing
//! survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SegmentError, SegmentResult, SegmentStore, VersionedValue};

#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    entries: RwLock<HashMap<String, VersionedValue>>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents; test helper.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SegmentStore for MemorySegmentStore {
    async fn get(&self, key: &str) -> SegmentResult<Option<VersionedValue>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &serde_json::Value) -> SegmentResult<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Err(SegmentError::DuplicateKey(key.to_string()));
        }
        entries.insert(
            key.to_string(),
            VersionedValue {
                value: value.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    async fn update(
        &self,
        key: &str,
        value: &serde_json::Value,
        expected_version: i64,
    ) -> SegmentResult<i64> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| SegmentError::Missing(key.to_string()))?;
        if entry.version != expected_version {
            return Err(SegmentError::VersionMismatch(key.to_string()));
        }
        entry.value = value.clone();
        entry.version += 1;
        Ok(entry.version)
    }

    async fn delete(&self, key: &str) -> SegmentResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemorySegmentStore::new();
        store.put("Analytics_Orders", &json!({"a": 1})).await.unwrap();
        let read = store.get("Analytics_Orders").await.unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.value["a"], 1);
    }

    #[tokio::test]
    async fn test_put_duplicate_fails() {
        let store = MemorySegmentStore::new();
        store.put("k", &json!({})).await.unwrap();
        let err = store.put("k", &json!({})).await.unwrap_err();
        assert!(matches!(err, SegmentError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_is_compare_and_swap() {
        let store = MemorySegmentStore::new();
        store.put("k", &json!({"n": 0})).await.unwrap();

        let v2 = store.update("k", &json!({"n": 1}), 1).await.unwrap();
        assert_eq!(v2, 2);

        // Stale version loses.
        let err = store.update("k", &json!({"n": 99}), 1).await.unwrap_err();
        assert!(matches!(err, SegmentError::VersionMismatch(_)));
        assert_eq!(store.get("k").await.unwrap().unwrap().value["n"], 1);
    }

    #[tokio::test]
    async fn test_update_missing_key() {
        let store = MemorySegmentStore::new();
        let err = store.update("nope", &json!({}), 1).await.unwrap_err();
        assert!(matches!(err, SegmentError::Missing(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemorySegmentStore::new();
        store.put("k", &json!({})).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }
}
