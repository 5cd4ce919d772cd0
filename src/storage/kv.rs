//! Key-value persistence collaborator

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::error::EngineResult;

/// Host-provided persistence surface
///
/// The engine stores its whole state as one JSON blob under a single key;
/// any store that can hold JSON values satisfies it.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored at `key`, if any
    async fn get(&self, key: &str) -> EngineResult<Option<Value>>;

    /// Store `value` at `key`, replacing any previous value
    async fn update(&self, key: &str, value: Value) -> EngineResult<()>;
}

/// In-memory store; the default when hosts do not inject persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys (handy in tests)
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Value) -> EngineResult<()> {
        self.map.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("missing").await.unwrap().is_none());

        store.update("key", json!({"a": 1})).await.unwrap();
        let value = store.get("key").await.unwrap().unwrap();
        assert_eq!(value["a"], 1);

        store.update("key", json!({"a": 2})).await.unwrap();
        let value = store.get("key").await.unwrap().unwrap();
        assert_eq!(value["a"], 2);
        assert_eq!(store.len().await, 1);
    }
}
