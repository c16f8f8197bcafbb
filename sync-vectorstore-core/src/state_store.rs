// Copyright 2026 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Partitioned key-value persistence for sync points.
//!
//! A [`StateStoreProvider`] stores opaque byte values under a `(store_id, key)`
//! pair. Besides plain reads and writes it exposes
//! [`compare_and_swap`](StateStoreProvider::compare_and_swap), the conditional
//! write that sync point commits are built on.
//!
//! [`MemoryStateStoreProvider`] is the default. Durable providers live in
//! `components/state_stores/`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur when interacting with a state store
#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to read or write to the underlying storage
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("State store error: {0}")]
    Other(String),
}

pub type StateStoreResult<T> = Result<T, StateStoreError>;

/// Interface for state store providers.
///
/// Implementations must be safe for concurrent use. Every write must be
/// persisted before the returned future completes.
#[async_trait]
pub trait StateStoreProvider: Send + Sync {
    /// Returns `Ok(None)` when the key does not exist.
    async fn get(&self, store_id: &str, key: &str) -> StateStoreResult<Option<Vec<u8>>>;

    async fn set(&self, store_id: &str, key: &str, value: Vec<u8>) -> StateStoreResult<()>;

    /// Returns `Ok(true)` if the key existed and was deleted.
    async fn delete(&self, store_id: &str, key: &str) -> StateStoreResult<bool>;

    /// Atomically replace the value of `key` with `new_value` if and only if
    /// the current value equals `expected`. `expected = None` means the key
    /// must not exist yet.
    ///
    /// # Returns
    /// * `Ok(true)` - The swap happened
    /// * `Ok(false)` - The current value did not match `expected`; nothing was written
    /// * `Err(e)` - The store could not be read or written
    async fn compare_and_swap(
        &self,
        store_id: &str,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StateStoreResult<bool>;

    /// List all keys in a store partition.
    async fn list_keys(&self, store_id: &str) -> StateStoreResult<Vec<String>>;

    /// Force pending writes to persistent storage. A no-op for in-memory stores.
    async fn sync(&self) -> StateStoreResult<()> {
        Ok(())
    }
}

/// In-memory implementation of StateStoreProvider.
///
/// Data does not survive a restart.
pub struct MemoryStateStoreProvider {
    /// store_id -> (key -> value)
    stores: Arc<RwLock<HashMap<String, HashMap<String, Vec<u8>>>>>,
}

impl Default for MemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStoreProvider {
    pub fn new() -> Self {
        Self {
            stores: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl StateStoreProvider for MemoryStateStoreProvider {
    async fn get(&self, store_id: &str, key: &str) -> StateStoreResult<Option<Vec<u8>>> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(store_id)
            .and_then(|store| store.get(key).cloned()))
    }

    async fn set(&self, store_id: &str, key: &str, value: Vec<u8>) -> StateStoreResult<()> {
        let mut stores = self.stores.write().await;
        stores
            .entry(store_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, store_id: &str, key: &str) -> StateStoreResult<bool> {
        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get_mut(store_id) {
            let existed = store.remove(key).is_some();
            if store.is_empty() {
                stores.remove(store_id);
            }
            Ok(existed)
        } else {
            Ok(false)
        }
    }

    async fn compare_and_swap(
        &self,
        store_id: &str,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StateStoreResult<bool> {
        // The write lock spans the read and the write.
        let mut stores = self.stores.write().await;
        let store = stores.entry(store_id.to_string()).or_default();
        if store.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        store.insert(key.to_string(), new_value);
        Ok(true)
    }

    async fn list_keys(&self, store_id: &str) -> StateStoreResult<Vec<String>> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(store_id)
            .map(|store| store.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_delete() {
        let provider = MemoryStateStoreProvider::new();

        assert!(provider.get("store", "k").await.unwrap().is_none());
        provider.set("store", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(provider.get("store", "k").await.unwrap(), Some(b"v".to_vec()));

        assert!(provider.delete("store", "k").await.unwrap());
        assert!(!provider.delete("store", "k").await.unwrap());
        assert!(provider.get("store", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let provider = MemoryStateStoreProvider::new();
        provider.set("a", "k", b"1".to_vec()).await.unwrap();
        provider.set("b", "k", b"2".to_vec()).await.unwrap();

        assert_eq!(provider.get("a", "k").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(provider.get("b", "k").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(provider.list_keys("a").await.unwrap(), vec!["k".to_string()]);
        assert!(provider.list_keys("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compare_and_swap_insert_only_when_absent() {
        let provider = MemoryStateStoreProvider::new();

        assert!(provider
            .compare_and_swap("s", "k", None, b"1".to_vec())
            .await
            .unwrap());
        assert!(!provider
            .compare_and_swap("s", "k", None, b"2".to_vec())
            .await
            .unwrap());
        assert_eq!(provider.get("s", "k").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_swap_detects_stale_expectation() {
        let provider = MemoryStateStoreProvider::new();
        provider.set("s", "k", b"1".to_vec()).await.unwrap();

        assert!(provider
            .compare_and_swap("s", "k", Some(b"1"), b"2".to_vec())
            .await
            .unwrap());
        // A second writer still holding the old value loses.
        assert!(!provider
            .compare_and_swap("s", "k", Some(b"1"), b"3".to_vec())
            .await
            .unwrap());
        assert_eq!(provider.get("s", "k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_concurrent_compare_and_swap_single_winner() {
        let provider = Arc::new(MemoryStateStoreProvider::new());
        provider.set("s", "k", b"0".to_vec()).await.unwrap();

        let mut handles = Vec::new();
        for i in 1..=8u8 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                provider
                    .compare_and_swap("s", "k", Some(b"0"), vec![i])
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
