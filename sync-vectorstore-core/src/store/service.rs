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

//! Collection handle cache and write pass-through.

use super::{VectorCollection, VectorStoreAdapter};
use crate::config::{QueryConfig, VectorStoreSettings};
use crate::document::VectorDocument;
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Owns one [`VectorStoreAdapter`] and memoizes the collection handles it
/// hands out.
///
/// Cache hits only take a read lock. Creation is serialized per collection
/// name, so concurrent callers asking for the same missing collection create
/// it once while lookups of other collections proceed.
pub struct VectorStoreService {
    adapter: Arc<dyn VectorStoreAdapter>,
    settings: VectorStoreSettings,
    collections: RwLock<HashMap<String, Arc<dyn VectorCollection>>>,
    creation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorStoreService {
    pub fn new(adapter: Arc<dyn VectorStoreAdapter>, settings: VectorStoreSettings) -> Self {
        Self {
            adapter,
            settings,
            collections: RwLock::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn VectorStoreAdapter> {
        &self.adapter
    }

    pub fn settings(&self) -> &VectorStoreSettings {
        &self.settings
    }

    async fn cached(&self, name: &str) -> Option<Arc<dyn VectorCollection>> {
        self.collections.read().await.get(name).cloned()
    }

    async fn creation_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().await;
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn get_or_create_collection(
        &self,
        config: &QueryConfig,
    ) -> Result<Arc<dyn VectorCollection>> {
        let name = &config.collection_name;
        if let Some(cached) = self.cached(name).await {
            return Ok(cached);
        }

        let lock = self.creation_lock(name).await;
        let _guard = lock.lock().await;
        if let Some(cached) = self.cached(name).await {
            return Ok(cached);
        }

        debug!(
            "Getting or creating collection '{name}' in {} store",
            self.adapter.store_type()
        );

        let collection = self
            .adapter
            .get_or_create_collection(name, &self.settings, config.create_collection)
            .await
            .with_context(|| format!("Failed to open collection '{name}'"))?;

        self.collections
            .write()
            .await
            .insert(name.clone(), collection.clone());
        Ok(collection)
    }

    /// Drop `config`'s collection with all its documents and create it again
    /// empty. The cached handle is replaced.
    ///
    /// Fails without touching the store when `createCollection` is disabled.
    pub async fn recreate_collection(
        &self,
        config: &QueryConfig,
    ) -> Result<Arc<dyn VectorCollection>> {
        let name = &config.collection_name;
        if !config.create_collection {
            anyhow::bail!(
                "Collection '{name}' cannot be recreated while createCollection is disabled"
            );
        }

        let lock = self.creation_lock(name).await;
        let _guard = lock.lock().await;

        info!(
            "Recreating collection '{name}' in {} store",
            self.adapter.store_type()
        );
        self.collections.write().await.remove(name);
        self.adapter
            .delete_collection(name)
            .await
            .with_context(|| format!("Failed to delete collection '{name}'"))?;
        let collection = self
            .adapter
            .get_or_create_collection(name, &self.settings, true)
            .await
            .with_context(|| format!("Failed to create collection '{name}'"))?;

        self.collections
            .write()
            .await
            .insert(name.clone(), collection.clone());
        Ok(collection)
    }

    pub async fn upsert(
        &self,
        collection: &dyn VectorCollection,
        documents: &[VectorDocument],
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        debug!(
            "Upserting {} documents to collection '{}'",
            documents.len(),
            collection.name()
        );

        collection.upsert(documents).await.map_err(|e| {
            error!(
                "Failed to upsert documents to collection '{}': {e:#}",
                collection.name()
            );
            e
        })
    }

    pub async fn delete(&self, collection: &dyn VectorCollection, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} documents from collection '{}'",
            keys.len(),
            collection.name()
        );

        collection.delete(keys).await.map_err(|e| {
            error!(
                "Failed to delete documents from collection '{}': {e:#}",
                collection.name()
            );
            e
        })
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.adapter.collection_exists(name).await
    }

    /// Number of cached collection handles.
    pub async fn cached_collections(&self) -> usize {
        self.collections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryVectorStoreAdapter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct CountingAdapter {
        inner: InMemoryVectorStoreAdapter,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl VectorStoreAdapter for CountingAdapter {
        fn store_type(&self) -> &str {
            "counting"
        }

        async fn get_or_create_collection(
            &self,
            name: &str,
            settings: &VectorStoreSettings,
            create: bool,
        ) -> Result<Arc<dyn VectorCollection>> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.get_or_create_collection(name, settings, create).await
        }

        async fn collection_exists(&self, name: &str) -> Result<bool> {
            self.inner.collection_exists(name).await
        }

        async fn delete_collection(&self, name: &str) -> Result<()> {
            self.inner.delete_collection(name).await
        }
    }

    /// Holds creation of the collection named `slow` until released.
    struct GatedAdapter {
        inner: InMemoryVectorStoreAdapter,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl VectorStoreAdapter for GatedAdapter {
        fn store_type(&self) -> &str {
            "gated"
        }

        async fn get_or_create_collection(
            &self,
            name: &str,
            settings: &VectorStoreSettings,
            create: bool,
        ) -> Result<Arc<dyn VectorCollection>> {
            if name == "slow" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.get_or_create_collection(name, settings, create).await
        }

        async fn collection_exists(&self, name: &str) -> Result<bool> {
            self.inner.collection_exists(name).await
        }

        async fn delete_collection(&self, name: &str) -> Result<()> {
            self.inner.delete_collection(name).await
        }
    }

    fn service() -> (Arc<CountingAdapter>, Arc<VectorStoreService>) {
        let adapter = Arc::new(CountingAdapter {
            inner: InMemoryVectorStoreAdapter::new(),
            creates: AtomicUsize::new(0),
        });
        let service = Arc::new(VectorStoreService::new(
            adapter.clone(),
            VectorStoreSettings::with_dimensions(2),
        ));
        (adapter, service)
    }

    #[tokio::test]
    async fn test_collection_handles_are_memoized() {
        let (adapter, service) = service();
        let config = QueryConfig::new("products", "id", "{{name}}");

        service.get_or_create_collection(&config).await.unwrap();
        service.get_or_create_collection(&config).await.unwrap();

        assert_eq!(adapter.creates.load(Ordering::SeqCst), 1);
        assert_eq!(service.cached_collections().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_lazy_creation_happens_once() {
        let (adapter, service) = service();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let config = QueryConfig::new("shared", "id", "{{name}}");
                service.get_or_create_collection(&config).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(adapter.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_creation_does_not_block_other_collections() {
        let adapter = Arc::new(GatedAdapter {
            inner: InMemoryVectorStoreAdapter::new(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let service = Arc::new(VectorStoreService::new(
            adapter.clone(),
            VectorStoreSettings::with_dimensions(2),
        ));
        service
            .get_or_create_collection(&QueryConfig::new("warm", "id", "{{name}}"))
            .await
            .unwrap();

        let slow = {
            let service = service.clone();
            tokio::spawn(async move {
                let config = QueryConfig::new("slow", "id", "{{name}}");
                service.get_or_create_collection(&config).await.map(|_| ())
            })
        };
        adapter.entered.notified().await;

        let warm = QueryConfig::new("warm", "id", "{{name}}");
        let cold = QueryConfig::new("cold", "id", "{{name}}");
        tokio::time::timeout(Duration::from_secs(1), async {
            service.get_or_create_collection(&warm).await.unwrap();
            service.get_or_create_collection(&cold).await.unwrap();
        })
        .await
        .expect("lookups waited on an unrelated collection");
        assert!(!slow.is_finished());

        adapter.release.notify_one();
        slow.await.unwrap().unwrap();
        assert_eq!(service.cached_collections().await, 3);
    }

    #[tokio::test]
    async fn test_recreate_collection_drops_documents() {
        let (adapter, service) = service();
        let config = QueryConfig::new("products", "id", "{{name}}");
        let before = service.get_or_create_collection(&config).await.unwrap();
        service
            .upsert(
                before.as_ref(),
                &[VectorDocument::new("stale", "x", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let after = service.recreate_collection(&config).await.unwrap();
        assert!(after.get("stale").await.unwrap().is_none());

        let cached = service.get_or_create_collection(&config).await.unwrap();
        assert!(Arc::ptr_eq(&cached, &after));
        assert_eq!(adapter.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recreate_requires_create_collection() {
        let (adapter, service) = service();
        let mut config = QueryConfig::new("products", "id", "{{name}}");
        let existing = service.get_or_create_collection(&config).await.unwrap();
        service
            .upsert(
                existing.as_ref(),
                &[VectorDocument::new("kept", "x", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        config.create_collection = false;
        let err = service.recreate_collection(&config).await.err().expect("expected error");
        assert!(err.to_string().contains("createCollection"));
        assert!(adapter.collection_exists("products").await.unwrap());
        assert!(existing.get("kept").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_creation_is_not_cached() {
        let (adapter, service) = service();
        let mut config = QueryConfig::new("absent", "id", "{{name}}");
        config.create_collection = false;

        assert!(service.get_or_create_collection(&config).await.is_err());
        assert_eq!(service.cached_collections().await, 0);

        config.create_collection = true;
        service.get_or_create_collection(&config).await.unwrap();
        assert_eq!(adapter.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_writes_short_circuit() {
        let (_, service) = service();
        let config = QueryConfig::new("c", "id", "{{name}}");
        let collection = service.get_or_create_collection(&config).await.unwrap();

        service.upsert(collection.as_ref(), &[]).await.unwrap();
        service.delete(collection.as_ref(), &[]).await.unwrap();

        let doc = VectorDocument::new("a", "x", vec![0.0, 1.0]);
        service.upsert(collection.as_ref(), &[doc]).await.unwrap();
        assert!(collection.get("a").await.unwrap().is_some());
        service
            .delete(collection.as_ref(), &["a".to_string()])
            .await
            .unwrap();
        assert!(collection.get("a").await.unwrap().is_none());
    }
}
