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

//! In-process vector store backend.

use super::{VectorCollection, VectorStoreAdapter};
use crate::config::VectorStoreSettings;
use crate::document::VectorDocument;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Collection stored in process memory.
pub struct InMemoryCollection {
    name: String,
    dimensions: usize,
    documents: RwLock<HashMap<String, VectorDocument>>,
}

impl InMemoryCollection {
    fn new(name: &str, dimensions: usize) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
            documents: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.documents.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl VectorCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<VectorDocument>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()> {
        // Validate the whole batch before writing any of it.
        if let Some(bad) = documents.iter().find(|d| d.vector.len() != self.dimensions) {
            anyhow::bail!(
                "Vector for key '{}' has {} dimensions, collection '{}' expects {}",
                bad.key,
                bad.vector.len(),
                self.name,
                self.dimensions
            );
        }

        let mut stored = self.documents.write().await;
        for document in documents {
            stored.insert(document.key.clone(), document.clone());
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let mut stored = self.documents.write().await;
        for key in keys {
            stored.remove(key);
        }
        Ok(())
    }
}

/// Vector store that keeps every collection in memory.
#[derive(Default)]
pub struct InMemoryVectorStoreAdapter {
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
}

impl InMemoryVectorStoreAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed access to a collection, for inspection.
    pub async fn collection(&self, name: &str) -> Option<Arc<InMemoryCollection>> {
        self.collections.read().await.get(name).cloned()
    }
}

#[async_trait]
impl VectorStoreAdapter for InMemoryVectorStoreAdapter {
    fn store_type(&self) -> &str {
        "inmemory"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        settings: &VectorStoreSettings,
        create: bool,
    ) -> Result<Arc<dyn VectorCollection>> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            return Ok(existing.clone());
        }
        if !create {
            anyhow::bail!("Collection '{name}' does not exist and createCollection is disabled");
        }

        debug!(
            "Creating in-memory collection '{name}' with {} dimensions",
            settings.embedding_dimensions
        );
        let collection = Arc::new(InMemoryCollection::new(
            name,
            settings.embedding_dimensions,
        ));
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(key: &str, dims: usize) -> VectorDocument {
        VectorDocument::new(key, format!("content {key}"), vec![0.1; dims])
    }

    #[tokio::test]
    async fn test_create_and_reuse_collection() {
        let adapter = InMemoryVectorStoreAdapter::new();
        let settings = VectorStoreSettings::with_dimensions(3);

        assert!(!adapter.collection_exists("c").await.unwrap());
        let first = adapter
            .get_or_create_collection("c", &settings, true)
            .await
            .unwrap();
        first.upsert(&[doc("a", 3)]).await.unwrap();

        let second = adapter
            .get_or_create_collection("c", &settings, false)
            .await
            .unwrap();
        assert!(second.get("a").await.unwrap().is_some());
        assert!(adapter.collection_exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_collection_without_create_fails() {
        let adapter = InMemoryVectorStoreAdapter::new();
        let result = adapter
            .get_or_create_collection("missing", &VectorStoreSettings::default(), false)
            .await;
        assert!(result.is_err());
        assert!(!adapter.collection_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_ignores_missing() {
        let adapter = InMemoryVectorStoreAdapter::new();
        let collection = adapter
            .get_or_create_collection("c", &VectorStoreSettings::with_dimensions(2), true)
            .await
            .unwrap();

        collection.upsert(&[doc("a", 2), doc("b", 2)]).await.unwrap();
        let mut replacement = doc("a", 2);
        replacement.content = "updated".to_string();
        collection.upsert(&[replacement]).await.unwrap();

        let stored = collection.get("a").await.unwrap().unwrap();
        assert_eq!(stored.content, "updated");

        collection
            .delete(&["b".to_string(), "nope".to_string()])
            .await
            .unwrap();
        let typed = adapter.collection("c").await.unwrap();
        assert_eq!(typed.keys().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejects_whole_batch() {
        let adapter = InMemoryVectorStoreAdapter::new();
        let collection = adapter
            .get_or_create_collection("c", &VectorStoreSettings::with_dimensions(2), true)
            .await
            .unwrap();

        let result = collection.upsert(&[doc("ok", 2), doc("bad", 5)]).await;
        assert!(result.is_err());
        assert!(adapter.collection("c").await.unwrap().is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let adapter = InMemoryVectorStoreAdapter::new();
        adapter
            .get_or_create_collection("c", &VectorStoreSettings::default(), true)
            .await
            .unwrap();
        adapter.delete_collection("c").await.unwrap();
        assert!(!adapter.collection_exists("c").await.unwrap());
        adapter.delete_collection("c").await.unwrap();
    }
}
