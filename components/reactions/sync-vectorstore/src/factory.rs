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

//! Builds backends from reaction configuration.

use crate::azure_search::AzureAiSearchVectorStoreAdapter;
use crate::config::{EmbeddingConfig, StoreConfig, SyncPointBackend};
use anyhow::{Context, Result};
use drasi_state_store_redb::RedbStateStoreProvider;
use drasi_sync_vectorstore_core::{
    CollectionSyncPointManager, Embedder, InMemoryVectorStoreAdapter, MemoryStateStoreProvider,
    MockEmbedder, OpenAiConfig, OpenAiEmbedder, StateStoreProvider, StateStoreSyncPointManager,
    SyncPointManager, VectorStoreAdapter, VectorStoreService,
};
use drasi_sync_vectorstore_qdrant::QdrantVectorStoreAdapter;
use log::info;
use std::sync::Arc;

pub fn create_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    match config {
        EmbeddingConfig::Mock { dimensions } => Arc::new(MockEmbedder::new(*dimensions)),
        EmbeddingConfig::OpenAi {
            api_key,
            model,
            dimensions,
        } => Arc::new(OpenAiEmbedder::new(
            OpenAiConfig::Standard {
                api_key: api_key.clone(),
                model: model.clone(),
            },
            *dimensions,
        )),
        EmbeddingConfig::AzureOpenAi {
            endpoint,
            api_key,
            model,
            dimensions,
            api_version,
        } => Arc::new(OpenAiEmbedder::new(
            OpenAiConfig::Azure {
                api_key: api_key.clone(),
                endpoint: endpoint.clone(),
                deployment: model.clone(),
                api_version: api_version.clone(),
            },
            *dimensions,
        )),
    }
}

pub fn create_store_adapter(config: &StoreConfig) -> Result<Arc<dyn VectorStoreAdapter>> {
    info!("Creating vector store adapter of type {}", config.store_type());

    let adapter: Arc<dyn VectorStoreAdapter> = match config {
        StoreConfig::InMemory => Arc::new(InMemoryVectorStoreAdapter::new()),
        StoreConfig::Qdrant(qdrant) => Arc::new(
            QdrantVectorStoreAdapter::connect(&qdrant.endpoint, qdrant.api_key.clone())
                .context("Failed to create Qdrant vector store adapter")?,
        ),
        StoreConfig::AzureAiSearch(azure) => Arc::new(
            AzureAiSearchVectorStoreAdapter::new(azure)
                .context("Failed to create Azure AI Search vector store adapter")?,
        ),
    };
    Ok(adapter)
}

/// State store behind a state-store-based sync point backend, or `None` for
/// the vector store backend.
pub fn create_state_store(
    backend: &SyncPointBackend,
) -> Result<Option<Arc<dyn StateStoreProvider>>> {
    match backend {
        SyncPointBackend::VectorStore => Ok(None),
        SyncPointBackend::Memory => Ok(Some(Arc::new(MemoryStateStoreProvider::new()))),
        SyncPointBackend::Redb { path } => {
            let provider = RedbStateStoreProvider::new(path)
                .with_context(|| format!("Failed to open sync point database {path:?}"))?;
            Ok(Some(Arc::new(provider)))
        }
    }
}

/// Sync points live in `state_store` when one is given, otherwise in the
/// reaction's metadata collection.
pub fn create_sync_point_manager(
    reaction_name: &str,
    store: Arc<VectorStoreService>,
    state_store: Option<Arc<dyn StateStoreProvider>>,
) -> Arc<dyn SyncPointManager> {
    match state_store {
        Some(state_store) => Arc::new(StateStoreSyncPointManager::new(state_store)),
        None => Arc::new(CollectionSyncPointManager::new(store, reaction_name)),
    }
}
