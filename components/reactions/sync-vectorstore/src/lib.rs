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

//! Drasi Sync Vector Store Reaction
//!
//! Keeps vector store collections in sync with Drasi continuous query
//! results. Each configured query is bootstrapped from its current result
//! set, after which change events are applied in order and gated by a
//! persisted per-query sync point, so redelivered events are never applied
//! twice.
//!
//! # Backends
//!
//! - **Stores**: in-memory, Qdrant, Azure AI Search
//! - **Embeddings**: mock (SHA-256), OpenAI, Azure OpenAI
//! - **Sync points**: metadata collection in the vector store, process
//!   memory, or a redb database file
//!
//! # Example
//!
//! ```rust,no_run
//! use drasi_reaction_sync_vectorstore::{SyncVectorStoreReaction, SyncVectorStoreReactionConfig};
//! use drasi_sync_vectorstore_core::QueryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncVectorStoreReactionConfig::new("product-sync")
//!     .with_query("products", QueryConfig::new("products", "id", "{{name}}: {{description}}"));
//!
//! let reaction = SyncVectorStoreReaction::builder("product-sync")
//!     .with_config(config)
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! reaction.start(&cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod azure_search;
pub mod clients;
pub mod config;
pub mod factory;
pub mod reaction;

pub use azure_search::AzureAiSearchVectorStoreAdapter;
pub use clients::{HttpManagementClient, HttpResultViewClient};
pub use config::{
    AzureAiSearchStoreConfig, EmbeddingConfig, QdrantStoreConfig, StoreConfig, SyncPointBackend,
    SyncVectorStoreReactionConfig,
};
pub use reaction::{ReactionStatus, SyncVectorStoreReaction, SyncVectorStoreReactionBuilder};
