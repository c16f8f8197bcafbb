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

//! Drasi Sync Vector Store Core
//!
//! Keeps vector store collections in sync with the result sets of Drasi
//! continuous queries. Change events are delivered at least once; the
//! pipeline turns them into exactly-once-equivalent effects by tracking a
//! per-query sync point that only advances after the store writes of an event
//! succeeded.
//!
//! # Components
//!
//! - [`ChangeEventHandler`]: the sequence gate applying one change event
//! - [`SyncPointManager`]: persistence of per-query sync points
//! - [`DocumentProcessor`]: result rows to [`VectorDocument`]s via Handlebars templates
//! - [`VectorStoreService`]: memoized collection handles over a [`VectorStoreAdapter`]
//! - [`QueryInitializationService`]: bootstrap that seeds collections and sync points
//!
//! # Example
//!
//! ```rust,no_run
//! use drasi_sync_vectorstore_core::{
//!     ChangeEvent, ChangeEventHandler, DocumentProcessor, InMemoryVectorStoreAdapter,
//!     MemoryStateStoreProvider, MockEmbedder, QueryConfig, StateStoreSyncPointManager,
//!     SyncPointManager, VectorStoreService, VectorStoreSettings,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(VectorStoreService::new(
//!         Arc::new(InMemoryVectorStoreAdapter::new()),
//!         VectorStoreSettings::with_dimensions(384),
//!     ));
//!     let processor = Arc::new(DocumentProcessor::new(Arc::new(MockEmbedder::new(384))));
//!     let sync_points = Arc::new(StateStoreSyncPointManager::new(Arc::new(
//!         MemoryStateStoreProvider::new(),
//!     )));
//!     sync_points.initialize_sync_point("my-reaction", "products", 0).await?;
//!
//!     let handler = ChangeEventHandler::new("my-reaction", store, processor, sync_points);
//!     let config = QueryConfig::new("products", "id", "{{name}}");
//!     let event = ChangeEvent::new("products", 1)
//!         .with_added(serde_json::json!({"id": "p1", "name": "Widget"}));
//!
//!     handler
//!         .handle_change(&event, Some(&config), &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod embedder;
pub mod error;
pub mod event;
pub mod handler;
pub mod initialization;
pub mod state_store;
pub mod store;
pub mod sync_point;

pub use config::{DistanceFunction, IndexKind, QueryConfig, VectorStoreSettings};
pub use document::{extract_key, DocumentProcessor, VectorDocument};
pub use embedder::{Embedder, MockEmbedder, OpenAiConfig, OpenAiEmbedder};
pub use error::{DocumentError, SyncError};
pub use event::{ChangeEvent, UpdatedResult};
pub use handler::{gate, ChangeEventHandler, GateDecision, HandleOutcome, Phase};
pub use initialization::{
    BootstrapOutcome, ManagementClient, QueryInitializationService, ResultViewClient, ViewHeader,
    ViewItem,
};
pub use state_store::{
    MemoryStateStoreProvider, StateStoreError, StateStoreProvider, StateStoreResult,
};
pub use store::{InMemoryVectorStoreAdapter, VectorCollection, VectorStoreAdapter, VectorStoreService};
pub use sync_point::{
    sync_point_key, CollectionSyncPointManager, StateStoreSyncPointManager, SyncPointManager,
    SyncPointRecord,
};
