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

//! Vector store adapter seam.
//!
//! Each backend implements [`VectorStoreAdapter`] to hand out
//! [`VectorCollection`] handles. Every `upsert` and `delete` call is expected
//! to be all-or-nothing from the caller's point of view. A backend that can
//! only apply a batch partially must report any per-item failure as an error
//! so the change event is redelivered.

pub mod memory;
pub mod service;

pub use memory::InMemoryVectorStoreAdapter;
pub use service::VectorStoreService;

use crate::config::VectorStoreSettings;
use crate::document::VectorDocument;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A handle to one collection in a vector store.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<VectorDocument>>;

    /// Insert or replace documents by key.
    async fn upsert(&self, documents: &[VectorDocument]) -> Result<()>;

    /// Delete documents by key. Keys that do not exist are ignored.
    async fn delete(&self, keys: &[String]) -> Result<()>;
}

/// Factory for collection handles of one store backend.
#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    /// Short backend name used in logs.
    fn store_type(&self) -> &str;

    /// Return a handle to `name`, creating the collection with `settings`
    /// when it is missing and `create` is set.
    ///
    /// # Errors
    ///
    /// Fails if the collection is missing and `create` is false.
    async fn get_or_create_collection(
        &self,
        name: &str,
        settings: &VectorStoreSettings,
        create: bool,
    ) -> Result<Arc<dyn VectorCollection>>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Delete a collection if it exists.
    async fn delete_collection(&self, name: &str) -> Result<()>;
}
