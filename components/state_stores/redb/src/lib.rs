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

//! Redb-Based State Store Provider
//!
//! A durable [`StateStoreProvider`](drasi_sync_vectorstore_core::StateStoreProvider)
//! backed by [redb](https://docs.rs/redb), an embedded key-value database
//! written in pure Rust. Combined with
//! [`StateStoreSyncPointManager`](drasi_sync_vectorstore_core::StateStoreSyncPointManager)
//! it keeps sync points across restarts.
//!
//! # Usage
//!
//! ```ignore
//! use drasi_state_store_redb::RedbStateStoreProvider;
//! use drasi_sync_vectorstore_core::StateStoreSyncPointManager;
//! use std::sync::Arc;
//!
//! let state_store = RedbStateStoreProvider::new("/data/sync-points.redb")?;
//! let sync_points = StateStoreSyncPointManager::new(Arc::new(state_store));
//! ```
//!
//! # Database Structure
//!
//! One database file with one table per `store_id`, named `store_{store_id}`.
//! Tables are created on first write. Keys are strings, values are bytes.

mod provider;

pub use provider::RedbStateStoreProvider;
