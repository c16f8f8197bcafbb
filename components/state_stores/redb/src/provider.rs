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

//! Redb-based state store provider implementation.

use async_trait::async_trait;
use drasi_sync_vectorstore_core::{StateStoreError, StateStoreProvider, StateStoreResult};
use log::{debug, info};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Table<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

/// Redb-based state store provider.
///
/// Each partition (`store_id`) is a table named `store_{store_id}` in a single
/// database file. Every write runs in its own transaction and is durable once
/// the call returns. redb admits one write transaction at a time, which makes
/// [`compare_and_swap`](StateStoreProvider::compare_and_swap) atomic across
/// tasks sharing the provider.
pub struct RedbStateStoreProvider {
    db: Arc<Database>,
    path: PathBuf,
}

impl fmt::Debug for RedbStateStoreProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbStateStoreProvider")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn storage_error(what: impl fmt::Display, e: impl fmt::Display) -> StateStoreError {
    StateStoreError::StorageError(format!("{what}: {e}"))
}

fn table(name: &str) -> Table<'_> {
    TableDefinition::new(name)
}

impl RedbStateStoreProvider {
    /// Create or open the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or opened.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StateStoreError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(|e| {
            storage_error(
                format!("Failed to create/open redb database at {path:?}"),
                e,
            )
        })?;

        info!("Opened redb state store at {path:?}");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table_name(store_id: &str) -> String {
        format!("store_{store_id}")
    }

    async fn blocking<T, F>(&self, f: F) -> StateStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StateStoreResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StateStoreError::Other(format!("Task join error: {e}")))?
    }
}

#[async_trait]
impl StateStoreProvider for RedbStateStoreProvider {
    async fn get(&self, store_id: &str, key: &str) -> StateStoreResult<Option<Vec<u8>>> {
        let name = Self::table_name(store_id);
        let key = key.to_string();

        self.blocking(move |db| {
            let read_txn = db
                .begin_read()
                .map_err(|e| storage_error(format!("Failed to begin read for '{name}'"), e))?;

            match read_txn.open_table(table(&name)) {
                Ok(table) => {
                    let value = table
                        .get(key.as_str())
                        .map_err(|e| storage_error(format!("Failed to get '{key}' from '{name}'"), e))?;
                    Ok(value.map(|v| v.value().to_vec()))
                }
                Err(TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(storage_error(format!("Failed to open table '{name}'"), e)),
            }
        })
        .await
    }

    async fn set(&self, store_id: &str, key: &str, value: Vec<u8>) -> StateStoreResult<()> {
        let name = Self::table_name(store_id);
        let key = key.to_string();

        self.blocking(move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| storage_error(format!("Failed to begin write for '{name}'"), e))?;
            {
                let mut table = write_txn
                    .open_table(table(&name))
                    .map_err(|e| storage_error(format!("Failed to open table '{name}'"), e))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| storage_error(format!("Failed to insert '{key}' into '{name}'"), e))?;
            }
            write_txn
                .commit()
                .map_err(|e| storage_error(format!("Failed to commit write to '{name}'"), e))?;
            debug!("Set key '{key}' in '{name}'");
            Ok(())
        })
        .await
    }

    async fn delete(&self, store_id: &str, key: &str) -> StateStoreResult<bool> {
        let name = Self::table_name(store_id);
        let key = key.to_string();

        self.blocking(move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| storage_error(format!("Failed to begin write for '{name}'"), e))?;
            let existed = {
                let mut table = write_txn
                    .open_table(table(&name))
                    .map_err(|e| storage_error(format!("Failed to open table '{name}'"), e))?;
                let removed = table
                    .remove(key.as_str())
                    .map_err(|e| storage_error(format!("Failed to remove '{key}' from '{name}'"), e))?;
                removed.is_some()
            };
            write_txn
                .commit()
                .map_err(|e| storage_error(format!("Failed to commit delete in '{name}'"), e))?;
            if existed {
                debug!("Deleted key '{key}' from '{name}'");
            }
            Ok(existed)
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        store_id: &str,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StateStoreResult<bool> {
        let name = Self::table_name(store_id);
        let key = key.to_string();
        let expected = expected.map(<[u8]>::to_vec);

        self.blocking(move |db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| storage_error(format!("Failed to begin write for '{name}'"), e))?;
            let swapped = {
                let mut table = write_txn
                    .open_table(table(&name))
                    .map_err(|e| storage_error(format!("Failed to open table '{name}'"), e))?;
                let current = table
                    .get(key.as_str())
                    .map_err(|e| storage_error(format!("Failed to get '{key}' from '{name}'"), e))?
                    .map(|v| v.value().to_vec());

                if current == expected {
                    table
                        .insert(key.as_str(), new_value.as_slice())
                        .map_err(|e| {
                            storage_error(format!("Failed to insert '{key}' into '{name}'"), e)
                        })?;
                    true
                } else {
                    false
                }
            };

            if swapped {
                write_txn
                    .commit()
                    .map_err(|e| storage_error(format!("Failed to commit swap in '{name}'"), e))?;
                debug!("Swapped key '{key}' in '{name}'");
            } else {
                write_txn
                    .abort()
                    .map_err(|e| storage_error(format!("Failed to abort swap in '{name}'"), e))?;
                debug!("Compare-and-swap on '{key}' in '{name}' lost: value changed");
            }
            Ok(swapped)
        })
        .await
    }

    async fn list_keys(&self, store_id: &str) -> StateStoreResult<Vec<String>> {
        let name = Self::table_name(store_id);

        self.blocking(move |db| {
            let read_txn = db
                .begin_read()
                .map_err(|e| storage_error(format!("Failed to begin read for '{name}'"), e))?;

            let table = match read_txn.open_table(table(&name)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(storage_error(format!("Failed to open table '{name}'"), e)),
            };

            let iter = table
                .iter()
                .map_err(|e| storage_error(format!("Failed to iterate '{name}'"), e))?;
            let mut keys = Vec::new();
            for entry in iter {
                let (key, _) =
                    entry.map_err(|e| storage_error(format!("Failed to read entry of '{name}'"), e))?;
                keys.push(key.value().to_string());
            }
            Ok(keys)
        })
        .await
    }

    async fn sync(&self) -> StateStoreResult<()> {
        // Commits are already durable; an empty write transaction flushes
        // nothing but confirms the database is writable.
        self.blocking(|db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| storage_error("Failed to begin sync transaction", e))?;
            write_txn
                .commit()
                .map_err(|e| storage_error("Failed to commit sync transaction", e))?;
            debug!("Synced redb state store");
            Ok(())
        })
        .await
    }
}
