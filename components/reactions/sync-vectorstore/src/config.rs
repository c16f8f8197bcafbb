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

//! Configuration types for the sync vector store reaction.

use anyhow::{Context, Result};
use drasi_sync_vectorstore_core::{QueryConfig, VectorStoreSettings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration for the sync vector store reaction.
///
/// # YAML Format
///
/// ```yaml
/// reactionName: product-sync
/// store:
///   storeType: qdrant
///   endpoint: http://localhost:6334
/// embedding:
///   serviceType: azureOpenAi
///   endpoint: https://myresource.openai.azure.com
///   apiKey: your-key
///   model: text-embedding-3-large
/// syncPoints:
///   backend: redb
///   path: /data/sync-points.redb
/// queries:
///   products:
///     collectionName: products
///     keyField: id
///     documentTemplate: "{{name}}: {{description}}"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncVectorStoreReactionConfig {
    pub reaction_name: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Where sync points are persisted
    #[serde(default)]
    pub sync_points: SyncPointBackend,

    /// Shape of every collection the reaction creates
    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    /// Per-query settings, keyed by query id
    #[serde(default)]
    pub queries: BTreeMap<String, QueryConfig>,

    /// Query container hosting the result view service used for bootstrap
    #[serde(default = "default_query_container_id")]
    pub query_container_id: String,

    #[serde(default = "default_management_api_base_url")]
    pub management_api_base_url: String,

    #[serde(default = "default_wait_for_query_ready_seconds")]
    pub wait_for_query_ready_seconds: u64,

    /// Maximum number of texts sent to the embedding service per request
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
}

fn default_query_container_id() -> String {
    "default".to_string()
}

fn default_management_api_base_url() -> String {
    "http://drasi-api:8080".to_string()
}

fn default_wait_for_query_ready_seconds() -> u64 {
    drasi_sync_vectorstore_core::initialization::DEFAULT_WAIT_FOR_QUERY_READY_SECONDS
}

fn default_embedding_batch_size() -> usize {
    drasi_sync_vectorstore_core::document::DEFAULT_EMBEDDING_BATCH_SIZE
}

impl SyncVectorStoreReactionConfig {
    /// Minimal configuration: in-memory store, mock embeddings sized to the
    /// default collection settings, sync points in the vector store.
    pub fn new(reaction_name: impl Into<String>) -> Self {
        let vector_store = VectorStoreSettings::default();
        Self {
            reaction_name: reaction_name.into(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::Mock {
                dimensions: vector_store.embedding_dimensions,
            },
            sync_points: SyncPointBackend::default(),
            vector_store,
            queries: BTreeMap::new(),
            query_container_id: default_query_container_id(),
            management_api_base_url: default_management_api_base_url(),
            wait_for_query_ready_seconds: default_wait_for_query_ready_seconds(),
            embedding_batch_size: default_embedding_batch_size(),
        }
    }

    pub fn with_query(mut self, query_id: impl Into<String>, config: QueryConfig) -> Self {
        self.queries.insert(query_id.into(), config);
        self
    }

    /// Load configuration from a YAML or JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path_ref.display(), e)
        })?;

        // Try YAML first, then JSON
        match serde_yaml::from_str::<Self>(&content) {
            Ok(config) => Ok(config),
            Err(yaml_err) => match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(json_err) => Err(anyhow::anyhow!(
                    "Failed to parse config file '{}':\n  YAML error: {}\n  JSON error: {}",
                    path_ref.display(),
                    yaml_err,
                    json_err
                )),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.reaction_name.trim().is_empty() {
            anyhow::bail!("Reaction name is required");
        }
        if self.embedding_batch_size == 0 {
            anyhow::bail!("Embedding batch size must be greater than 0");
        }
        if self.query_container_id.trim().is_empty() {
            anyhow::bail!("Query container id is required");
        }

        self.vector_store
            .validate()
            .context("Invalid vector store settings")?;
        self.store.validate()?;
        self.embedding.validate()?;
        self.sync_points.validate()?;

        for (query_id, query) in &self.queries {
            query
                .validate()
                .with_context(|| format!("Invalid configuration for query {query_id}"))?;
        }
        Ok(())
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "storeType", rename_all = "camelCase")]
pub enum StoreConfig {
    /// Process-local store for development and tests
    #[default]
    InMemory,
    Qdrant(QdrantStoreConfig),
    AzureAiSearch(AzureAiSearchStoreConfig),
}

impl StoreConfig {
    pub fn store_type(&self) -> &'static str {
        match self {
            StoreConfig::InMemory => "inMemory",
            StoreConfig::Qdrant(_) => "qdrant",
            StoreConfig::AzureAiSearch(_) => "azureAiSearch",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StoreConfig::InMemory => Ok(()),
            StoreConfig::Qdrant(qdrant) => {
                if qdrant.endpoint.trim().is_empty() {
                    anyhow::bail!("Qdrant endpoint is required");
                }
                Ok(())
            }
            StoreConfig::AzureAiSearch(azure) => {
                if azure.endpoint.trim().is_empty() {
                    anyhow::bail!("Azure AI Search endpoint is required");
                }
                if azure.api_key.trim().is_empty() {
                    anyhow::bail!("Azure AI Search API key is required");
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QdrantStoreConfig {
    /// Qdrant gRPC endpoint (e.g., "http://localhost:6334")
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl QdrantStoreConfig {
    /// Parse `Endpoint=...;ApiKey=...`. `Host` and `Key` are accepted as
    /// aliases. An endpoint without a scheme gets `http://`.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let params = parse_connection_string(connection_string);
        let endpoint = params
            .get("endpoint")
            .or_else(|| params.get("host"))
            .filter(|v| !v.is_empty())
            .context("Endpoint or Host is required in connection string for Qdrant")?;
        let api_key = params
            .get("apikey")
            .or_else(|| params.get("key"))
            .filter(|v| !v.is_empty())
            .cloned();

        let endpoint = if endpoint.contains("://") {
            endpoint.clone()
        } else {
            format!("http://{endpoint}")
        };

        Ok(Self { endpoint, api_key })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAiSearchStoreConfig {
    /// Search service URL, e.g. "https://my-search.search.windows.net"
    pub endpoint: String,

    pub api_key: String,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,
}

fn default_search_api_version() -> String {
    "2024-07-01".to_string()
}

impl AzureAiSearchStoreConfig {
    /// Parse `Endpoint=...;ApiKey=...`. `ServiceUrl` and `Key` are accepted
    /// as aliases.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let params = parse_connection_string(connection_string);
        let endpoint = params
            .get("endpoint")
            .or_else(|| params.get("serviceurl"))
            .filter(|v| !v.is_empty())
            .context("Endpoint is required for Azure AI Search")?;
        let api_key = params
            .get("apikey")
            .or_else(|| params.get("key"))
            .filter(|v| !v.is_empty())
            .context("ApiKey is required for Azure AI Search")?;

        Ok(Self {
            endpoint: endpoint.clone(),
            api_key: api_key.clone(),
            api_version: default_search_api_version(),
        })
    }
}

/// Split `Key=Value;Key=Value` into a map with lowercased keys.
fn parse_connection_string(connection_string: &str) -> HashMap<String, String> {
    connection_string
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((key.trim().to_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Embedding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "serviceType", rename_all = "camelCase")]
pub enum EmbeddingConfig {
    /// Deterministic SHA-256 embeddings (for testing)
    Mock {
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    },

    #[serde(rename_all = "camelCase")]
    OpenAi {
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    },

    #[serde(rename_all = "camelCase")]
    AzureOpenAi {
        /// e.g. "https://myresource.openai.azure.com"
        endpoint: String,
        api_key: String,
        /// Deployment name
        model: String,
        #[serde(default = "default_dimensions")]
        dimensions: usize,
        #[serde(default = "default_openai_api_version")]
        api_version: String,
    },
}

fn default_dimensions() -> usize {
    3072
}

fn default_openai_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_openai_api_version() -> String {
    "2024-02-01".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Mock {
            dimensions: default_dimensions(),
        }
    }
}

impl EmbeddingConfig {
    pub fn dimensions(&self) -> usize {
        match self {
            EmbeddingConfig::Mock { dimensions }
            | EmbeddingConfig::OpenAi { dimensions, .. }
            | EmbeddingConfig::AzureOpenAi { dimensions, .. } => *dimensions,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dimensions() == 0 {
            anyhow::bail!("Embedding dimensions must be greater than 0");
        }
        match self {
            EmbeddingConfig::Mock { .. } => {}
            EmbeddingConfig::OpenAi { api_key, model, .. } => {
                if api_key.trim().is_empty() {
                    anyhow::bail!("OpenAI API key is required");
                }
                if model.trim().is_empty() {
                    anyhow::bail!("OpenAI model is required");
                }
            }
            EmbeddingConfig::AzureOpenAi {
                endpoint,
                api_key,
                model,
                ..
            } => {
                if endpoint.trim().is_empty() {
                    anyhow::bail!("Azure OpenAI endpoint is required");
                }
                if api_key.trim().is_empty() {
                    anyhow::bail!("Azure OpenAI API key is required");
                }
                if model.trim().is_empty() {
                    anyhow::bail!("Azure OpenAI deployment (model) is required");
                }
            }
        }
        Ok(())
    }
}

/// Sync point persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "camelCase")]
pub enum SyncPointBackend {
    /// Records in a metadata collection of the configured vector store
    #[default]
    VectorStore,
    /// Process memory; lost on restart
    Memory,
    /// Durable redb database file
    Redb { path: PathBuf },
}

impl SyncPointBackend {
    fn validate(&self) -> Result<()> {
        if let SyncPointBackend::Redb { path } = self {
            if path.as_os_str().is_empty() {
                anyhow::bail!("Redb sync point backend requires a path");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> QueryConfig {
        QueryConfig::new("products", "id", "{{name}}")
    }

    #[test]
    fn test_defaults_from_json() {
        let config: SyncVectorStoreReactionConfig = serde_json::from_value(json!({
            "reactionName": "sync"
        }))
        .unwrap();

        assert_eq!(config.store, StoreConfig::InMemory);
        assert_eq!(config.embedding, EmbeddingConfig::Mock { dimensions: 3072 });
        assert_eq!(config.sync_points, SyncPointBackend::VectorStore);
        assert_eq!(config.management_api_base_url, "http://drasi-api:8080");
        assert_eq!(config.query_container_id, "default");
        assert_eq!(config.wait_for_query_ready_seconds, 300);
        assert_eq!(config.embedding_batch_size, 50);
        assert!(config.queries.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tagged_unions() {
        let config: SyncVectorStoreReactionConfig = serde_json::from_value(json!({
            "reactionName": "sync",
            "store": {"storeType": "qdrant", "endpoint": "http://q:6334", "apiKey": "k"},
            "embedding": {
                "serviceType": "azureOpenAi",
                "endpoint": "https://r.openai.azure.com",
                "apiKey": "secret",
                "model": "embed",
                "dimensions": 1536
            },
            "syncPoints": {"backend": "redb", "path": "/tmp/sp.redb"},
            "vectorStore": {"embeddingDimensions": 1536, "distanceFunction": "Euclidean"}
        }))
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Qdrant(QdrantStoreConfig {
                endpoint: "http://q:6334".to_string(),
                api_key: Some("k".to_string()),
            })
        );
        assert!(matches!(
            &config.embedding,
            EmbeddingConfig::AzureOpenAi { model, api_version, .. }
                if model == "embed" && api_version == "2024-02-01"
        ));
        assert_eq!(
            config.sync_points,
            SyncPointBackend::Redb {
                path: PathBuf::from("/tmp/sp.redb")
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_query_is_reported_by_id() {
        let mut bad = query();
        bad.key_field = String::new();
        let config = SyncVectorStoreReactionConfig::new("sync").with_query("q1", bad);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("q1"));
    }

    #[test]
    fn test_azure_search_requires_api_key() {
        let mut config = SyncVectorStoreReactionConfig::new("sync");
        config.store = StoreConfig::AzureAiSearch(AzureAiSearchStoreConfig {
            endpoint: "https://s.search.windows.net".to_string(),
            api_key: " ".to_string(),
            api_version: default_search_api_version(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_qdrant_connection_string() {
        let config =
            QdrantStoreConfig::from_connection_string("Endpoint=localhost:6334; ApiKey=secret")
                .unwrap();
        assert_eq!(config.endpoint, "http://localhost:6334");
        assert_eq!(config.api_key.as_deref(), Some("secret"));

        let config = QdrantStoreConfig::from_connection_string("host=https://q.cloud:6334").unwrap();
        assert_eq!(config.endpoint, "https://q.cloud:6334");
        assert!(config.api_key.is_none());

        assert!(QdrantStoreConfig::from_connection_string("ApiKey=secret").is_err());
    }

    #[test]
    fn test_azure_search_connection_string() {
        let config = AzureAiSearchStoreConfig::from_connection_string(
            "ServiceUrl=https://s.search.windows.net;Key=abc",
        )
        .unwrap();
        assert_eq!(config.endpoint, "https://s.search.windows.net");
        assert_eq!(config.api_key, "abc");

        assert!(
            AzureAiSearchStoreConfig::from_connection_string("Endpoint=https://s").is_err()
        );
    }

    #[test]
    fn test_load_from_yaml_and_json_files() {
        let dir = tempfile::TempDir::new().unwrap();

        let yaml_path = dir.path().join("config.yaml");
        fs::write(
            &yaml_path,
            r#"
reactionName: yaml-sync
syncPoints:
  backend: memory
queries:
  products:
    collectionName: products
    keyField: id
    documentTemplate: "{{name}}"
"#,
        )
        .unwrap();
        let config = SyncVectorStoreReactionConfig::load_from_file(&yaml_path).unwrap();
        assert_eq!(config.reaction_name, "yaml-sync");
        assert_eq!(config.sync_points, SyncPointBackend::Memory);
        assert_eq!(config.queries["products"].collection_name, "products");

        let json_path = dir.path().join("config.json");
        fs::write(&json_path, r#"{"reactionName": "json-sync"}"#).unwrap();
        let config = SyncVectorStoreReactionConfig::load_from_file(&json_path).unwrap();
        assert_eq!(config.reaction_name, "json-sync");

        let bad_path = dir.path().join("bad.txt");
        fs::write(&bad_path, "reactionName: [unclosed").unwrap();
        let err = SyncVectorStoreReactionConfig::load_from_file(&bad_path).unwrap_err();
        assert!(err.to_string().contains("YAML error"));
    }
}
