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

//! Per-query and collection-shape configuration.

use serde::{Deserialize, Serialize};

/// Static configuration for one continuous query subscription.
///
/// Immutable for the lifetime of the subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    /// Target collection in the vector store
    pub collection_name: String,

    /// Field path of the unique key in each result row. Dotted paths such as
    /// `after.id` address nested values.
    pub key_field: String,

    /// Handlebars template rendered into the document content
    pub document_template: String,

    #[serde(default)]
    pub title_template: Option<String>,

    /// Row field holding a precomputed embedding. When absent the content is
    /// embedded by the configured embedder.
    #[serde(default)]
    pub vector_field: Option<String>,

    #[serde(default = "default_create_collection")]
    pub create_collection: bool,

    #[serde(default)]
    pub sync_point_retention_days: Option<u32>,
}

fn default_create_collection() -> bool {
    true
}

impl QueryConfig {
    pub fn new(
        collection_name: impl Into<String>,
        key_field: impl Into<String>,
        document_template: impl Into<String>,
    ) -> Self {
        Self {
            collection_name: collection_name.into(),
            key_field: key_field.into(),
            document_template: document_template.into(),
            title_template: None,
            vector_field: None,
            create_collection: default_create_collection(),
            sync_point_retention_days: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.collection_name.trim().is_empty() {
            anyhow::bail!("Collection name is required");
        }
        if self.key_field.trim().is_empty() {
            anyhow::bail!("Key field is required");
        }
        if self.document_template.trim().is_empty() {
            anyhow::bail!("Document template is required");
        }
        if self.sync_point_retention_days == Some(0) {
            anyhow::bail!("Sync point retention must be at least one day");
        }
        Ok(())
    }
}

/// Similarity metric used for the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceFunction {
    #[default]
    #[serde(alias = "Cosine")]
    CosineSimilarity,
    CosineDistance,
    #[serde(alias = "Euclidean")]
    EuclideanDistance,
    #[serde(alias = "DotProduct")]
    DotProductSimilarity,
    #[serde(alias = "Manhattan")]
    ManhattanDistance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    #[default]
    Hnsw,
    Flat,
    IvfFlat,
    DiskAnn,
}

/// Shape of every collection created by the reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreSettings {
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    #[serde(default)]
    pub distance_function: DistanceFunction,

    #[serde(default)]
    pub index_kind: IndexKind,

    #[serde(default = "default_is_filterable")]
    pub is_filterable: bool,

    #[serde(default)]
    pub is_full_text_searchable: bool,
}

fn default_embedding_dimensions() -> usize {
    3072
}

fn default_is_filterable() -> bool {
    true
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            embedding_dimensions: default_embedding_dimensions(),
            distance_function: DistanceFunction::default(),
            index_kind: IndexKind::default(),
            is_filterable: default_is_filterable(),
            is_full_text_searchable: false,
        }
    }
}

impl VectorStoreSettings {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            embedding_dimensions: dimensions,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding_dimensions == 0 {
            anyhow::bail!("Embedding dimensions must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_config_defaults() {
        let config: QueryConfig = serde_json::from_value(json!({
            "collectionName": "products",
            "keyField": "id",
            "documentTemplate": "{{name}}"
        }))
        .expect("Failed to deserialize");

        assert!(config.create_collection);
        assert!(config.vector_field.is_none());
        assert!(config.title_template.is_none());
        assert!(config.sync_point_retention_days.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_query_config_full() {
        let config: QueryConfig = serde_json::from_value(json!({
            "collectionName": "products",
            "keyField": "after.id",
            "documentTemplate": "{{name}}",
            "titleTemplate": "{{title}}",
            "vectorField": "embedding",
            "createCollection": false,
            "syncPointRetentionDays": 7
        }))
        .expect("Failed to deserialize");

        assert!(!config.create_collection);
        assert_eq!(config.vector_field.as_deref(), Some("embedding"));
        assert_eq!(config.sync_point_retention_days, Some(7));
    }

    #[test]
    fn test_query_config_validation() {
        let mut config = QueryConfig::new("products", "id", "{{name}}");
        assert!(config.validate().is_ok());

        config.key_field = " ".to_string();
        let err = config.validate().expect_err("empty key field should fail");
        assert!(err.to_string().contains("Key field"));

        let mut config = QueryConfig::new("", "id", "{{name}}");
        assert!(config.validate().is_err());
        config.collection_name = "c".to_string();
        config.document_template = String::new();
        assert!(config.validate().is_err());

        let mut config = QueryConfig::new("c", "id", "{{name}}");
        config.sync_point_retention_days = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings: VectorStoreSettings =
            serde_json::from_value(json!({})).expect("Failed to deserialize");
        assert_eq!(settings, VectorStoreSettings::default());
        assert_eq!(settings.embedding_dimensions, 3072);
        assert_eq!(settings.distance_function, DistanceFunction::CosineSimilarity);
        assert_eq!(settings.index_kind, IndexKind::Hnsw);
        assert!(settings.is_filterable);
        assert!(!settings.is_full_text_searchable);
    }

    #[test]
    fn test_distance_function_aliases() {
        let settings: VectorStoreSettings = serde_json::from_value(json!({
            "distanceFunction": "Euclidean",
            "indexKind": "Flat"
        }))
        .expect("Failed to deserialize");
        assert_eq!(
            settings.distance_function,
            DistanceFunction::EuclideanDistance
        );
        assert_eq!(settings.index_kind, IndexKind::Flat);

        let distance: DistanceFunction =
            serde_json::from_value(json!("DotProductSimilarity")).expect("deserialize");
        assert_eq!(distance, DistanceFunction::DotProductSimilarity);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let settings = VectorStoreSettings::with_dimensions(0);
        assert!(settings.validate().is_err());
    }
}
