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

//! OpenAI and Azure OpenAI embedding clients.

use super::Embedder;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Connection details for an embeddings provider.
#[derive(Clone)]
pub enum OpenAiConfig {
    Standard {
        api_key: String,
        model: String,
    },
    Azure {
        api_key: String,
        /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
        endpoint: String,
        /// Deployment name of the embedding model
        deployment: String,
        api_version: String,
    },
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenAiConfig::Standard { model, .. } => f
                .debug_struct("Standard")
                .field("model", model)
                .field("api_key", &"***")
                .finish(),
            OpenAiConfig::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => f
                .debug_struct("Azure")
                .field("endpoint", endpoint)
                .field("deployment", deployment)
                .field("api_version", api_version)
                .field("api_key", &"***")
                .finish(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    message: String,
}

/// Embedder backed by the OpenAI embeddings REST API.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            config,
            dimensions,
        }
    }

    fn url(&self) -> String {
        match &self.config {
            OpenAiConfig::Standard { .. } => OPENAI_EMBEDDINGS_URL.to_string(),
            OpenAiConfig::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }

    fn request(&self, texts: &[String]) -> reqwest::RequestBuilder {
        let url = self.url();
        match &self.config {
            OpenAiConfig::Standard { api_key, model } => self
                .client
                .post(url)
                .bearer_auth(api_key)
                .json(&EmbeddingRequest {
                    input: texts,
                    model: Some(model),
                }),
            OpenAiConfig::Azure { api_key, .. } => self
                .client
                .post(url)
                .header("api-key", api_key)
                .json(&EmbeddingRequest {
                    input: texts,
                    model: None,
                }),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn generate(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.name());

        let response = self
            .request(texts)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.name()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
                anyhow::bail!(
                    "{} API error ({}): {}",
                    self.name(),
                    status,
                    api_error.error.message
                );
            }
            anyhow::bail!("{} API error ({status}): {error_text}", self.name());
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.name()))?;

        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        match self.config {
            OpenAiConfig::Standard { .. } => "openai",
            OpenAiConfig::Azure { .. } => "azure_openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure() -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            OpenAiConfig::Azure {
                api_key: "secret".to_string(),
                endpoint: "https://example.openai.azure.com/".to_string(),
                deployment: "text-embedding-3-large".to_string(),
                api_version: "2024-02-01".to_string(),
            },
            3072,
        )
    }

    #[test]
    fn test_azure_url() {
        assert_eq!(
            azure().url(),
            "https://example.openai.azure.com/openai/deployments/text-embedding-3-large/embeddings?api-version=2024-02-01"
        );
        assert_eq!(azure().name(), "azure_openai");
    }

    #[test]
    fn test_standard_url_and_name() {
        let embedder = OpenAiEmbedder::new(
            OpenAiConfig::Standard {
                api_key: "k".to_string(),
                model: "text-embedding-3-small".to_string(),
            },
            1536,
        );
        assert_eq!(embedder.url(), OPENAI_EMBEDDINGS_URL);
        assert_eq!(embedder.name(), "openai");
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_debug_redacts_key() {
        let output = format!("{:?}", azure());
        assert!(!output.contains("secret"));
        assert!(output.contains("***"));
    }

    #[test]
    fn test_response_sorted_by_index() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#,
        )
        .unwrap();
        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![1.0]);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let result = azure().generate(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
