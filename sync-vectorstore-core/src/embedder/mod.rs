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

//! Text embedding generation.

pub mod mock;
pub mod openai;

pub use mock::MockEmbedder;
pub use openai::{OpenAiConfig, OpenAiEmbedder};

use anyhow::Result;
use async_trait::async_trait;

/// Generates vector embeddings for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate one embedding per input text, in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn generate(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Name used in log messages.
    fn name(&self) -> &str;
}
