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

//! Deterministic SHA-256 based embedder for tests and local runs.
//!
//! Each dimension reads four consecutive hash bytes (wrapping), maps the
//! resulting `u32` to `[-1, 1]`, and the vector is then L2-normalized.

use super::Embedder;
use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let hash = Sha256::digest(text.as_bytes());

        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let offset = (i * 4) % hash.len();
                let seed = u32::from_be_bytes([
                    hash[offset],
                    hash[(offset + 1) % hash.len()],
                    hash[(offset + 2) % hash.len()],
                    hash[(offset + 3) % hash.len()],
                ]);
                ((seed as f64 / u32::MAX as f64) * 2.0 - 1.0) as f32
            })
            .collect();

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn generate(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}
