//! Offline hashing embedder.
//!
//! Maps each lowercase word to a bucket with FNV-1a and counts occurrences,
//! so texts sharing words land close together. Deterministic, no network.
//! Completions are not supported.

use async_trait::async_trait;
use cairn_core::error::ProviderError;
use cairn_core::provider::*;

/// Vector length used when the request does not name one.
pub const DEFAULT_DIMENSIONS: usize = 64;

/// An embedding-only provider that needs neither key nor network.
#[derive(Debug, Default, Clone)]
pub struct HashingProvider;

impl HashingProvider {
    pub fn new() -> Self {
        Self
    }

    /// Embed one text into `dimensions` buckets.
    pub fn vector(text: &str, dimensions: usize) -> Vec<f32> {
        let dimensions = dimensions.max(1);
        let mut v = vec![0.0f32; dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = fnv1a(&word.to_lowercase());
            v[(hash % dimensions as u64) as usize] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        v
    }
}

fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Provider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "the hashing provider only produces embeddings".into(),
        ))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let dimensions = request.dimensions.unwrap_or(DEFAULT_DIMENSIONS);
        Ok(EmbeddingResponse {
            embeddings: request
                .inputs
                .iter()
                .map(|text| Self::vector(text, dimensions))
                .collect(),
            model: request.model,
            usage: None,
        })
    }
}
