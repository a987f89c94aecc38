//! Embedding gateway.
//!
//! Wraps a [`Provider`] so the rest of the store only ever sees unit-norm,
//! fixed-precision vectors of the requested dimensionality. Failed batches
//! are retried with exponential backoff up to a configured bound.

use cairn_config::EmbeddingConfig;
use cairn_core::error::{ProviderError, StoreError};
use cairn_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How failed embedding calls are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Deadline for a single provider call
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

/// Batched, retrying, normalizing access to an embedding model.
pub struct EmbeddingGateway {
    provider: Arc<dyn Provider>,
    model: String,
    policy: RetryPolicy,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            policy,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &EmbeddingConfig) -> Self {
        Self::new(provider, config.model.clone(), RetryPolicy::from_config(config))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed `inputs` in one batch.
    ///
    /// Returns one unit vector per input, in input order, each component
    /// rounded to `precision` decimal digits.
    pub async fn embed(
        &self,
        inputs: &[String],
        precision: u32,
        dimensions: usize,
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match tokio::time::timeout(
                self.policy.timeout,
                self.attempt(inputs, precision, dimensions),
            )
            .await
            {
                Ok(Ok(vectors)) => {
                    debug!(count = vectors.len(), dimensions, attempt, "Embedded batch");
                    return Ok(vectors);
                }
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "embedding call exceeded {}s",
                    self.policy.timeout.as_secs_f32()
                )),
            };

            if !error.is_transient() || attempt >= self.policy.max_attempts {
                return Err(StoreError::ProviderFailure {
                    attempts: attempt,
                    reason: error.to_string(),
                });
            }

            let wait = match &error {
                ProviderError::RateLimited { retry_after_secs } => {
                    backoff.max(Duration::from_secs(*retry_after_secs))
                }
                _ => backoff,
            };
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "Embedding call failed, retrying"
            );
            tokio::time::sleep(wait).await;
            backoff = (backoff * 2).min(self.policy.max_backoff);
        }
    }

    /// Embed a single string.
    pub async fn embed_one(
        &self,
        input: &str,
        precision: u32,
        dimensions: usize,
    ) -> Result<Vec<f32>, StoreError> {
        let mut vectors = self.embed(&[input.to_string()], precision, dimensions).await?;
        vectors.pop().ok_or_else(|| StoreError::ProviderFailure {
            attempts: 1,
            reason: "empty embedding response".into(),
        })
    }

    async fn attempt(
        &self,
        inputs: &[String],
        precision: u32,
        dimensions: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: inputs.to_vec(),
                dimensions: Some(dimensions),
            })
            .await?;

        if response.embeddings.len() != inputs.len() {
            return Err(malformed(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .iter()
            .map(|raw| {
                if raw.len() != dimensions {
                    return Err(malformed(format!(
                        "expected {dimensions} dimensions, got {}",
                        raw.len()
                    )));
                }
                normalize(raw, precision).ok_or_else(|| malformed("zero-norm embedding".into()))
            })
            .collect()
    }
}

fn malformed(message: String) -> ProviderError {
    ProviderError::ApiError {
        status_code: 200,
        message,
    }
}

/// Scale `vector` to unit L2 norm and round each component to `precision`
/// decimal digits. `None` for a zero or non-finite norm.
pub fn normalize(vector: &[f32], precision: u32) -> Option<Vec<f32>> {
    let norm = vector
        .iter()
        .map(|x| (*x as f64) * (*x as f64))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    let scale = 10f64.powi(precision as i32);
    Some(
        vector
            .iter()
            .map(|x| ((*x as f64 / norm) * scale).round() / scale)
            .map(|x| x as f32)
            .collect(),
    )
}
