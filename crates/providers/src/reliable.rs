//! Reliability wrapper — bounded timeout and a single jittered retry.
//!
//! The scheduler assumes every admitted job eventually releases its slot;
//! this wrapper is what makes that assumption true for real network calls.
//! A call that times out or fails is retried once after a short random
//! jitter, and the second failure is final.

use async_trait::async_trait;
use corvid_core::error::ModelError;
use corvid_core::provider::{CompletionRequest, CompletionResponse, ModelClient};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A client that wraps another client with timeout and retry behavior.
pub struct ReliableClient {
    inner: Arc<dyn ModelClient>,
    timeout: Duration,
    retry_once: bool,
    jitter_max: Duration,
}

impl ReliableClient {
    pub fn new(inner: Arc<dyn ModelClient>) -> Self {
        Self {
            inner,
            timeout: Duration::from_secs(90),
            retry_once: true,
            jitter_max: Duration::from_millis(750),
        }
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable the single retry.
    pub fn with_retry(mut self, retry_once: bool) -> Self {
        self.retry_once = retry_once;
        self
    }

    /// Set the upper bound of the random pause before the retry.
    pub fn with_jitter(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    async fn attempt(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ModelError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ModelError::Timeout(format!(
                "Backend '{}' exceeded {}s",
                self.inner.name(),
                self.timeout.as_secs()
            ))),
        }
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = self.jitter_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

#[async_trait]
impl ModelClient for ReliableClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ModelError> {
        match self.attempt(request.clone()).await {
            Ok(response) => Ok(response),
            Err(first_error) if self.retry_once => {
                warn!(
                    client = %self.inner.name(),
                    error = %first_error,
                    "Model call failed, retrying once"
                );
                tokio::time::sleep(self.jitter()).await;
                self.attempt(request).await
            }
            Err(e) => Err(e),
        }
    }
}
