//! Model backend clients for Corvid.
//!
//! `OpenAiCompatClient` speaks the `/v1/chat/completions` dialect that
//! nearly every hosted or local backend exposes. `ReliableClient` wraps any
//! [`ModelClient`](corvid_core::provider::ModelClient) with a bounded
//! timeout and a single jittered retry. It is the only retry policy in the
//! system; the scheduler deliberately has none.

pub mod openai_compat;
pub mod reliable;

pub use openai_compat::OpenAiCompatClient;
pub use reliable::ReliableClient;

use corvid_config::BotSettings;
use corvid_core::provider::ModelClient;
use std::sync::Arc;
use std::time::Duration;

/// Build the model client stack from settings: an OpenAI-compatible client
/// wrapped in the reliability layer.
pub fn build_from_settings(settings: &BotSettings) -> Arc<dyn ModelClient> {
    let api_key = settings.api_key.clone().unwrap_or_default();
    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| "https://openrouter.ai/api/v1".into());

    let inner = OpenAiCompatClient::new("openrouter", base_url, api_key);
    Arc::new(
        ReliableClient::new(Arc::new(inner))
            .with_timeout(Duration::from_secs(settings.reliability.request_timeout_secs))
            .with_retry(settings.reliability.retry_once)
            .with_jitter(Duration::from_millis(settings.reliability.retry_jitter_ms)),
    )
}
