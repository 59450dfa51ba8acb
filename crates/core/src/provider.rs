//! ModelClient trait — the abstraction over model backends.
//!
//! A ModelClient knows how to turn a rendered prompt into completion text.
//! Implementations live in the providers crate; the scheduler sits between
//! every caller and these clients so a small number of expensive backends
//! are never over-subscribed.

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the backend.
///
/// Every field the settings collaborator recognizes is enumerated here;
/// optional fields are omitted from the wire request when `None` so
/// backends that don't support them never see them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature (0.0–2.0).
    pub temperature: f32,

    /// Nucleus sampling cutoff (0.01–1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k cutoff (≥ -1; -1 disables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,

    /// Frequency penalty (-2.0–2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Presence penalty (-2.0–2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Repetition penalty (0.1–2.0), for OpenRouter/vLLM-style backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    /// Minimum probability cutoff (0.0–1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            repetition_penalty: None,
            min_p: None,
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g. "anthropic/claude-sonnet-4").
    pub model: String,

    /// The fully rendered prompt text.
    pub prompt: String,

    /// Sampling parameters.
    pub params: SamplingParams,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text.
    pub text: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,

    /// Token usage statistics, when the backend reports them.
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core model-backend trait.
///
/// Every backend (OpenRouter, OpenAI, local endpoints) implements this; the
/// decision engine and response pipeline call it without knowing which one
/// is configured.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Send a prompt and await the completion.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = SamplingParams::default();
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!(params.top_k.is_none());
        assert!(params.repetition_penalty.is_none());
    }

    #[test]
    fn optional_params_omitted_from_wire_format() {
        let req = CompletionRequest {
            model: "test-model".into(),
            prompt: "hello".into(),
            params: SamplingParams::default(),
            max_tokens: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("top_k"));
        assert!(!json.contains("min_p"));
        assert!(!json.contains("max_tokens"));

        let full = CompletionRequest {
            params: SamplingParams {
                top_k: Some(40),
                min_p: Some(0.05),
                ..SamplingParams::default()
            },
            max_tokens: Some(512),
            ..req
        };
        let json = serde_json::to_string(&full).unwrap();
        assert!(json.contains("top_k"));
        assert!(json.contains("min_p"));
        assert!(json.contains("max_tokens"));
    }
}
