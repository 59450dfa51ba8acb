//! OpenAI-compatible model client.
//!
//! Works with: OpenRouter, OpenAI, Ollama, vLLM, Together AI, Fireworks AI,
//! and any backend exposing a `/v1/chat/completions` endpoint. The extended
//! sampling parameters (`top_k`, `repetition_penalty`, `min_p`) are included
//! only when set, so strict OpenAI endpoints never see them.

use async_trait::async_trait;
use corvid_core::error::ModelError;
use corvid_core::provider::{CompletionRequest, CompletionResponse, ModelClient, Usage};
use serde::Deserialize;
use tracing::{debug, warn};

/// An OpenAI-compatible model client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new OpenAI-compatible client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Build the wire-format request body.
    fn to_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.params.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(top_p) = request.params.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(top_k) = request.params.top_k {
            body["top_k"] = serde_json::json!(top_k);
        }
        if let Some(v) = request.params.frequency_penalty {
            body["frequency_penalty"] = serde_json::json!(v);
        }
        if let Some(v) = request.params.presence_penalty {
            body["presence_penalty"] = serde_json::json!(v);
        }
        if let Some(v) = request.params.repetition_penalty {
            body["repetition_penalty"] = serde_json::json!(v);
        }
        if let Some(v) = request.params.min_p {
            body["min_p"] = serde_json::json!(v);
        }

        body
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::to_body(&request);

        debug!(client = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ModelError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(ModelError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("No choices in response".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            text: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            usage,
        })
    }
}

// --- Wire format types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::provider::SamplingParams;

    fn request(params: SamplingParams) -> CompletionRequest {
        CompletionRequest {
            model: "test/model".into(),
            prompt: "Hello".into(),
            params,
            max_tokens: None,
        }
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OpenAiCompatClient::new("test", "https://example.com/v1/", "key");
        assert_eq!(client.base_url, "https://example.com/v1");
    }

    #[test]
    fn body_omits_unset_params() {
        let body = OpenAiCompatClient::to_body(&request(SamplingParams::default()));
        assert!(body.get("top_k").is_none());
        assert!(body.get("min_p").is_none());
        assert!(body.get("repetition_penalty").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn body_includes_extended_params_when_set() {
        let params = SamplingParams {
            top_k: Some(40),
            repetition_penalty: Some(1.1),
            min_p: Some(0.05),
            ..SamplingParams::default()
        };
        let body = OpenAiCompatClient::to_body(&request(params));
        assert_eq!(body["top_k"], 40);
        assert_eq!(body["min_p"], 0.05);
        assert!((body["repetition_penalty"].as_f64().unwrap() - 1.1).abs() < 1e-6);
    }

    #[test]
    fn response_parsing() {
        let json = r#"{
            "choices": [{"message": {"content": "Hi there!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16},
            "model": "test/model-v2"
        }"#;
        let parsed: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi there!"));
        assert_eq!(parsed.usage.as_ref().unwrap().total_tokens, 16);
        assert_eq!(parsed.model, "test/model-v2");
    }

    #[test]
    fn convenience_constructors() {
        assert_eq!(OpenAiCompatClient::openrouter("k").name(), "openrouter");
        assert!(OpenAiCompatClient::ollama(None).base_url.contains("11434"));
    }
}
