//! OpenAI-compatible hosted backend.
//!
//! Works with OpenAI's API and any endpoint speaking `/chat/completions`.

use async_trait::async_trait;
use parley_core::{
    config::OpenAiConfig,
    context::{ApiMessage, ChatRequest},
    error::ParleyError,
    traits::LlmBackend,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{precheck, until_cancelled};

const MAX_COMPLETION_TOKENS: u32 = 1000;

/// OpenAI-compatible backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Create from config values.
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn post_completion(&self, body: &ChatCompletionRequest) -> Result<String, ParleyError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("[openai] POST {url} model={}", body.model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ParleyError::Provider(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Provider(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| ParleyError::Provider(format!("openai: failed to parse response: {e}")))?;

        Ok(parsed.into_text())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl ChatCompletionRequest {
    fn from_request(request: &ChatRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request.to_api_messages(),
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        precheck(request, cancel)?;
        if self.api_key.is_empty() {
            return Err(ParleyError::Config("openai: no API key configured".into()));
        }

        let body = ChatCompletionRequest::from_request(request);
        info!("[openai] requesting response from {}", request.model);
        until_cancelled(cancel, self.post_completion(&body)).await
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("[openai] no API key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("[openai] not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::context::{HistoryEntry, SamplingParams};

    fn backend(key: &str) -> OpenAiBackend {
        OpenAiBackend::from_config(&OpenAiConfig {
            api_key: key.into(),
            base_url: "https://api.openai.com/v1/".into(),
        })
    }

    fn request() -> ChatRequest {
        ChatRequest {
            history: vec![HistoryEntry::user("Hi"), HistoryEntry::assistant("Hello!")],
            contexts: vec!["Be brief.".into()],
            model: "gpt-4o-mini".into(),
            params: SamplingParams {
                temperature: Some(0.3),
                ..SamplingParams::default()
            },
        }
    }

    #[test]
    fn test_openai_backend_name() {
        let b = backend("sk-test");
        assert_eq!(b.name(), "openai");
        assert_eq!(b.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_openai_request_serialization() {
        let body = ChatCompletionRequest::from_request(&request());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_completion_tokens"], 1000);
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_openai_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Hey"}}],"model":"gpt-4o-mini"}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.into_text(), "Hey");
    }

    #[test]
    fn test_openai_response_without_choices() {
        let resp: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(resp.into_text(), "");
    }

    #[tokio::test]
    async fn test_openai_fails_fast_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = backend("sk-test").chat(&request(), &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_openai_requires_api_key() {
        let err = backend("")
            .chat(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
        assert!(!backend("").is_available().await);
    }
}
