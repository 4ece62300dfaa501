//! Ollama local model backend.
//!
//! Talks to a locally running Ollama server. No API key required. Models that
//! are not installed yet can be pulled on first use. When the model config
//! enables tools, tool calls are answered with `role: tool` messages and the
//! conversation is sent again.

use async_trait::async_trait;
use parley_core::{
    config::OllamaConfig,
    context::{ChatRequest, SamplingParams},
    error::ParleyError,
    traits::LlmBackend,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tools::{self, ToolDef};
use crate::{precheck, until_cancelled};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TOP_K: u32 = 40;
const DEFAULT_TOP_P: f32 = 0.9;
/// Tool-call rounds answered before the reply is taken as final.
const MAX_TOOL_ROUNDS: usize = 3;

/// Ollama backend bound to one server.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    num_ctx: u32,
    num_predict: u32,
    auto_pull: bool,
    /// Models already confirmed present on the server.
    installed: Mutex<HashSet<String>>,
}

impl OllamaBackend {
    /// Create from config values.
    pub fn from_config(config: &OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            num_ctx: config.num_ctx,
            num_predict: config.num_predict,
            auto_pull: config.auto_pull,
            installed: Mutex::new(HashSet::new()),
        }
    }

    /// Pull `model` unless the server already has it.
    async fn ensure_model(&self, model: &str) -> Result<(), ParleyError> {
        if self.installed.lock().await.contains(model) {
            return Ok(());
        }

        let url = format!("{}/api/tags", self.base_url);
        let tags: OllamaTags = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ParleyError::Provider(format!("ollama: listing models failed: {e}")))?
            .json()
            .await
            .map_err(|e| ParleyError::Provider(format!("ollama: bad tags response: {e}")))?;

        if !tags.models.iter().any(|m| m.name.contains(model)) {
            warn!("[ollama] model {model} not installed, pulling");
            let url = format!("{}/api/pull", self.base_url);
            let pulled: OllamaPullStatus = self
                .client
                .post(&url)
                .json(&serde_json::json!({ "model": model, "stream": false }))
                .send()
                .await
                .map_err(|e| ParleyError::Provider(format!("ollama: pull failed: {e}")))?
                .json()
                .await
                .map_err(|e| ParleyError::Provider(format!("ollama: bad pull response: {e}")))?;

            if pulled.status != "success" {
                return Err(ParleyError::Provider(format!(
                    "ollama: pulling {model} ended with status {}",
                    pulled.status
                )));
            }
            info!("[ollama] pulled {model}");
        }

        self.installed.lock().await.insert(model.to_string());
        Ok(())
    }

    fn build_body(&self, request: &ChatRequest) -> OllamaChatRequest {
        let messages = request
            .to_api_messages()
            .into_iter()
            .map(|m| OllamaChatMessage {
                role: m.role,
                content: m.content,
                tool_calls: None,
            })
            .collect();

        OllamaChatRequest {
            model: request.model.clone(),
            messages,
            stream: false,
            options: self.options(&request.params),
            tools: request
                .params
                .enable_tools
                .then(|| to_ollama_tools(&tools::builtin_tool_defs())),
        }
    }

    fn options(&self, params: &SamplingParams) -> OllamaOptions {
        OllamaOptions {
            num_predict: self.num_predict,
            num_ctx: self.num_ctx,
            temperature: params.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_k: params.top_k.unwrap_or(DEFAULT_TOP_K),
            top_p: params.top_p.unwrap_or(DEFAULT_TOP_P),
        }
    }

    async fn post_chat(&self, body: &OllamaChatRequest) -> Result<OllamaChatMessage, ParleyError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!("[ollama] POST {url} model={}", body.model);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ParleyError::Provider(format!("ollama request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Provider(format!(
                "ollama returned {status}: {text}"
            )));
        }

        let parsed: OllamaChatResponse = resp
            .json()
            .await
            .map_err(|e| ParleyError::Provider(format!("ollama: failed to parse response: {e}")))?;

        Ok(parsed.message.unwrap_or_else(|| OllamaChatMessage {
            role: "assistant".to_string(),
            content: String::new(),
            tool_calls: None,
        }))
    }
}

/// Convert ToolDef to Ollama format.
fn to_ollama_tools(defs: &[ToolDef]) -> Vec<OllamaToolDef> {
    defs.iter()
        .map(|d| OllamaToolDef {
            tool_type: "function".to_string(),
            function: OllamaFunctionDef {
                name: d.name.clone(),
                description: d.description.clone(),
                parameters: d.parameters.clone(),
            },
        })
        .collect()
}

/// One `tool` message per call to a known tool; unknown tools are skipped.
fn tool_results(calls: &[OllamaToolCall]) -> Vec<OllamaChatMessage> {
    calls
        .iter()
        .filter_map(|call| {
            let output = tools::execute(&call.function.name, &call.function.arguments);
            if output.is_none() {
                warn!("[ollama] model called unknown tool {}", call.function.name);
            }
            output
        })
        .map(|content| OllamaChatMessage {
            role: "tool".to_string(),
            content,
            tool_calls: None,
        })
        .collect()
}

// --- Serde types ---

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaToolDef>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct OllamaChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Serialize, Clone)]
struct OllamaToolDef {
    #[serde(rename = "type")]
    tool_type: String,
    function: OllamaFunctionDef,
}

#[derive(Serialize, Clone)]
struct OllamaFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    num_ctx: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaPullStatus {
    #[serde(default)]
    status: String,
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        precheck(request, cancel)?;

        if self.auto_pull {
            until_cancelled(cancel, self.ensure_model(&request.model)).await?;
        }

        let mut body = self.build_body(request);
        info!("[ollama] requesting response from {}", request.model);

        let mut rounds = 0;
        loop {
            let reply = until_cancelled(cancel, self.post_chat(&body)).await?;
            let calls = match reply.tool_calls.as_deref() {
                Some(calls) if !calls.is_empty() && rounds < MAX_TOOL_ROUNDS => calls.to_vec(),
                _ => {
                    debug!("[ollama] response received ({} chars)", reply.content.len());
                    return Ok(reply.content);
                }
            };
            rounds += 1;

            let names: Vec<&str> = calls.iter().map(|c| c.function.name.as_str()).collect();
            info!("[ollama] tool calls [{rounds}]: {}", names.join(", "));
            body.messages.push(reply);
            body.messages.extend(tool_results(&calls));
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("[ollama] not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::context::HistoryEntry;

    fn backend() -> OllamaBackend {
        OllamaBackend::from_config(&OllamaConfig {
            base_url: "http://localhost:11434/".into(),
            ..OllamaConfig::default()
        })
    }

    fn request(params: SamplingParams) -> ChatRequest {
        ChatRequest {
            history: vec![HistoryEntry::user("Hello")],
            contexts: vec!["Be helpful.".into()],
            model: "llama3.1".into(),
            params,
        }
    }

    #[test]
    fn test_ollama_backend_name_and_url() {
        let b = backend();
        assert_eq!(b.name(), "ollama");
        assert_eq!(b.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_uses_default_sampling() {
        let body = backend().build_body(&request(SamplingParams::default()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.1");
        assert!(!json["stream"].as_bool().unwrap());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["options"]["top_k"], 40);
        assert_eq!(json["options"]["num_ctx"], 8192);
        assert_eq!(json["options"]["num_predict"], 1000);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_ollama_request_honours_model_params() {
        let params = SamplingParams {
            temperature: Some(0.1),
            top_k: Some(5),
            top_p: Some(0.5),
            enable_tools: false,
        };
        let body = backend().build_body(&request(params));
        assert_eq!(body.options.top_k, 5);
        assert!((body.options.top_p - 0.5).abs() < f32::EPSILON);
        assert!((body.options.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ollama_response_parsing() {
        let json = r#"{"message":{"role":"assistant","content":"Hi there!"},"model":"llama3.1","done":true}"#;
        let resp: OllamaChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.message.unwrap().content, "Hi there!");
    }

    #[test]
    fn test_ollama_tools_sent_only_when_enabled() {
        let body = backend().build_body(&request(SamplingParams::default()));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());

        let params = SamplingParams {
            enable_tools: true,
            ..Default::default()
        };
        let body = backend().build_body(&request(params));
        let json = serde_json::to_value(&body).unwrap();
        let tools = json["tools"].as_array().unwrap();
        assert_eq!(tools.len(), tools::builtin_tool_defs().len());
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "getCurrentDate");
    }

    #[test]
    fn test_ollama_tool_call_round_trip() {
        let json = r#"{"message":{"role":"assistant","content":"","tool_calls":[
            {"function":{"name":"dateCalculation","arguments":{"startDate":"2024-02-27","daysToAdd":3}}},
            {"function":{"name":"getWeather","arguments":{}}}
        ]}}"#;
        let resp: OllamaChatResponse = serde_json::from_str(json).unwrap();
        let reply = resp.message.unwrap();
        let calls = reply.tool_calls.clone().unwrap();
        assert_eq!(calls.len(), 2);

        let results = tool_results(&calls);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].role, "tool");
        assert_eq!(
            results[0].content,
            "The new date after adding 3 days is 2024-03-01."
        );

        // The assistant turn goes back to the server with its tool calls.
        let echoed = serde_json::to_value(&reply).unwrap();
        assert_eq!(echoed["tool_calls"][0]["function"]["name"], "dateCalculation");
        let plain = serde_json::to_value(&results[0]).unwrap();
        assert!(plain.get("tool_calls").is_none());
    }

    #[test]
    fn test_ollama_tags_parsing() {
        let json = r#"{"models":[{"name":"llama3.1:latest","size":1}]}"#;
        let tags: OllamaTags = serde_json::from_str(json).unwrap();
        assert!(tags.models[0].name.contains("llama3.1"));
    }

    #[tokio::test]
    async fn test_ollama_fails_fast_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = backend()
            .chat(&request(SamplingParams::default()), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_ollama_rejects_empty_contexts() {
        let mut req = request(SamplingParams::default());
        req.contexts.clear();
        let err = backend()
            .chat(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
    }
}
