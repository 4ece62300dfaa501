use serde::{Deserialize, Serialize};

use super::defaults::*;

/// LLM backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Models served by the hosted backend; everything else goes to Ollama.
    #[serde(default = "default_hosted_models")]
    pub hosted_models: Vec<String>,
    pub openai: Option<OpenAiConfig>,
    pub ollama: Option<OllamaConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            hosted_models: default_hosted_models(),
            openai: None,
            ollama: None,
        }
    }
}

/// OpenAI-compatible hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
        }
    }
}

/// Ollama local backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    /// Context window requested per call.
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    /// Maximum tokens generated per answer.
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
    /// Pull models that are not installed yet.
    #[serde(default = "default_true")]
    pub auto_pull: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            num_ctx: default_num_ctx(),
            num_predict: default_num_predict(),
            auto_pull: true,
        }
    }
}
