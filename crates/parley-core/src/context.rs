use serde::{Deserialize, Serialize};

/// Author of a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters from the owner's model config. Unset fields fall back
/// to each backend's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default)]
    pub enable_tools: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Everything an LLM backend needs for one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation history (oldest first), already ending with the new user turn.
    pub history: Vec<HistoryEntry>,
    /// System prompt fragments, sent in order ahead of the history.
    pub contexts: Vec<String>,
    /// Model identifier, also used to pick the backend.
    pub model: String,
    #[serde(default)]
    pub params: SamplingParams,
}

/// A structured message for API-based backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "system", "user", "assistant" or "tool".
    pub role: String,
    pub content: String,
}

impl ChatRequest {
    /// Flatten into API messages: one system message per context, then history.
    pub fn to_api_messages(&self) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(self.contexts.len() + self.history.len());

        for context in &self.contexts {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: context.clone(),
            });
        }

        for entry in &self.history {
            messages.push(ApiMessage {
                role: entry.role.as_str().to_string(),
                content: entry.content.clone(),
            });
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_api_messages_puts_contexts_first() {
        let req = ChatRequest {
            history: vec![
                HistoryEntry::user("Hi"),
                HistoryEntry::assistant("Hello!"),
                HistoryEntry::user("How are you?"),
            ],
            contexts: vec!["Be helpful.".into(), "Speak like a pirate.".into()],
            model: "llama3.1".into(),
            params: SamplingParams::default(),
        };
        let messages = req.to_api_messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "Speak like a pirate.");
        assert_eq!(messages[3].role, "assistant");
        assert_eq!(messages[4].content, "How are you?");
    }

    #[test]
    fn test_sampling_params_deserialize_without_fields() {
        let params: SamplingParams = serde_json::from_str("{}").unwrap();
        assert!(!params.enable_tools);
        assert!(params.temperature.is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&HistoryEntry::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
