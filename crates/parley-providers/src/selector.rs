//! Routes each request to the hosted or the local backend by model name.

use async_trait::async_trait;
use parley_core::{context::ChatRequest, error::ParleyError, traits::LlmBackend};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Hosted models go to the hosted backend, everything else stays local.
pub struct ProviderSelector {
    hosted_models: HashSet<String>,
    hosted: Option<Arc<dyn LlmBackend>>,
    local: Option<Arc<dyn LlmBackend>>,
}

impl ProviderSelector {
    pub fn new(
        hosted_models: impl IntoIterator<Item = String>,
        hosted: Option<Arc<dyn LlmBackend>>,
        local: Option<Arc<dyn LlmBackend>>,
    ) -> Self {
        Self {
            hosted_models: hosted_models.into_iter().collect(),
            hosted,
            local,
        }
    }

    pub fn is_hosted(&self, model: &str) -> bool {
        self.hosted_models.contains(model)
    }

    /// Backend serving `model`.
    pub fn select(&self, model: &str) -> Result<&Arc<dyn LlmBackend>, ParleyError> {
        let (kind, backend) = if self.is_hosted(model) {
            ("hosted", self.hosted.as_ref())
        } else {
            ("local", self.local.as_ref())
        };
        backend.ok_or_else(|| {
            ParleyError::Config(format!("no {kind} backend configured for model {model}"))
        })
    }
}

#[async_trait]
impl LlmBackend for ProviderSelector {
    fn name(&self) -> &str {
        "selector"
    }

    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        let backend = self.select(&request.model)?;
        debug!("[selector] {} -> {}", request.model, backend.name());
        backend.chat(request, cancel).await
    }

    async fn is_available(&self) -> bool {
        for backend in self.hosted.iter().chain(self.local.iter()) {
            if backend.is_available().await {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::context::SamplingParams;

    struct Named(&'static str);

    #[async_trait]
    impl LlmBackend for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn chat(
            &self,
            _request: &ChatRequest,
            _cancel: &CancellationToken,
        ) -> Result<String, ParleyError> {
            Ok(self.0.to_string())
        }
    }

    fn selector() -> ProviderSelector {
        ProviderSelector::new(
            vec!["gpt-4o-mini".to_string()],
            Some(Arc::new(Named("openai"))),
            Some(Arc::new(Named("ollama"))),
        )
    }

    fn request(model: &str) -> ChatRequest {
        ChatRequest {
            history: vec![],
            contexts: vec!["ctx".into()],
            model: model.into(),
            params: SamplingParams::default(),
        }
    }

    #[tokio::test]
    async fn test_hosted_model_goes_to_hosted_backend() {
        let s = selector();
        let out = s
            .chat(&request("gpt-4o-mini"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "openai");
    }

    #[tokio::test]
    async fn test_other_models_stay_local() {
        let s = selector();
        let out = s
            .chat(&request("llama3.1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "ollama");
    }

    #[test]
    fn test_missing_backend_is_config_error() {
        let s = ProviderSelector::new(vec!["gpt-4o-mini".to_string()], None, None);
        assert!(matches!(
            s.select("gpt-4o-mini"),
            Err(ParleyError::Config(_))
        ));
        assert!(s.select("llama3.1").is_err());
    }
}
