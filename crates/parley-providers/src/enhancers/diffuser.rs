use async_trait::async_trait;
use parley_core::{
    context::{ChatRequest, HistoryEntry, SamplingParams},
    error::ParleyError,
    model::{DiffusionOutput, DiffusionParams},
    traits::{ImageGenerator, LlmBackend},
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

const PROMPT_ENGINEER_CONTEXT: &str = "You are an expert in transforming a simple sentence into an \
image generation prompt optimized for diffusion-based models. Take generic text descriptions and \
turn them into detailed, concise and precise image prompts. Always return a valid prompt: if some \
part of the request cannot be served for policy or ethical reasons, adapt that part so the prompt \
stays valid. Include every relevant visual detail such as colors, lighting, mood, perspective and \
objects, while staying easy to follow for an image generator.";

/// Text-to-image over HTTP. Non-raw prompts are first rewritten by an LLM.
pub struct HttpImageGenerator {
    client: reqwest::Client,
    endpoint: String,
    llm: Arc<dyn LlmBackend>,
}

#[derive(Serialize)]
struct DiffusionRequest<'a> {
    prompt: &'a str,
    name: String,
    seed: u64,
}

impl HttpImageGenerator {
    pub fn new(endpoint: impl Into<String>, llm: Arc<dyn LlmBackend>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            llm,
        }
    }

    /// Rewrite a plain sentence into a diffusion prompt.
    async fn optimize_prompt(&self, model: &str, sentence: &str) -> Result<String, ParleyError> {
        let request = ChatRequest {
            history: vec![HistoryEntry::user(format!(
                "Based on the provided sentence: {sentence}\n\n\
                 Provide a detailed image generation prompt optimized for diffusion-based models, \
                 preserving the original meaning of the sentence. Respond with the optimized prompt \
                 and nothing else. Always answer in English, except for text between double quotes, \
                 which keeps its original language."
            ))],
            contexts: vec![PROMPT_ENGINEER_CONTEXT.to_string()],
            model: model.to_string(),
            params: SamplingParams {
                enable_tools: false,
                temperature: Some(0.0),
                ..SamplingParams::default()
            },
        };

        let prompt = self.llm.chat(&request, &CancellationToken::new()).await?;
        debug!("[diffuser] optimized prompt: {prompt}");
        Ok(prompt.trim().to_string())
    }

    async fn render(&self, prompt: &str, seed: u64) -> Result<Vec<u8>, ParleyError> {
        let body = DiffusionRequest {
            prompt,
            name: Uuid::new_v4().to_string(),
            seed,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Enhancer(format!("diffusion request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Enhancer(format!(
                "diffusion returned {status}: {text}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ParleyError::Enhancer(format!("diffusion body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        prompt_model: &str,
        params: &DiffusionParams,
    ) -> Result<DiffusionOutput, ParleyError> {
        let prompt = if params.use_raw_prompt {
            params.prompt.trim().to_string()
        } else {
            self.optimize_prompt(prompt_model, &params.prompt).await?
        };

        if prompt.is_empty() {
            return Err(ParleyError::Enhancer("no prompt provided".into()));
        }

        info!("[diffuser] generating image (seed {})", params.seed);
        let image = self.render(&prompt, params.seed).await?;

        Ok(DiffusionOutput {
            image,
            seed: params.seed,
            prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLlm {
        answer: String,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl LlmBackend for RecordingLlm {
        fn name(&self) -> &str {
            "recording"
        }

        async fn chat(
            &self,
            request: &ChatRequest,
            _cancel: &CancellationToken,
        ) -> Result<String, ParleyError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.answer.clone())
        }
    }

    #[tokio::test]
    async fn test_optimize_prompt_uses_zero_temperature() {
        let llm = Arc::new(RecordingLlm {
            answer: "  a red fox in golden light  ".into(),
            ..Default::default()
        });
        let generator = HttpImageGenerator::new("http://127.0.0.1:9/diffuse", llm.clone());

        let prompt = generator
            .optimize_prompt("llama3.1", "un zorro rojo")
            .await
            .unwrap();
        assert_eq!(prompt, "a red fox in golden light");

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "llama3.1");
        assert_eq!(seen[0].params.temperature, Some(0.0));
        assert!(!seen[0].params.enable_tools);
        assert!(seen[0].history[0].content.contains("un zorro rojo"));
    }

    #[tokio::test]
    async fn test_empty_raw_prompt_is_rejected() {
        let llm = Arc::new(RecordingLlm::default());
        let generator = HttpImageGenerator::new("http://127.0.0.1:9/diffuse", llm.clone());
        let params = DiffusionParams {
            prompt: "   ".into(),
            use_raw_prompt: true,
            seed: 1,
        };
        let err = generator.generate("llama3.1", &params).await.unwrap_err();
        assert!(matches!(err, ParleyError::Enhancer(_)));
        assert!(llm.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_rewritten_prompt_is_rejected() {
        let llm = Arc::new(RecordingLlm::default());
        let generator = HttpImageGenerator::new("http://127.0.0.1:9/diffuse", llm);
        let params = DiffusionParams {
            prompt: "a cat".into(),
            use_raw_prompt: false,
            seed: 1,
        };
        let err = generator.generate("llama3.1", &params).await.unwrap_err();
        assert!(matches!(err, ParleyError::Enhancer(_)));
    }

    #[test]
    fn test_diffusion_request_serialization() {
        let body = DiffusionRequest {
            prompt: "a red fox",
            name: "n".into(),
            seed: 42,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["prompt"], "a red fox");
        assert_eq!(json["seed"], 42);
    }
}
