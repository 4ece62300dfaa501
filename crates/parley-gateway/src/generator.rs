//! Response generation: attachment enrichment, context resolution and the
//! LLM call.

use crate::commands::CommandDispatcher;
use chrono::{SecondsFormat, Utc};
use futures::future::try_join_all;
use parley_core::{
    config::Capabilities,
    context::{ChatRequest, HistoryEntry},
    error::ParleyError,
    message::{ChannelKind, Message},
    model::{Contact, ModelConfig},
    traits::{Directory, LlmBackend, Transcriber, Visor},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Turns an inbound batch into an assistant answer.
pub struct ResponseGenerator {
    owner_id: String,
    channel: ChannelKind,
    capabilities: Capabilities,
    directory: Arc<dyn Directory>,
    llm: Arc<dyn LlmBackend>,
    transcriber: Option<Arc<dyn Transcriber>>,
    visor: Option<Arc<dyn Visor>>,
    commands: CommandDispatcher,
}

impl ResponseGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: impl Into<String>,
        channel: ChannelKind,
        capabilities: Capabilities,
        directory: Arc<dyn Directory>,
        llm: Arc<dyn LlmBackend>,
        transcriber: Option<Arc<dyn Transcriber>>,
        visor: Option<Arc<dyn Visor>>,
        commands: CommandDispatcher,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            channel,
            capabilities,
            directory,
            llm,
            transcriber,
            visor,
            commands,
        }
    }

    /// Message text with transcripts and image captions appended.
    ///
    /// Service failures are skipped; cancelling `cancel` abandons the work.
    pub async fn enrich(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        let enrichment = async {
            let mut text = message.content.text.clone();
            if let Some(transcripts) = self.transcribe(message).await {
                text = format!("{text}\n\n{transcripts}");
            }
            if let Some(captions) = self.describe(message).await {
                text = format!("{text}\n\n{captions}");
            }
            text
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ParleyError::Cancelled),
            text = enrichment => Ok(text),
        }
    }

    async fn transcribe(&self, message: &Message) -> Option<String> {
        if !message.has_audios() || !self.capabilities.transcriptions {
            return None;
        }
        let transcriber = self.transcriber.as_ref()?;

        let jobs = message.content.audios.iter().map(|a| transcriber.transcribe(a));
        match try_join_all(jobs).await {
            Ok(texts) => {
                let joined = texts.join("\n\n");
                debug!("[{}] transcribed audio for {}: {joined}", self.channel, message.chat_id);
                (!joined.is_empty()).then_some(joined)
            }
            Err(e) => {
                warn!("[{}] transcription failed for {}: {e}", self.channel, message.chat_id);
                None
            }
        }
    }

    async fn describe(&self, message: &Message) -> Option<String> {
        if !message.has_images() || !self.capabilities.vision {
            return None;
        }
        let visor = self.visor.as_ref()?;

        let jobs = message.content.images.iter().map(|i| visor.describe(i));
        let captions: Vec<String> = match try_join_all(jobs).await {
            Ok(texts) => texts.into_iter().filter(|t| !t.is_empty()).collect(),
            Err(e) => {
                warn!("[{}] image captioning failed for {}: {e}", self.channel, message.chat_id);
                return None;
            }
        };

        if captions.is_empty() {
            warn!("[{}] no image captions for {}", self.channel, message.chat_id);
            return None;
        }
        debug!(
            "[{}] captioned {} image(s) for {}",
            self.channel,
            captions.len(),
            message.chat_id
        );
        Some(caption_block(&captions))
    }

    /// System contexts for a chat with `contact`, command explanation first.
    ///
    /// Enabled contexts assigned to the contact win outright; without any,
    /// every enabled non-exclusive context applies.
    pub async fn contexts(&self, contact: Option<&Contact>) -> Result<Vec<String>, ParleyError> {
        let enabled: Vec<_> = self
            .directory
            .contexts_for_channel(&self.owner_id, self.channel)
            .await?
            .into_iter()
            .filter(|c| c.enabled)
            .collect();

        let assigned: Vec<_> = match contact {
            Some(contact) => enabled
                .iter()
                .filter(|c| contact.contexts.contains(&c.id))
                .collect(),
            None => Vec::new(),
        };

        let chosen: Vec<_> = if assigned.is_empty() {
            enabled.iter().filter(|c| !c.exclusive).collect()
        } else {
            assigned
        };

        let mut contexts = Vec::with_capacity(chosen.len() + 1);
        contexts.push(self.commands.explanation());
        contexts.extend(chosen.into_iter().map(|c| fill_placeholders(&c.content)));
        Ok(contexts)
    }

    /// The owner's model config; its absence fails the turn.
    pub async fn model_config(&self) -> Result<ModelConfig, ParleyError> {
        self.directory
            .model_config(&self.owner_id)
            .await?
            .ok_or_else(|| ParleyError::MissingModelConfig(self.owner_id.clone()))
    }

    /// Ask the LLM to answer `text` after `history`.
    pub async fn answer(
        &self,
        history: Vec<HistoryEntry>,
        text: &str,
        contexts: Vec<String>,
        config: &ModelConfig,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError> {
        let mut history = history;
        history.push(HistoryEntry::user(text));

        let request = ChatRequest {
            history,
            contexts,
            model: config.model.clone(),
            params: config.params.clone(),
        };
        self.llm.chat(&request, cancel).await
    }
}

/// Instruction block presenting image captions as things the model saw.
fn caption_block(captions: &[String]) -> String {
    if let [caption] = captions {
        return format!(
            "Here is an image caption: \"{caption}\"\n\
             Imagine you are seeing the image based on its caption if the conversation requires it.\n\
             **DO NOT mention I provided you the image description**.\n\
             **DO NOT add any details that are not present in the description**.\n\
             **Respond in the language of the conversation despite this concrete text and the image description are in English**.\n\n"
        );
    }

    let mut block = String::from("Here are some image captions:\n");
    for (i, caption) in captions.iter().enumerate() {
        block.push_str(&format!("Caption {}: \"{caption}\"\n---\n", i + 1));
    }
    block.push_str(
        "Imagine you are seeing the images based on their captions if the conversation requires it.\n\
         **DO NOT mention I provided you the image descriptions**.\n\
         **DO NOT add any details that are not present in the descriptions**.\n\
         **Respond in the language of the conversation despite this concrete text and the image descriptions are in English**.\n\n",
    );
    block
}

/// Substitute `[datetime]`, `[date]` and `[time]` with the current UTC time.
fn fill_placeholders(text: &str) -> String {
    let now = Utc::now();
    text.replace("[datetime]", &now.to_rfc3339_opts(SecondsFormat::Millis, true))
        .replace("[date]", &now.format("%Y-%m-%d").to_string())
        .replace("[time]", &now.format("%H:%M:%S%.3fZ").to_string())
}
