use crate::{
    context::ChatRequest,
    error::ParleyError,
    message::{Attachment, ChannelKind, Message},
    model::{AiContext, Bot, Contact, DiffusionOutput, DiffusionParams, ModelConfig},
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Opaque inbound event as produced by a connector, parsed back by the same
/// connector in [`Connector::parse_raw`].
pub type RawEvent = serde_json::Value;

/// Presence shown to the other side of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Typing,
    Offline,
    Default,
}

/// Messaging connector, one per (owner, network).
///
/// The router only ever holds `Arc<dyn Connector>`; each network is one
/// implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Which network this connector speaks.
    fn channel(&self) -> ChannelKind;

    /// Open the session and start producing raw events.
    async fn connect(&self) -> Result<mpsc::Receiver<RawEvent>, ParleyError>;

    /// Close the session, keeping credentials.
    async fn disconnect(&self) -> Result<(), ParleyError>;

    /// Close the session and drop credentials.
    async fn logout(&self) -> Result<(), ParleyError>;

    async fn is_connected(&self) -> bool;

    /// Deliver a message (text and/or images) to its chat.
    async fn send_message(&self, message: &Message) -> Result<(), ParleyError>;

    /// Turn a raw event into a message. `Ok(None)` for events that carry no
    /// chat message (edits, service messages, ...).
    async fn parse_raw(&self, raw: RawEvent) -> Result<Option<Message>, ParleyError>;

    /// Update the presence shown in a chat. Implementations may delay to look
    /// human.
    async fn set_presence(&self, _chat_id: &str, _presence: Presence) -> Result<(), ParleyError> {
        Ok(())
    }
}

/// LLM backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Produce the assistant answer for `request`.
    ///
    /// Must fail with [`ParleyError::Cancelled`] when `cancel` is already
    /// triggered or becomes triggered mid-flight, and with
    /// [`ParleyError::Config`] when `request.contexts` is empty.
    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ParleyError>;

    /// Check if the backend is reachable.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Audio-to-text backend.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Attachment) -> Result<String, ParleyError>;
}

/// Image captioning backend.
#[async_trait]
pub trait Visor: Send + Sync {
    async fn describe(&self, image: &Attachment) -> Result<String, ParleyError>;
}

/// Text-to-image backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// `prompt_model` is the LLM used to rewrite non-raw prompts.
    async fn generate(
        &self,
        prompt_model: &str,
        params: &DiffusionParams,
    ) -> Result<DiffusionOutput, ParleyError>;
}

/// Lookups into the persistence layer used while routing.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_bot(&self, owner_id: &str, channel: ChannelKind)
        -> Result<Option<Bot>, ParleyError>;

    async fn find_contact(
        &self,
        owner_id: &str,
        channel: ChannelKind,
        handle: &str,
    ) -> Result<Option<Contact>, ParleyError>;

    async fn create_contact(&self, contact: &Contact) -> Result<(), ParleyError>;

    /// Enabled AI contexts that apply to `channel`.
    async fn contexts_for_channel(
        &self,
        owner_id: &str,
        channel: ChannelKind,
    ) -> Result<Vec<AiContext>, ParleyError>;

    async fn model_config(&self, owner_id: &str) -> Result<Option<ModelConfig>, ParleyError>;
}

/// Generates avatar URLs for new contacts.
pub trait AvatarProvider: Send + Sync {
    fn generate(&self, seed: &str) -> String;
}
