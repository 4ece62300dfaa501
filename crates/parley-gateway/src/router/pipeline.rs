//! Message sweep: batching, access checks and the response pipeline.

use super::state::{Batch, Latch};
use super::Router;
use parley_core::{
    error::ParleyError,
    message::{Message, MessageContent},
    model::Contact,
    traits::Presence,
};
use std::collections::HashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of a batch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Handled {
    Processed,
    /// The access lists refused the counterpart.
    Rejected,
}

impl Router {
    /// Process one batch for every chat with queued messages.
    ///
    /// A sweep started while another one runs returns immediately.
    pub async fn sweep(&self) {
        let Some(_latch) = Latch::acquire(&self.sweeping) else {
            debug!("[{}] sweep already running, skipping", self.channel);
            return;
        };
        let _guard = self.sweep_lock.lock().await;

        let chat_ids: Vec<String> = self
            .chats
            .lock()
            .await
            .iter()
            .filter(|c| !c.pending.is_empty())
            .map(|c| c.chat_id.clone())
            .collect();

        for chat_id in chat_ids {
            self.sweep_chat(&chat_id).await;
        }
    }

    async fn sweep_chat(&self, chat_id: &str) {
        let Some(batch) = self.with_chat(chat_id, |chat| chat.next_batch()).await else {
            return;
        };

        let result = self.handle_batch(chat_id, &batch).await;

        self.with_chat(chat_id, |chat| {
            match &result {
                Ok(Handled::Processed) => chat.remove(&batch.ids),
                Ok(Handled::Rejected) => chat.pending.clear(),
                Err(ParleyError::Cancelled) => {}
                Err(_) => chat.pending.clear(),
            }
            chat.cancel = None;
        })
        .await;

        match result {
            Ok(Handled::Processed) => {
                debug!("[{}] batch processed for {chat_id}", self.channel);
            }
            Ok(Handled::Rejected) => {
                info!(
                    "[{}] {} is not allowed, queue cleared for {chat_id}",
                    self.channel,
                    batch.message.counterpart().id
                );
            }
            Err(ParleyError::Cancelled) => {
                warn!("[{}] processing superseded for {chat_id}, retrying", self.channel);
            }
            Err(e) => {
                error!("[{}] processing failed for {chat_id}, queue cleared: {e}", self.channel);
            }
        }
    }

    async fn handle_batch(&self, chat_id: &str, batch: &Batch) -> Result<Handled, ParleyError> {
        let message = &batch.message;

        if !self.allowed(message).await? {
            return Ok(Handled::Rejected);
        }

        let contact = self.contact_for(message).await?;

        let cancel = CancellationToken::new();
        self.with_chat(chat_id, |chat| chat.cancel = Some(cancel.clone()))
            .await;

        if message.is_outgoing() {
            let text = message.content.text.clone();
            self.with_chat(chat_id, |chat| chat.history.push_assistant(text))
                .await;
            info!("[{}] outgoing message recorded for {chat_id}", self.channel);
        } else {
            self.process_incoming(message, &contact, &cancel).await?;
            info!("[{}] incoming message processed for {chat_id}", self.channel);
        }
        Ok(Handled::Processed)
    }

    /// Access-list check against the chat counterpart. No bot row means no
    /// restrictions.
    pub(super) async fn allowed(&self, message: &Message) -> Result<bool, ParleyError> {
        let bot = self.directory.find_bot(&self.owner_id, self.channel).await?;
        Ok(match bot {
            Some(bot) => bot.allows(&message.counterpart().id),
            None => true,
        })
    }

    /// The counterpart's contact, created on first contact.
    async fn contact_for(&self, message: &Message) -> Result<Contact, ParleyError> {
        let who = message.counterpart();
        if let Some(contact) = self
            .directory
            .find_contact(&self.owner_id, self.channel, &who.id)
            .await?
        {
            return Ok(contact);
        }

        let contact = Contact {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: self.owner_id.clone(),
            name: who.name.clone(),
            avatar: self.avatars.generate(&who.username),
            handles: HashMap::from([(self.channel, who.id.clone())]),
            contexts: Vec::new(),
        };
        self.directory.create_contact(&contact).await?;
        info!("[{}] new contact {} for {}", self.channel, contact.id, who.id);
        Ok(contact)
    }

    async fn process_incoming(
        &self,
        message: &Message,
        contact: &Contact,
        cancel: &CancellationToken,
    ) -> Result<(), ParleyError> {
        let chat_id = message.chat_id.as_str();
        let text = self.generator.enrich(message, cancel).await?;
        if text.is_empty() {
            info!("[{}] empty message in {chat_id}, skipping", self.channel);
            return Ok(());
        }

        let now = Instant::now();
        if self.with_chat(chat_id, |chat| chat.is_suppressed(now)).await {
            info!("[{}] auto-responses paused for {chat_id}, recording only", self.channel);
            self.with_chat(chat_id, |chat| chat.history.push_user(text))
                .await;
            return Ok(());
        }

        let contexts = self.generator.contexts(Some(contact)).await?;
        let model = self.generator.model_config().await?;
        debug!(
            "[{}] {} context(s) for {chat_id}, model {}",
            self.channel,
            contexts.len(),
            model.model
        );

        self.presence(chat_id, Presence::Online).await;
        self.presence(chat_id, Presence::Typing).await;

        let history = self.with_chat(chat_id, |chat| chat.history.snapshot()).await;
        let answer = self
            .generator
            .answer(history, &text, contexts, &model, cancel)
            .await?;

        self.with_chat(chat_id, |chat| chat.history.push_user(text))
            .await;

        if !answer.is_empty() {
            let reply = message.reply(MessageContent::text(answer.clone()));
            self.with_chat(chat_id, |chat| chat.history.push_assistant(answer))
                .await;
            self.connector.send_message(&reply).await?;
        }

        self.presence(chat_id, Presence::Offline).await;
        Ok(())
    }
}
