//! Raw update → Message.

use super::types::{TgMessage, TgUpdate, TgUser};
use super::TelegramConnector;
use chrono::{DateTime, Utc};
use parley_core::{
    error::ParleyError,
    message::{
        Attachment, AttachmentKind, ChannelKind, Message, MessageContent, MessageMeta,
        MessageStatus, Participant,
    },
    traits::RawEvent,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(super) fn participant(user: &TgUser, is_me: bool) -> Participant {
    Participant {
        id: user.id.to_string(),
        name: user.display_name(),
        username: user
            .username
            .clone()
            .unwrap_or_else(|| user.id.to_string()),
        is_me,
    }
}

impl TelegramConnector {
    /// Decode one `getUpdates` entry. Non-message updates and group chats yield `None`.
    pub(crate) async fn parse_update(&self, raw: RawEvent) -> Result<Option<Message>, ParleyError> {
        let update: TgUpdate = serde_json::from_value(raw)?;

        let Some(msg) = update.message else {
            return Ok(None);
        };

        // Parley answers person-to-person only.
        if msg.chat.chat_type != "private" {
            debug!("[telegram] ignoring {} chat {}", msg.chat.chat_type, msg.chat.id);
            return Ok(None);
        }

        let Some(from) = msg.from.as_ref() else {
            return Ok(None);
        };

        let me = self.me.read().await.clone();
        let is_me = me.as_ref().is_some_and(|m| m.id == from.id);
        let sender = participant(from, is_me);
        let receiver = if is_me {
            // A private chat's id is the other user's id.
            Participant {
                id: msg.chat.id.to_string(),
                name: String::new(),
                username: msg.chat.id.to_string(),
                is_me: false,
            }
        } else {
            match me.as_ref() {
                Some(me) => participant(me, true),
                None => Participant {
                    id: "me".into(),
                    name: String::new(),
                    username: "me".into(),
                    is_me: true,
                },
            }
        };

        let content = self.content_of(&msg).await;
        let timestamp = DateTime::<Utc>::from_timestamp(msg.date, 0).unwrap_or_else(Utc::now);

        Ok(Some(Message {
            id: Uuid::new_v4(),
            chat_id: msg.chat.id.to_string(),
            sender,
            receiver,
            timestamp,
            content,
            meta: MessageMeta::default(),
            status: MessageStatus::Delivered,
            channel: ChannelKind::Telegram,
            is_bot_message: false,
        }))
    }

    /// Text plus downloaded attachments. Failed downloads are skipped.
    async fn content_of(&self, msg: &TgMessage) -> MessageContent {
        let mut content = MessageContent::text(
            msg.text
                .clone()
                .or_else(|| msg.caption.clone())
                .unwrap_or_default(),
        );

        // Telegram sends multiple sizes; the last is the largest.
        if let Some(largest) = msg.photo.as_ref().and_then(|p| p.last()) {
            match self.download_file(&largest.file_id).await {
                Ok(bytes) => {
                    info!(
                        "[telegram] downloaded photo ({}x{})",
                        largest.width, largest.height
                    );
                    content
                        .images
                        .push(Attachment::new(AttachmentKind::Image, bytes, "image/jpeg"));
                }
                Err(e) => warn!("[telegram] photo download failed: {e}"),
            }
        }

        for audio in [msg.voice.as_ref(), msg.audio.as_ref()].into_iter().flatten() {
            match self.download_file(&audio.file_id).await {
                Ok(bytes) => {
                    let mime = audio.mime_type.clone().unwrap_or_else(|| "audio/ogg".into());
                    content
                        .audios
                        .push(Attachment::new(AttachmentKind::Audio, bytes, mime));
                }
                Err(e) => warn!("[telegram] audio download failed: {e}"),
            }
        }

        content
    }
}
