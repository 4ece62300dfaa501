use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Messaging network a message flows through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    Whatsapp,
}

impl ChannelKind {
    /// Stable lowercase name, also used as the storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
        }
    }

    /// Parse a stored channel name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "telegram" => Some(Self::Telegram),
            "whatsapp" => Some(Self::Whatsapp),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Platform-specific account id.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Platform handle, used as avatar seed for new contacts.
    pub username: String,
    /// Whether this participant is the account owner.
    pub is_me: bool,
}

/// Supported attachment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    Document,
}

/// A binary attachment carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub data: Vec<u8>,
    pub mime: String,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            kind,
            data,
            mime: mime.into(),
        }
    }

    /// File extension derived from the mime subtype (e.g. `image/png` → `png`).
    pub fn extension(&self) -> &str {
        self.mime
            .split('/')
            .nth(1)
            .and_then(|sub| sub.split(';').next())
            .filter(|sub| !sub.is_empty())
            .unwrap_or("bin")
    }
}

/// Text plus ordered attachment lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
    #[serde(default)]
    pub images: Vec<Attachment>,
    #[serde(default)]
    pub audios: Vec<Attachment>,
    #[serde(default)]
    pub videos: Vec<Attachment>,
    #[serde(default)]
    pub documents: Vec<Attachment>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Self-destruct timer in seconds, for ephemeral chats.
    #[serde(default)]
    pub ephemeral: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Delivered,
    Read,
}

/// A chat message. Immutable: every transformation returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Channel-specific conversation id.
    pub chat_id: String,
    pub sender: Participant,
    pub receiver: Participant,
    pub timestamp: DateTime<Utc>,
    pub content: MessageContent,
    #[serde(default)]
    pub meta: MessageMeta,
    #[serde(default)]
    pub status: MessageStatus,
    pub channel: ChannelKind,
    /// Authored by Parley itself rather than a human.
    #[serde(default)]
    pub is_bot_message: bool,
}

impl Message {
    /// Owner wrote this from their own device to somebody else.
    pub fn is_manual_reply(&self) -> bool {
        self.sender.is_me && !self.receiver.is_me && !self.is_bot_message
    }

    /// Sent by the owner (manually or by Parley) to someone else.
    pub fn is_outgoing(&self) -> bool {
        self.sender.is_me && !self.receiver.is_me
    }

    pub fn has_images(&self) -> bool {
        !self.content.images.is_empty()
    }

    pub fn has_audios(&self) -> bool {
        !self.content.audios.is_empty()
    }

    /// The participant that is not the owner; the sender when both are.
    pub fn counterpart(&self) -> &Participant {
        if self.sender.is_me && !self.receiver.is_me {
            &self.receiver
        } else {
            &self.sender
        }
    }

    pub fn delivered(&self) -> Self {
        Self {
            status: MessageStatus::Delivered,
            ..self.clone()
        }
    }

    pub fn read(&self) -> Self {
        Self {
            status: MessageStatus::Read,
            ..self.clone()
        }
    }

    /// Fold `other` into this message. `None` when the chats differ.
    ///
    /// Text is joined with a single space and attachment lists are
    /// concatenated, this message's first.
    pub fn combine(&self, other: &Message) -> Option<Self> {
        if self.chat_id != other.chat_id {
            return None;
        }

        let concat = |a: &[Attachment], b: &[Attachment]| -> Vec<Attachment> {
            a.iter().chain(b.iter()).cloned().collect()
        };

        Some(Self {
            content: MessageContent {
                text: format!("{} {}", self.content.text, other.content.text),
                images: concat(&self.content.images, &other.content.images),
                audios: concat(&self.content.audios, &other.content.audios),
                videos: concat(&self.content.videos, &other.content.videos),
                documents: concat(&self.content.documents, &other.content.documents),
            },
            ..self.clone()
        })
    }

    /// Build a bot-authored message from the owner back to this message's
    /// counterpart, in the same chat.
    pub fn reply(&self, content: MessageContent) -> Self {
        let me = if self.receiver.is_me {
            &self.receiver
        } else {
            &self.sender
        };
        Self {
            id: Uuid::new_v4(),
            chat_id: self.chat_id.clone(),
            sender: Participant {
                id: me.id.clone(),
                name: "Parley".to_string(),
                username: "parley".to_string(),
                is_me: true,
            },
            receiver: self.counterpart().clone(),
            timestamp: Utc::now(),
            content,
            meta: self.meta.clone(),
            status: MessageStatus::Pending,
            channel: self.channel,
            is_bot_message: true,
        }
    }
}
