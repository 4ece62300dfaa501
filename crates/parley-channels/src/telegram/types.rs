//! Telegram Bot API deserialization types.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// Only the envelope is decoded while polling; the full update travels as
/// raw JSON to the router.
#[derive(Debug, Deserialize)]
pub(crate) struct TgUpdateId {
    pub update_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUpdate {
    #[allow(dead_code)]
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgMessage {
    #[allow(dead_code)]
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: TgChat,
    /// Unix seconds.
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub voice: Option<TgVoice>,
    pub audio: Option<TgVoice>,
    pub photo: Option<Vec<TgPhotoSize>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgVoice {
    pub file_id: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgFile {
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgPhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TgUser {
    pub id: i64,
    #[serde(default)]
    #[allow(dead_code)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TgUser {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgChat {
    pub id: i64,
    /// "private", "group", "supergroup" or "channel".
    #[serde(default, rename = "type")]
    pub chat_type: String,
}
