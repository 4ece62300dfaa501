//! Outbound Bot API calls: text, photos, chat actions and file downloads.

use super::types::{TgFile, TgResponse};
use super::TelegramConnector;
use crate::utils::split_message;
use parley_core::{error::ParleyError, message::Attachment};
use tracing::{debug, warn};

/// Telegram's per-message character limit.
const MAX_MESSAGE_LEN: usize = 4096;

impl TelegramConnector {
    /// Send a text message, chunked to Telegram's limit.
    pub(crate) async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ParleyError> {
        if text.is_empty() {
            warn!("[telegram] refusing to send an empty message to {chat_id}");
            return Ok(());
        }

        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let url = format!("{}/sendMessage", self.base_url);
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ParleyError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                return Err(ParleyError::Channel(format!(
                    "telegram send failed ({status}): {error_text}"
                )));
            }
        }

        Ok(())
    }

    /// Send an image with an optional caption.
    pub(crate) async fn send_photo_bytes(
        &self,
        chat_id: i64,
        image: &Attachment,
        caption: &str,
    ) -> Result<(), ParleyError> {
        let url = format!("{}/sendPhoto", self.base_url);

        let part = reqwest::multipart::Part::bytes(image.data.clone())
            .file_name(format!("photo.{}", image.extension()))
            .mime_str(&image.mime)
            .map_err(|e| ParleyError::Channel(format!("mime error: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);
        if !caption.is_empty() {
            form = form.text("caption", caption.to_string());
        }

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram sendPhoto failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Channel(format!(
                "telegram sendPhoto failed ({status}): {error_text}"
            )));
        }

        Ok(())
    }

    /// Send a chat action (e.g. "typing") to a chat.
    pub(crate) async fn send_chat_action(
        &self,
        chat_id: i64,
        action: &str,
    ) -> Result<(), ParleyError> {
        let url = format!("{}/sendChatAction", self.base_url);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": action,
        });

        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram sendChatAction failed: {e}")))?;

        debug!("[telegram] {action} -> {chat_id}");
        Ok(())
    }

    /// Download a file from Telegram servers by file_id.
    pub(crate) async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ParleyError> {
        let url = format!("{}/getFile?file_id={file_id}", self.base_url);
        let resp: TgResponse<TgFile> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram getFile failed: {e}")))?
            .json()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram getFile parse failed: {e}")))?;

        let file_path = resp
            .result
            .and_then(|f| f.file_path)
            .ok_or_else(|| ParleyError::Channel("telegram getFile returned no file_path".into()))?;

        let download_url = format!("{}/{file_path}", self.file_base_url);
        let bytes = self
            .client
            .get(&download_url)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram file download failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram file read failed: {e}")))?;

        Ok(bytes.to_vec())
    }
}
