//! Long-polling update loop and Connector trait implementation.

use super::types::{TgResponse, TgUpdateId, TgUser};
use super::TelegramConnector;
use async_trait::async_trait;
use parley_core::{
    error::ParleyError,
    message::{ChannelKind, Message},
    traits::{Connector, Presence, RawEvent},
};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const POLL_TIMEOUT_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 60;

impl TelegramConnector {
    /// Ask Telegram who we are.
    async fn get_me(&self) -> Result<TgUser, ParleyError> {
        let url = format!("{}/getMe", self.base_url);
        let resp: TgResponse<TgUser> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram getMe failed: {e}")))?
            .json()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram getMe parse failed: {e}")))?;

        if !resp.ok {
            return Err(ParleyError::Channel(format!(
                "telegram getMe rejected: {}",
                resp.description.unwrap_or_default()
            )));
        }
        resp.result
            .ok_or_else(|| ParleyError::Channel("telegram getMe returned no user".into()))
    }

    /// Random pause between the configured typing delay bounds.
    pub(super) fn typing_delay(&self) -> Duration {
        let min = self.config.typing_delay_min_ms;
        let max = self.config.typing_delay_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Poll `getUpdates` until `stop` fires or the receiver goes away.
async fn poll_updates(
    client: reqwest::Client,
    base_url: String,
    last_update_id: Arc<Mutex<Option<i64>>>,
    connected: Arc<AtomicBool>,
    tx: mpsc::Sender<RawEvent>,
    stop: CancellationToken,
) {
    let mut backoff_secs: u64 = 1;

    loop {
        let offset = last_update_id.lock().await.map(|id| id + 1);

        let mut url = format!("{base_url}/getUpdates?timeout={POLL_TIMEOUT_SECS}");
        if let Some(off) = offset {
            url.push_str(&format!("&offset={off}"));
        }

        let request = client
            .get(&url)
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 5))
            .send();

        let result = tokio::select! {
            _ = stop.cancelled() => break,
            r = request => r,
        };

        let failure = match result {
            Ok(resp) => match resp.json::<TgResponse<Vec<RawEvent>>>().await {
                Ok(body) if body.ok => {
                    backoff_secs = 1;
                    let updates = body.result.unwrap_or_default();
                    for update in updates {
                        let id = serde_json::from_value::<TgUpdateId>(update.clone())
                            .map(|u| u.update_id)
                            .ok();
                        if let Some(id) = id {
                            *last_update_id.lock().await = Some(id);
                        }
                        if tx.send(update).await.is_err() {
                            info!("[telegram] receiver dropped, stopping poll");
                            connected.store(false, Ordering::SeqCst);
                            return;
                        }
                    }
                    None
                }
                Ok(body) => Some(format!(
                    "API error: {}",
                    body.description.unwrap_or_default()
                )),
                Err(e) => Some(format!("parse error: {e}")),
            },
            Err(e) => Some(format!("poll error: {e}")),
        };

        if let Some(reason) = failure {
            error!("[telegram] {reason} (retry in {backoff_secs}s)");
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
            }
            backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
        }
    }

    connected.store(false, Ordering::SeqCst);
    info!("[telegram] polling stopped");
}

#[async_trait]
impl Connector for TelegramConnector {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn connect(&self) -> Result<mpsc::Receiver<RawEvent>, ParleyError> {
        if self.config.bot_token.is_empty() {
            return Err(ParleyError::Config("telegram bot_token is empty".into()));
        }

        let me = self.get_me().await?;
        info!(
            "[telegram] connected as @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        );
        *self.me.write().await = Some(me);

        let stop = CancellationToken::new();
        if let Some(previous) = self.poll_stop.lock().await.replace(stop.clone()) {
            previous.cancel();
        }

        let (tx, rx) = mpsc::channel(64);
        self.connected.store(true, Ordering::SeqCst);

        tokio::spawn(poll_updates(
            self.client.clone(),
            self.base_url.clone(),
            self.last_update_id.clone(),
            self.connected.clone(),
            tx,
            stop,
        ));

        Ok(rx)
    }

    async fn disconnect(&self) -> Result<(), ParleyError> {
        if let Some(stop) = self.poll_stop.lock().await.take() {
            stop.cancel();
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("[telegram] disconnected");
        Ok(())
    }

    async fn logout(&self) -> Result<(), ParleyError> {
        self.disconnect().await?;

        let url = format!("{}/logOut", self.base_url);
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram logOut failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Channel(format!(
                "telegram logOut failed ({status}): {body}"
            )));
        }

        *self.me.write().await = None;
        *self.last_update_id.lock().await = None;
        info!("[telegram] logged out");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: &Message) -> Result<(), ParleyError> {
        let chat_id = parse_chat_id(&message.chat_id)?;

        if message.content.images.is_empty() {
            return self.send_text(chat_id, &message.content.text).await;
        }

        // Caption goes with the first image only.
        for (i, image) in message.content.images.iter().enumerate() {
            let caption = if i == 0 { message.content.text.as_str() } else { "" };
            self.send_photo_bytes(chat_id, image, caption).await?;
        }
        Ok(())
    }

    async fn parse_raw(&self, raw: RawEvent) -> Result<Option<Message>, ParleyError> {
        self.parse_update(raw).await
    }

    async fn set_presence(&self, chat_id: &str, presence: Presence) -> Result<(), ParleyError> {
        match presence {
            Presence::Typing => {
                let chat_id = parse_chat_id(chat_id)?;
                tokio::time::sleep(self.typing_delay()).await;
                self.send_chat_action(chat_id, "typing").await
            }
            // Bots have no online state; the typing action lapses on its own.
            Presence::Online | Presence::Offline | Presence::Default => {
                debug!("[telegram] presence {presence:?} for {chat_id} is a no-op");
                Ok(())
            }
        }
    }
}

pub(super) fn parse_chat_id(chat_id: &str) -> Result<i64, ParleyError> {
    chat_id
        .parse()
        .map_err(|e| ParleyError::Channel(format!("invalid telegram chat_id '{chat_id}': {e}")))
}
