//! Telegram Bot API connector.
//!
//! Uses long polling via `getUpdates`; each update is forwarded untouched as a
//! raw event and decoded again in `parse_raw`.
//! Docs: <https://core.telegram.org/bots/api>

mod parse;
mod polling;
mod send;
pub(crate) mod types;

#[cfg(test)]
mod tests;

use parley_core::config::TelegramConfig;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use types::TgUser;

const API_ROOT: &str = "https://api.telegram.org";

/// Telegram connector using the Bot API with long polling.
pub struct TelegramConnector {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
    file_base_url: String,
    /// Tracks the last update_id to avoid reprocessing.
    last_update_id: Arc<Mutex<Option<i64>>>,
    /// The bot account, learned through `getMe` on connect.
    me: RwLock<Option<TgUser>>,
    connected: Arc<AtomicBool>,
    /// Stops the polling task.
    poll_stop: Mutex<Option<CancellationToken>>,
}

impl TelegramConnector {
    /// Create a new Telegram connector from config.
    pub fn new(config: TelegramConfig) -> Self {
        Self::with_api_root(config, API_ROOT)
    }

    /// Create a connector talking to a custom Bot API server.
    pub fn with_api_root(config: TelegramConfig, api_root: &str) -> Self {
        let root = api_root.trim_end_matches('/');
        let base_url = format!("{root}/bot{}", config.bot_token);
        let file_base_url = format!("{root}/file/bot{}", config.bot_token);
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
            file_base_url,
            last_update_id: Arc::new(Mutex::new(None)),
            me: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            poll_stop: Mutex::new(None),
        }
    }
}
