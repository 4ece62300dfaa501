//! Message router, one per (owner, channel).
//!
//! Inbound events are parsed by the connector, filtered and queued per chat.
//! A sweep loop folds each chat's queue into batches and answers them; a
//! second loop drains this channel's image generation requests from the
//! shared [`DiffusionQueue`].

mod commands;
mod pipeline;
mod state;


use crate::commands::CommandDispatcher;
use crate::diffusion::DiffusionQueue;
use crate::generator::ResponseGenerator;
use parley_core::{
    config::{Capabilities, RouterConfig},
    context::HistoryEntry,
    error::ParleyError,
    message::{ChannelKind, Message, MessageContent},
    traits::{
        AvatarProvider, Connector, Directory, ImageGenerator, LlmBackend, Presence, RawEvent,
        Transcriber, Visor,
    },
};
use state::ChatState;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Collaborators a router drives.
pub struct RouterDeps {
    pub connector: Arc<dyn Connector>,
    pub directory: Arc<dyn Directory>,
    pub llm: Arc<dyn LlmBackend>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub visor: Option<Arc<dyn Visor>>,
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
    pub avatars: Arc<dyn AvatarProvider>,
    /// Shared by every router in the process.
    pub diffusion: Arc<DiffusionQueue>,
}

/// Routes one owner's chats on one channel.
pub struct Router {
    pub(super) owner_id: String,
    pub(super) channel: ChannelKind,
    pub(super) config: RouterConfig,
    pub(super) connector: Arc<dyn Connector>,
    pub(super) directory: Arc<dyn Directory>,
    pub(super) image_generator: Option<Arc<dyn ImageGenerator>>,
    pub(super) avatars: Arc<dyn AvatarProvider>,
    pub(super) diffusion: Arc<DiffusionQueue>,
    pub(super) commands: CommandDispatcher,
    pub(super) generator: ResponseGenerator,
    /// Per-chat state in insertion order.
    pub(super) chats: Mutex<Vec<ChatState>>,
    pub(super) sweep_lock: Mutex<()>,
    pub(super) sweeping: AtomicBool,
    pub(super) diffusion_lock: Mutex<()>,
    pub(super) diffusing: AtomicBool,
    shutdown: Mutex<Option<CancellationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Router {
    pub fn new(
        owner_id: impl Into<String>,
        config: &RouterConfig,
        capabilities: Capabilities,
        deps: RouterDeps,
    ) -> Self {
        let owner_id = owner_id.into();
        let channel = deps.connector.channel();
        let commands = CommandDispatcher::new(capabilities.image_generation);
        let generator = ResponseGenerator::new(
            owner_id.clone(),
            channel,
            capabilities,
            deps.directory.clone(),
            deps.llm,
            deps.transcriber,
            deps.visor,
            commands,
        );

        Self {
            owner_id,
            channel,
            config: config.clone(),
            connector: deps.connector,
            directory: deps.directory,
            image_generator: deps.image_generator,
            avatars: deps.avatars,
            diffusion: deps.diffusion,
            commands,
            generator,
            chats: Mutex::new(Vec::new()),
            sweep_lock: Mutex::new(()),
            sweeping: AtomicBool::new(false),
            diffusion_lock: Mutex::new(()),
            diffusing: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Connect and spawn the receive, sweep and diffusion loops.
    pub async fn start(self: &Arc<Self>) -> Result<(), ParleyError> {
        let rx = self.connector.connect().await?;
        let shutdown = CancellationToken::new();
        if let Some(previous) = self.shutdown.lock().await.replace(shutdown.clone()) {
            previous.cancel();
        }

        let handles = vec![
            tokio::spawn(self.clone().receive_loop(rx, shutdown.clone())),
            tokio::spawn(self.clone().sweep_loop(shutdown.clone())),
            tokio::spawn(self.clone().diffusion_loop(shutdown)),
        ];
        self.tasks.lock().await.extend(handles);

        info!("[{}] router started for owner {}", self.channel, self.owner_id);
        Ok(())
    }

    /// Stop the loops, abandon in-flight work and disconnect.
    pub async fn stop(&self) {
        if let Some(shutdown) = self.shutdown.lock().await.take() {
            shutdown.cancel();
        }

        {
            let mut chats = self.chats.lock().await;
            for chat in chats.iter() {
                if let Some(cancel) = &chat.cancel {
                    cancel.cancel();
                }
            }
            chats.clear();
        }

        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }

        if let Err(e) = self.connector.disconnect().await {
            warn!("[{}] disconnect failed: {e}", self.channel);
        }
        info!("[{}] router stopped", self.channel);
    }

    /// Handle one raw event from the connector.
    pub async fn on_receive(self: &Arc<Self>, raw: RawEvent) -> Result<(), ParleyError> {
        let Some(mut message) = self.connector.parse_raw(raw).await? else {
            return Ok(());
        };
        debug!("[{}] new message in {}", self.channel, message.chat_id);

        if message.is_manual_reply() {
            let echo = self
                .with_chat(&message.chat_id, |chat| {
                    chat.history.has_assistant_turn(&message.content.text)
                })
                .await;
            if echo {
                message.is_bot_message = true;
            } else {
                self.suppress(&message.chat_id).await;
            }
        }

        if message.is_bot_message {
            debug!("[{}] skipping bot message in {}", self.channel, message.chat_id);
            return Ok(());
        }

        let age = chrono::Utc::now()
            .signed_duration_since(message.timestamp)
            .to_std()
            .unwrap_or_default();
        if age > self.config.stale_after() {
            info!("[{}] skipping stale message in {}", self.channel, message.chat_id);
            return Ok(());
        }

        if let Some(command) = self.commands.parse(&message.content.text) {
            let router = self.clone();
            tokio::spawn(async move { router.run_command(command, message).await });
            return Ok(());
        }

        let chat_id = message.chat_id.clone();
        self.with_chat(&chat_id, |chat| {
            chat.pending.push(message);
            if let Some(cancel) = &chat.cancel {
                cancel.cancel();
            }
        })
        .await;
        Ok(())
    }

    /// Snapshot of a chat's history.
    pub async fn history(&self, chat_id: &str) -> Vec<HistoryEntry> {
        self.peek_chat(chat_id, |chat| chat.history.snapshot())
            .await
            .unwrap_or_default()
    }

    /// Messages waiting in a chat's queue.
    pub async fn pending_len(&self, chat_id: &str) -> usize {
        self.peek_chat(chat_id, |chat| chat.pending.len())
            .await
            .unwrap_or_default()
    }

    /// Whether auto-responses are currently off for a chat.
    pub async fn is_suppressed(&self, chat_id: &str) -> bool {
        let now = Instant::now();
        self.peek_chat(chat_id, |chat| chat.is_suppressed(now))
            .await
            .unwrap_or_default()
    }

    /// Read a chat's state without creating it.
    async fn peek_chat<R>(&self, chat_id: &str, f: impl FnOnce(&ChatState) -> R) -> Option<R> {
        let chats = self.chats.lock().await;
        chats.iter().find(|c| c.chat_id == chat_id).map(f)
    }

    /// Run `f` on a chat's state, creating it on first use.
    pub(super) async fn with_chat<R>(
        &self,
        chat_id: &str,
        f: impl FnOnce(&mut ChatState) -> R,
    ) -> R {
        let mut chats = self.chats.lock().await;
        let idx = match chats.iter().position(|c| c.chat_id == chat_id) {
            Some(idx) => idx,
            None => {
                chats.push(ChatState::new(chat_id, self.config.max_history_tokens));
                chats.len() - 1
            }
        };
        f(&mut chats[idx])
    }

    async fn suppress(&self, chat_id: &str) {
        let until = Instant::now() + self.config.suppression();
        self.with_chat(chat_id, |chat| chat.suppressed_until = Some(until))
            .await;
        info!("[{}] auto-responses paused for {chat_id}", self.channel);
    }

    /// Send a reply to `origin` without touching history.
    pub(super) async fn send_reply(&self, origin: &Message, content: MessageContent) {
        let reply = origin.reply(content);
        if let Err(e) = self.connector.send_message(&reply).await {
            error!("[{}] send to {} failed: {e}", self.channel, origin.chat_id);
        }
    }

    /// Record an assistant turn, then send it.
    pub(super) async fn send_recorded(&self, origin: &Message, content: MessageContent) {
        let text = content.text.clone();
        self.with_chat(&origin.chat_id, |chat| chat.history.push_assistant(text))
            .await;
        self.send_reply(origin, content).await;
    }

    pub(super) async fn presence(&self, chat_id: &str, presence: Presence) {
        if let Err(e) = self.connector.set_presence(chat_id, presence).await {
            warn!("[{}] presence {presence:?} for {chat_id} failed: {e}", self.channel);
        }
    }

    async fn receive_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<RawEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                raw = rx.recv() => match raw {
                    Some(raw) => {
                        if let Err(e) = self.on_receive(raw).await {
                            error!("[{}] failed to handle event: {e}", self.channel);
                        }
                    }
                    None => {
                        info!("[{}] event stream closed", self.channel);
                        break;
                    }
                },
            }
        }
    }

    async fn sweep_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            if !self.connector.is_connected().await {
                info!("[{}] connector offline, sweep loop stopped", self.channel);
                break;
            }
            self.sweep().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.sweep_interval()) => {}
            }
        }
    }

    async fn diffusion_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            if !self.connector.is_connected().await {
                info!("[{}] connector offline, diffusion loop stopped", self.channel);
                break;
            }
            self.process_diffusions().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.diffusion_interval()) => {}
            }
        }
    }
}
