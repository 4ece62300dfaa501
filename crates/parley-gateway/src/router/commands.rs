//! Command execution and the diffusion sweep.

use super::state::Latch;
use super::Router;
use crate::commands::{parse_diffusion_args, Command};
use parley_core::{
    error::ParleyError,
    message::{Attachment, AttachmentKind, Message, MessageContent},
    model::{DiffusionOutput, DiffusionParams},
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const RESET_DONE: &str = "Done, I have forgotten everything we talked about so far. \
                          Your next message will be treated as the first one.";
const PLEASE_WAIT: &str = "I'm generating other images right now. Your request has been \
                           queued, don't worry, you will get your image once it is processed.";
const IN_PROGRESS: &str = "Your request is under way, I'll send you the generated image shortly...";
const DIFFUSION_FAILED: &str = "Sorry, I couldn't generate the image. Please try again later.";

impl Router {
    /// Execute a command on its own task.
    pub(super) async fn run_command(self: Arc<Self>, command: Command, message: Message) {
        match self.allowed(&message).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    "[{}] {} is not allowed, ignoring command",
                    self.channel,
                    message.counterpart().id
                );
                return;
            }
            Err(e) => {
                error!("[{}] access check failed: {e}", self.channel);
                return;
            }
        }

        match command {
            Command::Reset => self.reset(&message).await,
            Command::Diffuse { .. } => self.request_diffusion(message).await,
        }
    }

    async fn reset(&self, message: &Message) {
        self.with_chat(&message.chat_id, |chat| chat.history.clear())
            .await;
        info!("[{}] history cleared for {}", self.channel, message.chat_id);
        self.send_reply(message, MessageContent::text(RESET_DONE))
            .await;
    }

    /// Acknowledge a generation request and queue it.
    async fn request_diffusion(&self, message: Message) {
        info!("[{}] diffusion requested in {}", self.channel, message.chat_id);
        let delay = self.config.notice_delay();

        if self.diffusion.is_busy() {
            tokio::time::sleep(delay).await;
            self.send_recorded(&message, MessageContent::text(PLEASE_WAIT))
                .await;
            self.diffusion.wait_idle().await;
        }

        tokio::time::sleep(delay).await;
        self.send_recorded(&message, MessageContent::text(IN_PROGRESS))
            .await;

        self.diffusion.enqueue(message);
        debug!("[{}] diffusion request queued", self.channel);
    }

    /// Handle this channel's queued generation requests, oldest first.
    ///
    /// A call made while another one runs returns immediately.
    pub async fn process_diffusions(&self) {
        let Some(_latch) = Latch::acquire(&self.diffusing) else {
            debug!("[{}] diffusion sweep already running, skipping", self.channel);
            return;
        };
        let _guard = self.diffusion_lock.lock().await;

        for job in self.diffusion.pending_for(self.channel) {
            self.diffuse(&job).await;
            self.diffusion.remove(job.id);
        }
    }

    async fn diffuse(&self, job: &Message) {
        if self.diffusion.is_busy() {
            debug!("[{}] diffusion in progress, waiting", self.channel);
            self.diffusion.wait_idle().await;
            tokio::time::sleep(self.jitter()).await;
        }

        info!("[{}] starting diffusion for {}", self.channel, job.chat_id);
        match self.generate(job).await {
            Ok(output) => {
                let content = MessageContent {
                    text: format!(
                        "Here is your image.\n\nPrompt used:\n{}\n\nSeed:\n{}",
                        output.prompt, output.seed
                    ),
                    images: vec![Attachment::new(
                        AttachmentKind::Image,
                        output.image,
                        "image/png",
                    )],
                    ..Default::default()
                };
                self.send_recorded(job, content).await;
            }
            Err(e) => {
                error!("[{}] diffusion failed for {}: {e}", self.channel, job.chat_id);
                self.send_recorded(job, MessageContent::text(DIFFUSION_FAILED))
                    .await;
            }
        }
    }

    async fn generate(&self, job: &Message) -> Result<DiffusionOutput, ParleyError> {
        let generator = self
            .image_generator
            .as_ref()
            .ok_or_else(|| ParleyError::Config("image generation is not configured".into()))?;
        let model = self.generator.model_config().await?;
        let args = parse_diffusion_args(&job.content.text);
        let params = DiffusionParams {
            prompt: args.prompt,
            use_raw_prompt: args.raw,
            seed: args.seed,
        };

        let _slot = self.diffusion.occupy().await;
        generator.generate(&model.model, &params).await
    }

    fn jitter(&self) -> Duration {
        let min = self.config.jitter_min_ms;
        let max = self.config.jitter_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
