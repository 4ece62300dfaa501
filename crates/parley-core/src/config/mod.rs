mod channels;
mod defaults;
mod providers;

#[cfg(test)]
mod tests;

pub use channels::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::ParleyError;
use defaults::*;

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parley: ParleyConfig,
    #[serde(default)]
    pub owner: OwnerConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub enhancers: EnhancersConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// The account owner routers act on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default = "default_owner_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            id: default_owner_id(),
            username: String::new(),
        }
    }
}

/// Timing and memory knobs for the message router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Pause between two message sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Pause between two diffusion sweeps.
    #[serde(default = "default_diffusion_interval_ms")]
    pub diffusion_interval_ms: u64,
    /// Messages older than this on arrival are ignored.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Auto-responses stay off this long after a manual reply.
    #[serde(default = "default_suppression_minutes")]
    pub suppression_minutes: u64,
    /// Approximate token ceiling per chat history.
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,
    /// Delay before diffusion notices are sent.
    #[serde(default = "default_notice_delay_ms")]
    pub notice_delay_ms: u64,
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            diffusion_interval_ms: default_diffusion_interval_ms(),
            stale_after_secs: default_stale_after_secs(),
            suppression_minutes: default_suppression_minutes(),
            max_history_tokens: default_max_history_tokens(),
            notice_delay_ms: default_notice_delay_ms(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

impl RouterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn diffusion_interval(&self) -> Duration {
        Duration::from_millis(self.diffusion_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn suppression(&self) -> Duration {
        Duration::from_secs(self.suppression_minutes * 60)
    }

    pub fn notice_delay(&self) -> Duration {
        Duration::from_millis(self.notice_delay_ms)
    }
}

/// Attachment and image generation backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancersConfig {
    #[serde(default)]
    pub enable_transcriptions: bool,
    #[serde(default)]
    pub enable_vision: bool,
    #[serde(default)]
    pub enable_image_generation: bool,
    #[serde(default)]
    pub transcription_url: Option<String>,
    #[serde(default)]
    pub vision_url: Option<String>,
    #[serde(default)]
    pub diffusion_url: Option<String>,
}

impl EnhancersConfig {
    /// Capability flags, where a capability also needs its endpoint.
    pub fn capabilities(&self) -> Capabilities {
        let has = |url: &Option<String>| url.as_deref().is_some_and(|u| !u.is_empty());
        Capabilities {
            transcriptions: self.enable_transcriptions && has(&self.transcription_url),
            vision: self.enable_vision && has(&self.vision_url),
            image_generation: self.enable_image_generation && has(&self.diffusion_url),
        }
    }
}

/// Which enhanced services are active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub transcriptions: bool,
    pub vision: bool,
    pub image_generation: bool,
}

/// Storage config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Fill empty secrets from the environment.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("PARLEY_OPENAI_API_KEY") {
        let openai = config.provider.openai.get_or_insert_with(OpenAiConfig::default);
        if openai.api_key.is_empty() {
            openai.api_key = key;
        }
    }
    if let Ok(token) = std::env::var("PARLEY_TELEGRAM_BOT_TOKEN") {
        if let Some(tg) = config.channel.telegram.as_mut() {
            if tg.bot_token.is_empty() {
                tg.bot_token = token;
            }
        }
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, ParleyError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ParleyError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let mut config = parse(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse(content: &str) -> Result<Config, ParleyError> {
    let config: Config = toml::from_str(content)
        .map_err(|e| ParleyError::Config(format!("failed to parse config: {}", e)))?;

    if config.router.jitter_min_ms > config.router.jitter_max_ms {
        return Err(ParleyError::Config(
            "router.jitter_min_ms must not exceed router.jitter_max_ms".into(),
        ));
    }

    Ok(config)
}
