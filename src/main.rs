use clap::{Parser, Subcommand};
use parley_channels::TelegramConnector;
use parley_core::{
    config::{self, shellexpand, Config},
    context::{ChatRequest, HistoryEntry, SamplingParams},
    message::ChannelKind,
    model::{Bot, ModelConfig},
    traits::{Connector, ImageGenerator, LlmBackend, Transcriber, Visor},
};
use parley_gateway::{DiffusionQueue, Router, RouterDeps};
use parley_memory::Store;
use parley_providers::{
    DiceBearAvatars, HttpImageGenerator, HttpTranscriber, HttpVisor, OllamaBackend,
    OpenAiBackend, ProviderSelector,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "parley", version, about = "Parley: lets an LLM answer your chats")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the enabled channels and answer chats until ctrl-c.
    Start,
    /// Show the configuration and check backend availability.
    Status,
    /// Send a one-shot message through the owner's model.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Store the owner's bot row and model config.
    Seed {
        /// Model used for answers and prompt rewrites.
        #[arg(long, default_value = "llama3.1")]
        model: String,
        /// Channel the bot row is written for.
        #[arg(long, default_value = "telegram")]
        channel: String,
        /// Only these contact ids get answers.
        #[arg(long, value_delimiter = ',')]
        whitelist: Vec<String>,
        /// These contact ids never get answers.
        #[arg(long, value_delimiter = ',')]
        blacklist: Vec<String>,
        #[arg(long)]
        temperature: Option<f32>,
        /// Offer the built-in tools to local models.
        #[arg(long)]
        tools: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg);

    match cli.command {
        Commands::Start => start(cfg).await?,
        Commands::Status => status(&cli.config, &cfg).await,
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: parley ask <message>");
            }
            ask(&cfg, &message.join(" ")).await?;
        }
        Commands::Seed {
            model,
            channel,
            whitelist,
            blacklist,
            temperature,
            tools,
        } => {
            let channel = ChannelKind::parse(&channel)
                .ok_or_else(|| anyhow::anyhow!("unknown channel: {channel}"))?;
            let store = Store::new(&cfg.memory).await?;
            let owner_id = cfg.owner.id.clone();

            store
                .upsert_bot(&Bot {
                    id: uuid::Uuid::new_v4().to_string(),
                    owner_id: owner_id.clone(),
                    channel,
                    enabled: true,
                    whitelist,
                    blacklist,
                })
                .await?;
            store
                .save_model_config(&ModelConfig {
                    id: uuid::Uuid::new_v4().to_string(),
                    owner_id: owner_id.clone(),
                    model: model.clone(),
                    params: SamplingParams {
                        temperature,
                        enable_tools: tools,
                        ..Default::default()
                    },
                })
                .await?;
            println!("Seeded {channel} bot and model {model} for owner {owner_id}.");
        }
    }

    Ok(())
}

/// Console output plus a daily log file under `{data_dir}/logs`.
fn init_logging(cfg: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.parley.log_level));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    let log_dir = PathBuf::from(shellexpand(&cfg.parley.data_dir)).join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        warn!("log directory {} unavailable: {e}", log_dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "parley.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false),
        )
        .init();
    Some(guard)
}

/// Hosted and local backends behind the model-name selector.
fn build_llm(cfg: &Config) -> Arc<ProviderSelector> {
    let hosted = cfg
        .provider
        .openai
        .as_ref()
        .filter(|o| !o.api_key.is_empty())
        .map(|o| Arc::new(OpenAiBackend::from_config(o)) as Arc<dyn LlmBackend>);
    let ollama = cfg.provider.ollama.clone().unwrap_or_default();
    let local = Arc::new(OllamaBackend::from_config(&ollama)) as Arc<dyn LlmBackend>;

    Arc::new(ProviderSelector::new(
        cfg.provider.hosted_models.clone(),
        hosted,
        Some(local),
    ))
}

fn build_connectors(cfg: &Config) -> anyhow::Result<Vec<Arc<dyn Connector>>> {
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();

    if let Some(ref tg) = cfg.channel.telegram {
        if tg.enabled {
            if tg.bot_token.is_empty() {
                anyhow::bail!(
                    "Telegram is enabled but bot_token is empty. \
                     Set it in config.toml or PARLEY_TELEGRAM_BOT_TOKEN."
                );
            }
            connectors.push(Arc::new(TelegramConnector::new(tg.clone())));
        }
    }

    if connectors.is_empty() {
        anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
    }
    Ok(connectors)
}

async fn start(cfg: Config) -> anyhow::Result<()> {
    let store = Store::new(&cfg.memory).await?;
    let llm = build_llm(&cfg);
    let capabilities = cfg.enhancers.capabilities();
    let enhancers = &cfg.enhancers;

    let transcriber = enhancers
        .transcription_url
        .as_ref()
        .filter(|_| capabilities.transcriptions)
        .map(|url| Arc::new(HttpTranscriber::new(url.as_str())) as Arc<dyn Transcriber>);
    let visor = enhancers
        .vision_url
        .as_ref()
        .filter(|_| capabilities.vision)
        .map(|url| Arc::new(HttpVisor::new(url.as_str())) as Arc<dyn Visor>);
    let image_generator = enhancers
        .diffusion_url
        .as_ref()
        .filter(|_| capabilities.image_generation)
        .map(|url| {
            Arc::new(HttpImageGenerator::new(url.as_str(), llm.clone())) as Arc<dyn ImageGenerator>
        });

    let diffusion = Arc::new(DiffusionQueue::new());
    let mut routers = Vec::new();

    for connector in build_connectors(&cfg)? {
        let channel = connector.channel();
        if let Some(bot) = store.get_bot(&cfg.owner.id, channel).await? {
            if !bot.enabled {
                info!("[{channel}] bot disabled for owner {}, skipping", cfg.owner.id);
                continue;
            }
        }

        let router = Arc::new(Router::new(
            cfg.owner.id.clone(),
            &cfg.router,
            capabilities,
            RouterDeps {
                connector,
                directory: Arc::new(store.clone()),
                llm: llm.clone(),
                transcriber: transcriber.clone(),
                visor: visor.clone(),
                image_generator: image_generator.clone(),
                avatars: Arc::new(DiceBearAvatars),
                diffusion: diffusion.clone(),
            },
        ));
        router
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start {channel} router: {e}"))?;
        routers.push(router);
    }

    if routers.is_empty() {
        anyhow::bail!("every configured channel has its bot disabled");
    }

    println!("Parley: answering chats as {}. Press ctrl-c to stop.", cfg.owner.id);
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    for router in &routers {
        router.stop().await;
    }
    Ok(())
}

async fn status(config_path: &str, cfg: &Config) {
    println!("Parley: Status Check\n");
    println!("Config: {config_path}");
    println!("Owner: {}", cfg.owner.id);
    println!("Database: {}", shellexpand(&cfg.memory.db_path));
    println!("Hosted models: {}", cfg.provider.hosted_models.join(", "));
    println!();

    let ollama = cfg.provider.ollama.clone().unwrap_or_default();
    let local = OllamaBackend::from_config(&ollama);
    println!(
        "  ollama ({}): {}",
        ollama.base_url,
        if local.is_available().await {
            "available"
        } else {
            "unreachable"
        }
    );
    match cfg.provider.openai {
        Some(ref openai) if !openai.api_key.is_empty() => {
            println!("  openai ({}): configured", openai.base_url)
        }
        Some(_) => println!("  openai: missing api_key"),
        None => println!("  openai: not configured"),
    }

    let caps = cfg.enhancers.capabilities();
    let on_off = |on: bool| if on { "enabled" } else { "disabled" };
    println!("  transcriptions: {}", on_off(caps.transcriptions));
    println!("  vision: {}", on_off(caps.vision));
    println!("  image generation: {}", on_off(caps.image_generation));

    match cfg.channel.telegram {
        Some(ref tg) => println!(
            "  telegram: {}",
            if tg.enabled && !tg.bot_token.is_empty() {
                "configured"
            } else if tg.enabled {
                "enabled but missing bot_token"
            } else {
                "disabled"
            }
        ),
        None => println!("  telegram: not configured"),
    }
}

async fn ask(cfg: &Config, prompt: &str) -> anyhow::Result<()> {
    let store = Store::new(&cfg.memory).await?;
    let model = store.get_model_config(&cfg.owner.id).await?.ok_or_else(|| {
        anyhow::anyhow!(
            "owner {} has no model config. Run `parley seed` first.",
            cfg.owner.id
        )
    })?;

    let request = ChatRequest {
        history: vec![HistoryEntry::user(prompt)],
        contexts: vec![format!("You are {}, a helpful assistant.", cfg.parley.name)],
        model: model.model,
        params: model.params,
    };
    let answer = build_llm(cfg)
        .chat(&request, &CancellationToken::new())
        .await?;
    println!("{answer}");
    Ok(())
}
