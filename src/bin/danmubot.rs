//! danmubot: ライブ配信の弾幕にAIで返信し、読み上げるボット

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use danmubot::ai::build_client;
use danmubot::bot::{BotOverrides, LiveBot};
use danmubot::chat::ChatSession;
use danmubot::config::{
    resolve_page_config, AppConfig, ConfigManager, ConfigSource, HttpConfigSource, PageConfig,
    SqliteConfigSource,
};
use danmubot::danmu::parse_message;
use danmubot::database::{get_database_path, ChatConfigStore, ChatConfigUpdate, NewChatConfig};
use danmubot::reply::DisplayEvent;
use danmubot::tts::{SpeakRequest, SpeechOutcome, TtsBackendType, TtsDispatcher};
use danmubot::utils;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Livestream danmu bot: AI replies with typewriter display and voice.
#[derive(Parser)]
#[command(name = "danmubot", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the danmu feed and reply to comments.
    Run(RunArgs),

    /// Chat with the AI interactively.
    Chat {
        /// Page key sent with each request.
        #[arg(long, default_value = "chat")]
        page_key: String,
    },

    /// Speak a line of text once.
    Speak {
        text: String,

        /// TTS backend (browser, edge, third-party).
        #[arg(long, default_value = "browser")]
        tts: TtsBackendType,
    },

    /// Classify raw feed events, one JSON envelope per line.
    Parse {
        /// Input file (stdin when omitted).
        file: Option<PathBuf>,

        /// Print the classified event as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage per-page chat configurations.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct RunArgs {
    /// WebSocket feed URL.
    #[arg(long)]
    ws_url: Option<String>,

    /// Page configuration to load.
    #[arg(long)]
    page_key: Option<String>,

    /// TTS backend (browser, edge, third-party).
    #[arg(long)]
    tts: Option<TtsBackendType>,

    /// Display replies without speaking them.
    #[arg(long)]
    no_voice: bool,

    /// Do not call the AI (auto-reply rules still apply).
    #[arg(long)]
    no_ai: bool,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Insert the default pages when the store is empty and write the
    /// settings file if it does not exist yet.
    Init,

    /// List all page configurations.
    List,

    /// Show one configuration by id.
    Get { id: i64 },

    /// Show the active configuration of a page.
    ShowPage { page_key: String },

    /// Create a page configuration.
    Create {
        #[arg(long)]
        page_key: String,
        #[arg(long)]
        page_name: String,
        /// config_data as JSON.
        #[arg(long)]
        data: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        inactive: bool,
    },

    /// Update fields of a page configuration.
    Update {
        id: i64,
        #[arg(long)]
        page_key: Option<String>,
        #[arg(long)]
        page_name: Option<String>,
        /// config_data as JSON.
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a page configuration.
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config()?;
    if let Some(level) = &cli.log_level {
        config.log.log_level = level.clone();
    }

    let _guard = utils::init_logging(&config.log)?;

    match cli.command {
        Command::Run(args) => run_bot(config, args).await,
        Command::Chat { page_key } => run_chat(config, page_key).await,
        Command::Speak { text, tts } => speak_once(config, &text, tts).await,
        Command::Parse { file, json } => parse_events(file, json).await,
        Command::Config(command) => manage_configs(&manager, &config, command),
    }
}

fn open_store(config: &AppConfig) -> Result<ChatConfigStore> {
    let path = match &config.store.database_path {
        Some(path) => path.clone(),
        None => get_database_path()?,
    };
    ChatConfigStore::new(&path)
        .with_context(|| format!("Failed to open config store: {}", path.display()))
}

fn config_source(config: &AppConfig) -> Result<Box<dyn ConfigSource>> {
    Ok(match &config.store.config_url {
        Some(url) => Box::new(HttpConfigSource::new(url.clone())?),
        None => Box::new(SqliteConfigSource::new(open_store(config)?)),
    })
}

async fn load_page(config: &AppConfig, page_key: &str) -> PageConfig {
    match config_source(config) {
        Ok(source) => resolve_page_config(source.as_ref(), page_key).await,
        Err(e) => {
            tracing::warn!("❌ 設定ストアを開けません。既定値を使用: {:#}", e);
            PageConfig::default()
        }
    }
}

/// Ctrl+Cでシャットダウン信号を立てる
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 終了シグナルを受信しました");
            let _ = shutdown_tx.send(true);
        }
    });
    shutdown_rx
}

async fn run_bot(config: AppConfig, args: RunArgs) -> Result<()> {
    let page_key = args
        .page_key
        .clone()
        .unwrap_or_else(|| config.ai.page_key.clone());
    let page = load_page(&config, &page_key).await;

    let overrides = BotOverrides {
        ws_url: args.ws_url,
        tts: args.tts,
        no_voice: args.no_voice,
        no_ai: args.no_ai,
    };
    let bot = LiveBot::from_config(&config, &page, &page_key, &overrides)?;
    spawn_printers(&bot);

    println!("danmubot v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Listening on {} (page: {}). Press Ctrl+C to stop.\n",
        bot.feed().url(),
        page_key
    );

    bot.run(shutdown_on_ctrl_c()).await;
    Ok(())
}

/// イベントと返信をターミナルに表示する
fn spawn_printers(bot: &LiveBot) {
    let mut events = bot.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", event.summary_line()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("表示が{}件遅れました", n);
                }
                Err(_) => break,
            }
        }
    });

    let mut display = bot.sequencer().subscribe();
    tokio::spawn(async move {
        let mut shown = 0usize;
        loop {
            match display.recv().await {
                Ok(DisplayEvent::Started(reply)) => {
                    shown = 0;
                    print!("🤖 @{} ", reply.username);
                }
                Ok(DisplayEvent::Reveal { visible, .. }) => {
                    let tail: String = visible.chars().skip(shown).collect();
                    shown += tail.chars().count();
                    print!("{}", tail);
                }
                Ok(DisplayEvent::Finished { .. }) => println!(),
                Ok(DisplayEvent::Cleared) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
            let _ = std::io::stdout().flush();
        }
    });

    let mut status = bot.feed().status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            println!("[feed] {}", current);
        }
    });
}

async fn run_chat(mut config: AppConfig, page_key: String) -> Result<()> {
    let page = load_page(&config, &page_key).await;
    page.apply_ai(&mut config.ai);
    config.ai.page_key = page_key.clone();

    let client = build_client(&config.ai)?;
    let session = ChatSession::new(client).with_page_key(page_key);

    session
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}

async fn speak_once(config: AppConfig, text: &str, backend: TtsBackendType) -> Result<()> {
    let dispatcher = TtsDispatcher::new(&config.tts)?;
    if !dispatcher.is_available(backend) {
        anyhow::bail!("TTS backend {} is not available", backend);
    }

    match dispatcher.speak(text, &SpeakRequest::new(backend)).await {
        SpeechOutcome::Finished => {
            println!("✅ done");
            Ok(())
        }
        SpeechOutcome::Stopped => {
            println!("⏹️ stopped");
            Ok(())
        }
        SpeechOutcome::Failed(e) => Err(e.into()),
    }
}

async fn parse_events(file: Option<PathBuf>, json: bool) -> Result<()> {
    let reader: Box<dyn tokio::io::AsyncBufRead + Unpin> = match file {
        Some(path) => Box::new(BufReader::new(
            tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let (mut parsed, mut dropped) = (0usize, 0usize);
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_message(&line) {
            Ok(event) => {
                parsed += 1;
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    println!("{}", event.summary_line());
                }
            }
            Err(e) => {
                dropped += 1;
                eprintln!("skip: {}", e);
            }
        }
    }

    eprintln!("{} parsed, {} dropped", parsed, dropped);
    Ok(())
}

fn parse_json(data: &str) -> Result<serde_json::Value> {
    serde_json::from_str(data).context("config data must be valid JSON")
}

fn manage_configs(
    manager: &ConfigManager,
    config: &AppConfig,
    command: ConfigCommand,
) -> Result<()> {
    let mut store = open_store(config)?;

    match command {
        ConfigCommand::Init => {
            if store.seed_defaults()? {
                println!("Default configurations inserted.");
            } else {
                println!("Configurations already exist; nothing inserted.");
            }
            if !manager.path().exists() {
                manager.save_config(config)?;
                println!("Settings written to {}.", manager.path().display());
            }
        }
        ConfigCommand::List => {
            let configs = store.list()?;
            if configs.is_empty() {
                println!("No configurations. Run `danmubot config init` to add the defaults.");
            }
            for row in configs {
                println!(
                    "{:>4}  {:<20} {:<24} {:<8} {}",
                    row.id,
                    row.page_key,
                    row.page_name,
                    if row.is_active { "active" } else { "inactive" },
                    row.updated_at
                );
            }
        }
        ConfigCommand::Get { id } => match store.get(id)? {
            Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
            None => anyhow::bail!("configuration {} not found", id),
        },
        ConfigCommand::ShowPage { page_key } => match store.get_active_by_page_key(&page_key)? {
            Some(row) => {
                let page = PageConfig::from_value(&row.config_data)?;
                println!("{}", serde_json::to_string_pretty(&page)?);
            }
            None => anyhow::bail!("no active configuration for page '{}'", page_key),
        },
        ConfigCommand::Create {
            page_key,
            page_name,
            data,
            description,
            inactive,
        } => {
            let mut new_config = NewChatConfig::new(page_key, page_name, parse_json(&data)?);
            new_config.description = description;
            new_config.is_active = !inactive;
            let id = store.create(new_config)?;
            println!("Created configuration {}.", id);
        }
        ConfigCommand::Update {
            id,
            page_key,
            page_name,
            data,
            description,
            active,
        } => {
            let update = ChatConfigUpdate {
                page_key,
                page_name,
                config_data: data.as_deref().map(parse_json).transpose()?,
                is_active: active,
                description,
            };
            store.update(id, update)?;
            println!("Updated configuration {}.", id);
        }
        ConfigCommand::Delete { id } => {
            store.delete(id)?;
            println!("Deleted configuration {}.", id);
        }
    }

    Ok(())
}
