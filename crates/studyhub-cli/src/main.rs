use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studyhub_core::providers::{GeminiProvider, OpenAiCompatProvider};
use studyhub_core::{ModelRouter, StudyAssistant, UploadedFile};
use studyhub_gateway::GatewayServer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::StudyhubConfig;

#[derive(Parser)]
#[command(name = "studyhub")]
#[command(version)]
#[command(about = "studyhub - study assistant backend with Gemini and Groq failover")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway until Ctrl+C
    Serve,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration (secrets masked)
    Config,

    /// Ask the doubt solver a question
    Ask {
        /// The question to answer
        question: String,

        /// Optional background material for the question
        #[arg(long)]
        context: Option<String>,
    },

    /// Extract essentials from a local file and print them as JSON
    Extract {
        /// Image, PDF or MP4 file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Serve => cmd_serve(&cli.config).await,
        Commands::Ask { question, context } => {
            cmd_ask(&cli.config, &question, context.as_deref()).await
        }
        Commands::Extract { path } => cmd_extract(&cli.config, &path).await,
    }
}

/// Wire providers, router and services from config
fn build_assistant(cfg: &StudyhubConfig) -> StudyAssistant {
    let timeout = cfg.providers.timeout();

    let gemini = GeminiProvider::new(cfg.providers.gemini.to_provider_config(timeout));
    if !gemini.initialize() {
        warn!("GEMINI_API_KEY not configured, Groq will serve all text requests");
    }

    let groq_config = cfg.providers.groq.to_provider_config(timeout);
    if groq_config.api_key.is_empty() {
        warn!("GROQ_API_KEY not configured, requests fail when Gemini does");
    } else {
        info!("Groq fallback configured (model: {})", groq_config.model);
    }
    let groq = OpenAiCompatProvider::new(groq_config);

    let router = ModelRouter::new(Box::new(gemini), Box::new(groq));
    StudyAssistant::new(Arc::new(router))
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        tokio::fs::write(&config_path, config::DEFAULT_CONFIG).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("studyhub initialized at {}", config_dir.display());
    println!(
        "Set GEMINI_API_KEY and GROQ_API_KEY, or edit {} to configure providers.",
        config_path.display()
    );
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = StudyhubConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

async fn cmd_serve(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = StudyhubConfig::load(config_path)?;
    let addr = cfg.server.socket_addr()?;
    info!("Starting studyhub gateway...");

    let assistant = Arc::new(build_assistant(&cfg));
    let server = GatewayServer::new(addr, assistant);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    let mut server_task = tokio::spawn(async move { server.run(shutdown.cancelled_owned()).await });

    tokio::select! {
        result = &mut server_task => {
            // Server exited on its own, e.g. the address was taken
            return result.context("Gateway task failed")?;
        }
        result = signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
        }
    }

    server_task.await.context("Gateway task failed")??;
    println!("studyhub stopped.");
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, question: &str, context: Option<&str>) -> Result<()> {
    let cfg = StudyhubConfig::load(config_path)?;
    let assistant = build_assistant(&cfg);

    let answer = assistant.solve_doubt(question, context).await?;
    println!("{}", answer);
    Ok(())
}

async fn cmd_extract(config_path: &Option<PathBuf>, path: &Path) -> Result<()> {
    let cfg = StudyhubConfig::load(config_path)?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file = UploadedFile::from_path_bytes(path, bytes);
    file.validate()
        .with_context(|| format!("Cannot extract essentials from {}", path.display()))?;

    let assistant = build_assistant(&cfg);
    let report = assistant.extract_essentials(&file).await?;
    println!("{}", serde_json::to_string_pretty(&report.essentials)?);
    Ok(())
}
