//! Persona Hub - persona lifecycle service for chat assistants

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use persona_hub::{api, config::PersonaHubConfig, personas::PersonaStore};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "persona-hub")]
#[command(version)]
#[command(about = "Persona lifecycle service for chat assistants")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PERSONA_HUB_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Validate configuration and the persona state file
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let config = match &cli.config {
        Some(path) => PersonaHubConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PersonaHubConfig::default(),
    };

    match cli.command {
        Commands::Serve { host, port } => run_server(config, host, port).await?,
        Commands::Config { default } => show_config(if default { None } else { Some(&config) })?,
        Commands::Check => run_check(&config).await?,
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("persona_hub={},tower_http=debug", log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(
    mut config: PersonaHubConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let app = api::build_from_config(&config).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        "Persona Hub listening on {} (auth {})",
        addr,
        if config.auth.disabled { "disabled" } else { "enabled" }
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Persona Hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

async fn run_check(config: &PersonaHubConfig) -> Result<()> {
    config.validate()?;
    // read-only: no directory creation, no builtin seeding
    let personas = PersonaStore::inspect(&config.storage.dir)
        .await
        .with_context(|| format!("reading store in {}", config.storage.dir.display()))?;
    let deleted = personas.iter().filter(|p| p.is_deleted).count();
    println!("Configuration OK");
    println!(
        "Store {}: {} personas ({} deleted)",
        config.storage.dir.display(),
        personas.len(),
        deleted
    );
    Ok(())
}

fn show_config(config: Option<&PersonaHubConfig>) -> Result<()> {
    let mut config = config.cloned().unwrap_or_default();
    for user in &mut config.auth.users {
        user.token = "****".to_string();
    }
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
