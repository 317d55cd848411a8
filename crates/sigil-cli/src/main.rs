//! Sigil binary: configuration, wiring, and supervised shutdown.

mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use sigil_engine::ConversationEngine;
use sigil_provider::{HttpProviderConfig, HttpProviderConnector};
use sigil_store::{AdminDirectory, ArtifactLog};

use crate::transport::{run_long_poll_loop, BotApiSink, BotTransportConfig};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "sigil",
    about = "Admin-gated session artifact generator with backup relay",
    version
)]
/// Process configuration, supplied at startup and immutable thereafter.
struct Cli {
    #[arg(
        long,
        env = "SIGIL_BOT_TOKEN",
        help = "Bot transport credential used for inbound polling and outbound sends"
    )]
    bot_token: String,

    #[arg(
        long,
        env = "SIGIL_BOT_API_BASE",
        default_value = "https://api.telegram.org",
        help = "Base URL of the bot transport API"
    )]
    bot_api_base: String,

    #[arg(
        long,
        env = "SIGIL_PROVIDER_API_BASE",
        help = "Base URL of the account-authentication provider gate"
    )]
    provider_api_base: String,

    #[arg(
        long,
        env = "SIGIL_PROVIDER_API_ID",
        help = "Provider API identity id paired with the API hash"
    )]
    provider_api_id: i64,

    #[arg(
        long,
        env = "SIGIL_PROVIDER_API_HASH",
        help = "Provider API identity hash paired with the API id"
    )]
    provider_api_hash: String,

    #[arg(
        long,
        env = "SIGIL_ROOT_PRINCIPAL",
        help = "Fixed privileged principal id: manages admins and receives every artifact backup"
    )]
    root_principal: i64,

    #[arg(
        long,
        env = "SIGIL_DATABASE",
        default_value = "sigil.db",
        help = "SQLite database path for the admin directory and artifact log"
    )]
    database: PathBuf,

    #[arg(
        long,
        env = "SIGIL_POLL_INTERVAL_MS",
        default_value = "2000",
        value_parser = parse_positive_u64,
        help = "Backoff between transport polls after an ingress failure"
    )]
    poll_interval_ms: u64,

    #[arg(
        long,
        env = "SIGIL_HTTP_TIMEOUT_MS",
        default_value = "30000",
        value_parser = parse_positive_u64,
        help = "HTTP timeout for provider and transport calls"
    )]
    http_timeout_ms: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let admins = AdminDirectory::open(&cli.database, cli.root_principal)
        .context("failed to open admin directory")?;
    let artifacts = ArtifactLog::open(&cli.database).context("failed to open artifact log")?;

    let connector = HttpProviderConnector::new(HttpProviderConfig {
        api_base: cli.provider_api_base.clone(),
        api_id: cli.provider_api_id,
        api_hash: cli.provider_api_hash.clone(),
        http_timeout_ms: cli.http_timeout_ms,
    })
    .context("failed to build provider connector")?;

    let transport_config = BotTransportConfig {
        api_base: cli.bot_api_base.clone(),
        bot_token: cli.bot_token.clone(),
        poll_interval_ms: cli.poll_interval_ms,
        http_timeout_ms: cli.http_timeout_ms,
    };
    let sink =
        Arc::new(BotApiSink::new(transport_config.clone()).context("failed to build outbound sink")?);
    let engine = Arc::new(ConversationEngine::new(
        admins,
        artifacts,
        Arc::new(connector),
        sink,
    ));

    tracing::info!("sigil artifact generator started");
    tokio::select! {
        result = run_long_poll_loop(transport_config, engine.clone()) => {
            result.context("transport ingress loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining open flows");
        }
    }

    engine.shutdown().await;
    tracing::info!("sigil artifact generator stopped");
    Ok(())
}
