//! memberdesk - command line front end for the membership customer cache.
//!
//! Loads configuration, sets up logging, and runs one subcommand against a
//! session-scoped `CustomerCache` backed by the REST service.

mod commands;
mod config;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use memberdesk_core::{ApiClient, CustomerCache};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{Cli, Command};
use config::Config;

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "memberdesk.log";

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer guard, which must be held until exit so buffered
/// log lines are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => Config::config_path()?,
    };

    if let Command::Init { url, token, timeout_secs } = cli.command {
        let config = Config {
            api_base_url: Some(url),
            api_token: token,
            request_timeout_secs: timeout_secs,
            log_dir: None,
        };
        config.save_to(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let config = Config::load_from(&config_path)?;
    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(config = %config_path.display(), "memberdesk starting");

    let mut client = ApiClient::new(config.base_url()?, config.timeout())?;
    if let Some(token) = config.api_token.clone() {
        client.set_token(token);
    }

    let cache = CustomerCache::new(client);
    let result = commands::run(cli.command, &cache, cli.json).await;
    cache.reset();

    info!("memberdesk shutting down");
    result
}
