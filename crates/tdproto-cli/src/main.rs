//! `tdproto`: inspect a TDLib JSON catalogue, decode captured traffic, or
//! bridge a TDLib JSON process.
//!
//! ```bash
//! tdproto tags --class Update
//! tdproto decode capture.jsonl
//! tdproto bridge -- tdjson-pipe --database ./td
//! ```

mod cmd;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tdproto_core::Catalogue;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tdproto", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "TDPROTO_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Catalogue artifact to use instead of the bundled one
    #[arg(long, env = "TDPROTO_CATALOGUE", global = true)]
    catalogue: Option<PathBuf>,

    /// Log filter directives (overrides the config file)
    #[arg(long, env = "TDPROTO_LOG", global = true)]
    log: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalogue shapes
    Tags(cmd::tags::TagsArgs),
    /// Decode newline-delimited JSON messages
    Decode(cmd::decode::DecodeArgs),
    /// Run a TDLib JSON process and relay requests from stdin
    Bridge(cmd::bridge::BridgeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.catalogue {
        config.catalogue = Some(path);
    }
    if let Some(filter) = cli.log {
        config.log.filter = filter;
    }

    init_logging(&config.log.filter)?;
    let catalogue = Arc::new(load_catalogue(&config)?);
    tracing::debug!(
        "Catalogue {} with {} shapes",
        catalogue.version(),
        catalogue.len()
    );

    match cli.command {
        Command::Tags(args) => cmd::tags::run(&catalogue, args),
        Command::Decode(args) => cmd::decode::run(catalogue, args).await,
        Command::Bridge(args) => cmd::bridge::run(catalogue, config, args).await,
    }
}

fn load_catalogue(config: &Config) -> Result<Catalogue> {
    let catalogue = match &config.catalogue {
        Some(path) => Catalogue::load(path)?,
        None => Catalogue::bundled()?,
    };
    Ok(catalogue)
}

/// Logs go to stderr; stdout carries command output.
fn init_logging(filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| anyhow::anyhow!("invalid log filter {:?}: {}", filter, e))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
