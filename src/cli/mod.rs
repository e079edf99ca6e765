//! CLI module for the gateway
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `serve` - Start the gateway server
//! - `engines` - List configured engines
//! - `probe` - Run one liveness probe round against every enabled engine
//! - `config` - Configuration utilities (init)
//!
//! # Example
//!
//! ```bash
//! # Start server with default config
//! engine-gateway serve
//!
//! # List engines as JSON
//! engine-gateway engines --json
//! ```

pub mod config;
pub mod engines;
pub mod output;
pub mod probe;
pub mod serve;

pub use config::handle_config_init;
pub use engines::handle_engines;
pub use probe::handle_probe;

use crate::config::{ConfigError, GatewayConfig};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Engine Gateway - health-aware routing for local inference engines
#[derive(Parser, Debug)]
#[command(
    name = "engine-gateway",
    version,
    about = "Streaming chat gateway for local LLM inference engines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway server
    Serve(ServeArgs),
    /// List configured engines
    Engines(EnginesArgs),
    /// Probe every enabled engine once
    Probe(ProbeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "GATEWAY_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GATEWAY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Disable active health probes
    #[arg(long)]
    pub no_health_check: bool,
}

#[derive(Args, Debug)]
pub struct EnginesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "gateway.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Load the file if it exists (defaults otherwise), apply env overrides, validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = if path.exists() {
        GatewayConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        GatewayConfig::default()
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
