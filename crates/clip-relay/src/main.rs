//! clipshare relay: entry point.
//!
//! Accepts peer connections on a TCP port and keeps one shared clipboard
//! value in sync between all of them.
//!
//! # Usage
//!
//! ```text
//! clip-relay [OPTIONS]
//!
//! Options:
//!   -p, --port <PORT>        TCP port to listen on [default: 1337]
//!       --bind <ADDR>        IP address to bind [default: 0.0.0.0]
//!       --config <PATH>      TOML config file [default: platform config dir]
//!       --log-level <LEVEL>  Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! Command-line values override the config file.  Each option can also be
//! set through the environment:
//!
//! | Variable         | Option        |
//! |------------------|---------------|
//! | `CLIP_PORT`      | `--port`      |
//! | `CLIP_BIND`      | `--bind`      |
//! | `CLIP_CONFIG`    | `--config`    |
//! | `CLIP_LOG_LEVEL` | `--log-level` |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clip_relay::application::hub::ClipboardHub;
use clip_relay::infrastructure::network::listener::run_server;
use clip_relay::infrastructure::storage::config::{default_config_path, load_config, RelayConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// clipshare relay server.
#[derive(Debug, Parser)]
#[command(
    name = "clip-relay",
    about = "Relay that keeps a shared clipboard in sync across connected peers",
    version
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(short = 'p', long, env = "CLIP_PORT")]
    port: Option<u16>,

    /// IP address to bind the listener to.
    #[arg(long, env = "CLIP_BIND")]
    bind: Option<String>,

    /// Path of the TOML config file.
    #[arg(long, env = "CLIP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "CLIP_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file (if any) and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged configuration is invalid.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let base = match self.config.clone().or_else(default_config_path) {
            Some(path) => load_config(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };
        let config = self.apply_overrides(base);
        config.validate().context("invalid relay configuration")?;
        Ok(config)
    }

    fn apply_overrides(self, mut config: RelayConfig) -> RelayConfig {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_relay_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let addr = config.listen_addr()?;
    let hub = Arc::new(ClipboardHub::new(config.hub_config()));
    info!("clipshare relay starting on {addr}");

    tokio::select! {
        result = hub.run() => result.context("hub loop failed")?,
        result = run_server(addr, Arc::clone(&hub), config.write_timeout()) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C; shutting down");
            hub.close();
        }
    }

    info!("clipshare relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
