//! clipshare peer: entry point.
//!
//! Connects to a relay and mirrors the local system clipboard through it.
//!
//! # Usage
//!
//! ```text
//! clip-peer [OPTIONS]
//!
//! Options:
//!       --relay <HOST:PORT>          Relay to connect to [default: 127.0.0.1:1337]
//!       --poll-interval-ms <MS>      Local clipboard poll period [default: 1000]
//!       --reconnect-secs <SECS>      Delay before reconnecting [default: 5]
//!       --log-level <LEVEL>          Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Event loop
//!
//! One `tokio::select!` loop drives everything:
//!
//! - a poll tick reads the local clipboard and sends it if it changed;
//! - `PeerEvent::ValueReceived` writes a relayed value into the clipboard;
//! - Ctrl+C sends a `Disconnect` to the relay and exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use clip_peer::application::sync_clipboard::SyncClipboardUseCase;
use clip_peer::infrastructure::clipboard::system::SystemClipboard;
use clip_peer::infrastructure::network::{
    PeerConfig, PeerEvent, RelayConnection, DEFAULT_RELAY_ADDR,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// clipshare peer.
#[derive(Debug, Parser)]
#[command(
    name = "clip-peer",
    about = "Shares this machine's clipboard with other peers through a relay",
    version
)]
struct Cli {
    /// Relay address as `host:port`.
    #[arg(long, env = "CLIP_RELAY", default_value = DEFAULT_RELAY_ADDR)]
    relay: String,

    /// How often the local clipboard is checked, in milliseconds.
    #[arg(long, env = "CLIP_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Seconds to wait before reconnecting to the relay.
    #[arg(long, env = "CLIP_RECONNECT_SECS", default_value_t = 5)]
    reconnect_secs: u64,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "CLIP_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Converts the parsed arguments into a [`PeerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the relay address is empty or the poll interval
    /// is zero.
    fn into_peer_config(self) -> anyhow::Result<PeerConfig> {
        if self.relay.trim().is_empty() {
            bail!("--relay must not be empty");
        }
        if self.poll_interval_ms == 0 {
            bail!("--poll-interval-ms must be at least 1");
        }
        Ok(PeerConfig {
            relay_addr: self.relay,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reconnect_interval: Duration::from_secs(self.reconnect_secs),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `RUST_LOG` wins over --log-level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = cli.into_peer_config()?;

    if !SystemClipboard::is_available() {
        bail!("the system clipboard is not available on this machine");
    }
    let mut sync = SyncClipboardUseCase::new(Arc::new(SystemClipboard::new()));

    let running = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(RelayConnection::new(config.clone()));
    let mut events = Arc::clone(&connection).start(Arc::clone(&running));

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("clipshare peer started; relay {}", config.relay_addr);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(value) = sync.poll_local() {
                    match connection.send_value(&value).await {
                        Ok(()) => info!("sent {} to relay", value.preview()),
                        Err(e) => {
                            debug!("send failed: {e}");
                            sync.mark_unsent(&value);
                        }
                    }
                }
            }

            event = events.recv() => match event {
                Some(PeerEvent::Connected { relay_addr }) => {
                    info!("relay connection up ({relay_addr})");
                }
                Some(PeerEvent::ValueReceived(value)) => {
                    if let Err(e) = sync.apply_remote(value) {
                        warn!("could not update local clipboard: {e}");
                    }
                }
                Some(PeerEvent::Disconnected) => {
                    warn!("relay connection lost; reconnect in progress");
                }
                None => {
                    error!("relay connection task ended");
                    break;
                }
            },

            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl+C")?;
                info!("received Ctrl+C; shutting down");
                running.store(false, Ordering::Relaxed);
                connection.disconnect().await;
                break;
            }
        }
    }

    info!("clipshare peer stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
