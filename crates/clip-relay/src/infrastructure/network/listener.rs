//! TCP accept loop.
//!
//! Each accepted connection is wrapped in a [`TcpClient`] and registered with
//! the hub from its own task, so a slow initial push to one peer never
//! delays accepting the next.  The loop itself never exits on its own:
//! accept errors (for example running out of file descriptors) are logged
//! and the loop carries on after a short pause.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::application::client::ClipboardClient;
use crate::application::hub::ClipboardHub;
use crate::infrastructure::network::tcp_client::TcpClient;

/// Pause after a failed `accept` before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Binds `addr` and accepts peers forever.
///
/// # Errors
///
/// Returns an error only if the listener cannot be bound (port in use,
/// missing permission, and so on).
pub async fn run_server(
    addr: SocketAddr,
    hub: Arc<ClipboardHub>,
    write_timeout: Duration,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {addr}"))?;
    info!("relay listening on {addr}");
    accept_loop(listener, hub, write_timeout).await;
    Ok(())
}

/// Accepts connections on an already-bound listener until the task is
/// cancelled.
pub async fn accept_loop(listener: TcpListener, hub: Arc<ClipboardHub>, write_timeout: Duration) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!("new connection from {peer_addr}");
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("could not set TCP_NODELAY for {peer_addr}: {e}");
                }
                let client: Arc<dyn ClipboardClient> =
                    TcpClient::spawn(stream, peer_addr, write_timeout);
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    if let Err(e) = hub.add_client(client).await {
                        warn!("could not register {peer_addr}: {e}");
                    }
                });
            }
            Err(e) => {
                error!("accept error: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}
