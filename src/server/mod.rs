//! # Chat Server
//!
//! Accept loop, per-connection sessions, and graceful shutdown.
//!
//! [`start_server`] binds the configured address and runs until a shutdown
//! signal arrives: CTRL+C, the provided shutdown channel, or a
//! ShutdownServer command on any authenticated connection. Shutdown first
//! lets active connections drain within `ServerConfig::shutdown_timeout`,
//! then gives up on the stragglers.
//!
//! Each accepted connection gets its own task (see [`session`]); the
//! [`SessionRegistry`] is the only state shared between them.

pub mod handler;
pub mod registry;
pub mod session;

pub use registry::{SessionHandle, SessionRegistry};

use crate::config::ChatConfig;
use crate::error::Result;
use crate::store::UserStore;
use crate::utils::IdGenerator;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, instrument, warn};

/// Start the server and run until CTRL+C or a ShutdownServer command.
#[instrument(skip(config, store), fields(address = %config.server.address))]
pub async fn start_server(config: ChatConfig, store: Arc<dyn UserStore>) -> Result<()> {
    // Create internal shutdown channel
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    // Set up ctrl-c handler that sends to our internal shutdown channel
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(config, store, shutdown_rx).await
}

/// Start the server with an external shutdown channel.
#[instrument(skip(config, store, shutdown_rx), fields(address = %config.server.address))]
pub async fn start_server_with_shutdown(
    config: ChatConfig,
    store: Arc<dyn UserStore>,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(&config.server.address).await?;
    info!(address = %config.server.address, "Listening");
    serve(listener, config, store, shutdown_rx).await
}

/// Run the accept loop on an already-bound listener.
///
/// Split out so tests can bind port 0 and learn the address first.
pub async fn serve(
    listener: TcpListener,
    config: ChatConfig,
    store: Arc<dyn UserStore>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let registry = SessionRegistry::new();
    let notif_ids = IdGenerator::new();

    // Shutdown channel shared with every session so a ShutdownServer
    // command reaches the accept loop
    let (cmd_shutdown_tx, mut cmd_shutdown_rx) = mpsc::channel::<()>(1);

    // Track active connections
    let active_connections = Arc::new(Mutex::new(0u32));

    // Server main loop with graceful shutdown
    loop {
        tokio::select! {
            // Shutdown from the caller (a dropped channel counts) or from a
            // ShutdownServer command
            _ = shutdown_rx.recv() => {
                drain_connections(&active_connections, config.server.shutdown_timeout).await;
                return Ok(());
            }
            _ = cmd_shutdown_rx.recv() => {
                drain_connections(&active_connections, config.server.shutdown_timeout).await;
                return Ok(());
            }

            // Accept new connections
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        {
                            let mut count = active_connections.lock().await;
                            if (*count as usize) >= config.server.max_connections {
                                warn!(peer = %addr, "connection limit reached, rejecting");
                                drop(stream);
                                continue;
                            }
                            *count += 1;
                        }
                        info!(peer = %addr, "New connection established");

                        let active_connections = active_connections.clone();
                        let store = store.clone();
                        let registry = registry.clone();
                        let notif_ids = notif_ids.clone();
                        let cmd_shutdown_tx = cmd_shutdown_tx.clone();
                        let max_record_size = config.wire.max_record_size;
                        let queue_limit = config.server.outbound_queue_limit;

                        tokio::spawn(async move {
                            session::run_session(
                                stream,
                                max_record_size,
                                queue_limit,
                                store,
                                registry,
                                notif_ids,
                                cmd_shutdown_tx,
                            )
                            .await;

                            // Decrement connection counter when connection closes
                            let mut count = active_connections.lock().await;
                            *count -= 1;
                            info!(peer = %addr, "Connection closed");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Wait for active connections to close, bounded by `grace`.
async fn drain_connections(active_connections: &Arc<Mutex<u32>>, grace: Duration) {
    info!("Shutting down server. Waiting for connections to close...");

    let timeout = tokio::time::sleep(grace);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            _ = &mut timeout => {
                warn!("Shutdown timeout reached, forcing exit");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                let connections = *active_connections.lock().await;
                info!(connections = %connections, "Waiting for connections to close");
                if connections == 0 {
                    info!("All connections closed, shutting down");
                    break;
                }
            }
        }
    }
}
