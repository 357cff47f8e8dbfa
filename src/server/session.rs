//! # Per-Connection Session
//!
//! One task per accepted connection, holding the two-state authentication
//! machine: **Unauthenticated** → (Login) → **Authenticated** → (Logout or
//! Exit) → **Unauthenticated**. The connection survives Logout and closes
//! on Exit or disconnect.
//!
//! The session task is the connection's single serial execution context: it
//! alone reads frames, writes replies, and writes notifications queued by
//! peer connections, so outbound command ordering needs no further
//! synchronization. Store calls are dispatched to the blocking worker pool
//! and awaited here, never run on the I/O path.

use crate::core::codec::CommandCodec;
use crate::protocol::types::UserInfo;
use crate::server::handler::{self, Action};
use crate::server::registry::{SessionHandle, SessionRegistry};
use crate::store::{StoreError, UserStore};
use crate::utils::IdGenerator;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Mutable state of one connection.
pub(crate) struct Session {
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) registry: SessionRegistry,
    pub(crate) notif_ids: IdGenerator,
    pub(crate) shutdown: mpsc::Sender<()>,
    /// The authenticated user, None while unauthenticated
    pub(crate) user: Option<UserInfo>,
    /// This connection's own outbound queue, registered under the user's
    /// name on login
    pub(crate) handle: SessionHandle,
}

/// Drive one server-side connection to completion.
pub(crate) async fn run_session(
    stream: TcpStream,
    max_record_size: usize,
    outbound_queue_limit: usize,
    store: Arc<dyn UserStore>,
    registry: SessionRegistry,
    notif_ids: IdGenerator,
    shutdown: mpsc::Sender<()>,
) {
    let mut framed = Framed::new(stream, CommandCodec::with_max_record_size(max_record_size));
    let (outbound_tx, mut outbound_rx) = mpsc::channel(outbound_queue_limit);
    let mut session = Session {
        store,
        registry: registry.clone(),
        notif_ids,
        shutdown,
        user: None,
        handle: SessionHandle::new(outbound_tx),
    };

    loop {
        tokio::select! {
            // Notifications queued by peer connections re-enter this
            // context and are written here, preserving single-writer
            // ordering.
            Some(notice) = outbound_rx.recv() => {
                if let Err(e) = framed.send(notice).await {
                    warn!(error = %e, "notification write failed, closing connection");
                    break;
                }
            }

            inbound = framed.next() => {
                match inbound {
                    Some(Ok(cmd)) => {
                        debug!(id = cmd.id(), tag = cmd.tag(), "command received");
                        match handler::process(cmd, &mut session).await {
                            Action::Reply(reply) => {
                                if let Err(e) = framed.send(reply).await {
                                    warn!(error = %e, "reply write failed, closing connection");
                                    break;
                                }
                            }
                            Action::None => {}
                            Action::Close => {
                                let _ = framed.close().await;
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "decode failed, closing connection");
                        break;
                    }
                    None => {
                        info!("client disconnected");
                        break;
                    }
                }
            }
        }
    }

    // Session cleanup: an authenticated user leaves the registry when the
    // connection dies, before any later login can be looked up.
    if let Some(user) = session.user.take() {
        registry.unregister(&user.name).await;
    }
}

/// Run one store operation on the blocking worker pool and hand the result
/// back into the calling connection's context.
pub(crate) async fn with_store<T, F>(store: &Arc<dyn UserStore>, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn UserStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || op(store.as_ref())).await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Backend(format!("store task failed: {e}"))),
    }
}
