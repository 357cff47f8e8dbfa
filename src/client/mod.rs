//! # Chat Client
//!
//! Client-side connection handling and request correlation.
//!
//! [`ChatClient::connect`] opens the TCP connection, wraps it in the command
//! codec, and spawns the connection task that owns all correlation state
//! (see [`correlation`]). The returned handle is cheap to clone; sends from
//! any task are funneled into the connection task's serial context.
//!
//! ## Request / notification split
//! A *request* ([`ChatClient::request`]) registers its id and resolves to
//! exactly one [`RequestOutcome`]: the correlated response, or a timeout.
//! A *fire-and-forget send* ([`ChatClient::send`]) does no tracking; it is
//! used for Exit, which has no reply. *Notifications* (contact invites, contact
//! responses, live chat messages) are classified by type, never by id, and
//! arrive on the channel returned at connect time.

pub mod correlation;

pub use correlation::RequestOutcome;

use crate::config::ChatConfig;
use crate::core::codec::CommandCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::command::Command;
use crate::utils::IdGenerator;
use correlation::Outbound;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{info, instrument};

/// Cloneable handle to one client connection.
#[derive(Clone)]
pub struct ChatClient {
    outbound: mpsc::Sender<Outbound>,
    ids: IdGenerator,
    default_timeout: Duration,
}

impl ChatClient {
    /// Connect to the server named by `config.client` and spawn the
    /// connection task.
    ///
    /// Returns the handle plus the notification channel: contact-invite,
    /// contact-response, and chat-message notices arrive there, independent
    /// of any outstanding request.
    #[instrument(skip(config), fields(address = %config.client.address))]
    pub async fn connect(config: &ChatConfig) -> Result<(Self, mpsc::Receiver<Command>)> {
        let stream = tokio::time::timeout(
            config.client.connection_timeout,
            TcpStream::connect(&config.client.address),
        )
        .await
        .map_err(|_| ProtocolError::Timeout)??;
        info!("connection established");

        let framed = Framed::new(
            stream,
            CommandCodec::with_max_record_size(config.wire.max_record_size),
        );
        let (outbound_tx, outbound_rx) = mpsc::channel(config.client.outbound_queue_limit);
        let (notif_tx, notif_rx) = mpsc::channel(config.client.notification_queue_limit);

        let default_timeout = config.client.response_timeout;
        tokio::spawn(correlation::run_connection(
            framed,
            outbound_rx,
            notif_tx,
            default_timeout,
        ));

        Ok((
            Self {
                outbound: outbound_tx,
                ids: IdGenerator::new(),
                default_timeout,
            },
            notif_rx,
        ))
    }

    /// Id source for commands issued on this connection.
    pub fn next_id(&self) -> i32 {
        self.ids.next_id()
    }

    /// Send a tracked request and wait for its outcome.
    ///
    /// `timeout` overrides the configured response timeout for this request
    /// only. At most one outcome is ever delivered; a response arriving
    /// after the timeout fired is dropped by the connection task.
    pub async fn request(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<RequestOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.outbound
            .send(Outbound::Request {
                command,
                timeout,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Send a command with no tracking and no timeout (e.g. Exit).
    pub async fn send(&self, command: Command) -> Result<()> {
        self.outbound
            .send(Outbound::Fire { command })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// The response timeout applied when `request` is called without an
    /// override.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}
