//! The connection task: the single logical execution context that owns the
//! framed stream, the pending-request map, and the timeout timers.
//!
//! Sends from any task are handed off through an mpsc channel into this
//! task, so every map insert/remove and timer arm/cancel happens here: the
//! inbound-read path and the outbound-send path can never race on the
//! correlation state.

use crate::core::codec::CommandCodec;
use crate::protocol::command::Command;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, info, warn};

/// Final word on a tracked request. Exactly one of these is delivered per
/// request id; the oneshot channel makes a second delivery unrepresentable.
#[derive(Debug)]
pub enum RequestOutcome {
    /// A command with the request's id arrived before the deadline
    Response(Command),
    /// The deadline passed first; a response arriving later is dropped
    TimedOut,
}

/// A command on its way out of the client.
pub(crate) enum Outbound {
    /// Tracked request: register the id, arm a timer, deliver the outcome
    Request {
        command: Command,
        timeout: Option<Duration>,
        reply: oneshot::Sender<RequestOutcome>,
    },
    /// Fire-and-forget (e.g. Exit): no tracking, no timeout
    Fire { command: Command },
}

struct PendingRequest {
    reply: oneshot::Sender<RequestOutcome>,
    timer: delay_queue::Key,
}

/// Drive one client connection until the peer closes, an I/O error occurs,
/// or every client handle is dropped.
pub(crate) async fn run_connection(
    mut framed: Framed<TcpStream, CommandCodec>,
    mut outbound: mpsc::Receiver<Outbound>,
    notifications: mpsc::Sender<Command>,
    default_timeout: Duration,
) {
    let mut pending: HashMap<i32, PendingRequest> = HashMap::new();
    let mut timers: DelayQueue<i32> = DelayQueue::new();

    loop {
        tokio::select! {
            out = outbound.recv() => {
                let Some(out) = out else {
                    debug!("all client handles dropped, closing connection");
                    break;
                };
                match out {
                    Outbound::Request { command, timeout, reply } => {
                        let id = command.id();
                        let timer =
                            timers.insert(id, timeout.unwrap_or(default_timeout));
                        pending.insert(id, PendingRequest { reply, timer });
                        if let Err(e) = framed.send(command).await {
                            warn!(error = %e, "send failed, closing connection");
                            break;
                        }
                        debug!(id, "request sent");
                    }
                    Outbound::Fire { command } => {
                        let id = command.id();
                        if let Err(e) = framed.send(command).await {
                            warn!(error = %e, "send failed, closing connection");
                            break;
                        }
                        debug!(id, "fire-and-forget command sent");
                    }
                }
            }

            expired = futures::future::poll_fn(|cx| timers.poll_expired(cx)),
                if !timers.is_empty() =>
            {
                if let Some(expired) = expired {
                    let id = expired.into_inner();
                    if let Some(request) = pending.remove(&id) {
                        debug!(id, "request timed out");
                        let _ = request.reply.send(RequestOutcome::TimedOut);
                    }
                }
            }

            inbound = framed.next() => {
                match inbound {
                    Some(Ok(cmd)) => {
                        dispatch_inbound(cmd, &mut pending, &mut timers, &notifications).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "decode failed, closing connection");
                        break;
                    }
                    None => {
                        info!("connection closed by server");
                        break;
                    }
                }
            }
        }
    }

    // Dropping the pending map drops every reply sender; waiting callers
    // observe the closed connection rather than hanging.
}

/// Classify by type first: the three notification types never consult the
/// pending map. Everything else either matches an outstanding id or is a
/// late response and is dropped.
async fn dispatch_inbound(
    cmd: Command,
    pending: &mut HashMap<i32, PendingRequest>,
    timers: &mut DelayQueue<i32>,
    notifications: &mpsc::Sender<Command>,
) {
    if cmd.is_notification() {
        debug!(id = cmd.id(), "notification received");
        if notifications.send(cmd).await.is_err() {
            debug!("notification receiver dropped, notification discarded");
        }
        return;
    }

    let id = cmd.id();
    match pending.remove(&id) {
        Some(request) => {
            timers.remove(&request.timer);
            let _ = request.reply.send(RequestOutcome::Response(cmd));
        }
        None => {
            debug!(id, "late or unsolicited response dropped");
        }
    }
}
