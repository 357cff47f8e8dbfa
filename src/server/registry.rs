//! # Session Registry
//!
//! The global map from authenticated user name to that user's live
//! connection, used to find a peer's connection for notification delivery.
//!
//! ## Semantics
//! - Entries are added on login and removed on logout, exit, or disconnect.
//! - A second login under the same name silently overwrites the previous
//!   mapping (last-login-wins); the earlier connection is neither notified
//!   nor closed.
//! - The registry is an injectable object owned by the server process,
//!   shared across all connections; lookup and replace are safe from any
//!   task.

use crate::protocol::command::Command;
use crate::protocol::types::UserName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace};

/// Handle to one live connection's outbound queue. Cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    outbound: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub(crate) fn new(outbound: mpsc::Sender<Command>) -> Self {
        Self { outbound }
    }

    /// Queue a notification for this connection. Best-effort: a gone or
    /// saturated peer drops the notice, it does not stall the sender.
    pub(crate) fn deliver(&self, cmd: Command) -> bool {
        match self.outbound.try_send(cmd) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "notification not delivered");
                false
            }
        }
    }
}

/// Thread-safe name-to-session map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<UserName, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handle`, silently replacing any prior entry
    /// (last-login-wins).
    pub async fn register(&self, name: UserName, handle: SessionHandle) {
        let mut inner = self.inner.lock().await;
        let replaced = inner.insert(name.clone(), handle).is_some();
        info!(user = %name, replaced, "user logged in");
    }

    /// Remove `name`'s entry, if any. Removal is by name, unconditional:
    /// after a last-login-wins overwrite the earlier connection's cleanup
    /// still removes the newer mapping (inherited behavior).
    pub async fn unregister(&self, name: &UserName) {
        let mut inner = self.inner.lock().await;
        if inner.remove(name).is_some() {
            info!(user = %name, "user logged out");
        }
    }

    /// Look up the live connection for `name`.
    pub async fn find(&self, name: &UserName) -> Option<SessionHandle> {
        let inner = self.inner.lock().await;
        let found = inner.get(name).cloned();
        trace!(user = %name, hit = found.is_some(), "registry lookup");
        found
    }

    /// Number of authenticated sessions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn handle() -> (SessionHandle, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(4);
        (SessionHandle::new(tx), rx)
    }

    fn name(s: &str) -> UserName {
        UserName::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_register_find_unregister() {
        let registry = SessionRegistry::new();
        let (h, _rx) = handle();

        registry.register(name("Alice"), h).await;
        assert!(registry.find(&name("Alice")).await.is_some());
        assert!(registry.find(&name("Bob")).await.is_none());

        registry.unregister(&name("Alice")).await;
        assert!(registry.find(&name("Alice")).await.is_none());
    }

    #[tokio::test]
    async fn test_second_login_overwrites() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = handle();
        let (second, mut rx2) = handle();

        registry.register(name("Alice"), first).await;
        registry.register(name("Alice"), second).await;
        assert_eq!(registry.len().await, 1);

        // delivery goes to the second connection
        let found = registry.find(&name("Alice")).await.unwrap();
        assert!(found.deliver(Command::Ok { id: 1 }));
        assert_eq!(rx2.recv().await, Some(Command::Ok { id: 1 }));
    }

    #[tokio::test]
    async fn test_delivery_to_gone_connection_fails() {
        let (h, rx) = handle();
        drop(rx);
        assert!(!h.deliver(Command::Ok { id: 1 }));
    }
}
