//! # Persistent Store
//!
//! Contract for the user/contact/message store, plus the in-memory
//! implementation used by tests and single-process deployments.
//!
//! The trait is deliberately blocking: backends are expected to sit on
//! blocking drivers, and the server dispatches every call through
//! `spawn_blocking` so store latency never stalls a connection's frame I/O.
//!
//! ## Contract highlights
//! - `persist_user` is create-or-update with an all-or-nothing substitution
//!   of the user's full contact list, applied as insert/update/delete deltas
//!   against the previously stored list.
//! - A unique-key violation on create raises [`StoreError::AlreadyExists`],
//!   distinguishable from every other failure.
//! - Offline messages are keyed by recipient id; fetching does not delete
//!   (the read-then-clear sequence is the caller's).

pub mod memory;

pub use memory::MemoryStore;

use crate::protocol::types::{ContactInfo, ContactState, MessageInfo, UserId, UserInfo, UserName};
use thiserror::Error;

/// Errors raised by a [`UserStore`] backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique-key violation: the entity already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The referenced entity is missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistent store for everything about users: accounts, contact lists,
/// and queued offline messages.
pub trait UserStore: Send + Sync {
    /// Look up a user by public name, contacts populated.
    fn get_user_by_name(&self, name: &UserName) -> Result<Option<UserInfo>, StoreError>;

    /// Look up a user by store id, contacts populated.
    fn get_user_by_id(&self, id: UserId) -> Result<Option<UserInfo>, StoreError>;

    /// Create (id `None`) or update (id `Some`) a user, substituting the
    /// stored contact list with the one carried by `user`. Returns the user
    /// with its store id assigned.
    fn persist_user(&self, user: UserInfo) -> Result<UserInfo, StoreError>;

    /// Remove a user and everything keyed by it.
    fn delete_user(&self, id: UserId) -> Result<(), StoreError>;

    /// The user's own contact list.
    fn get_contacts(&self, user: UserId) -> Result<Vec<ContactInfo>, StoreError>;

    /// The inverse relationship: users holding `contact` in their contact
    /// list in `state`. Each returned entry's `contact` is the holder.
    fn get_contact_of_users(
        &self,
        contact: UserId,
        state: ContactState,
    ) -> Result<Vec<ContactInfo>, StoreError>;

    /// Queue an offline message for `recipient`.
    fn insert_message(
        &self,
        sender: UserId,
        recipient: UserId,
        text: &str,
    ) -> Result<(), StoreError>;

    /// All queued messages for `recipient`, sender names filled in.
    fn get_messages(&self, recipient: UserId) -> Result<Vec<MessageInfo>, StoreError>;

    /// Drop all queued messages for `recipient`.
    fn delete_messages_for(&self, recipient: UserId) -> Result<(), StoreError>;
}
