//! Domain value types carried by commands and stored per user.
//!
//! `UserName` and `MessageInfo` enforce their wire limits at construction so
//! that an oversized value is unrepresentable everywhere downstream.

use crate::error::{ProtocolError, Result};
use std::fmt;

/// Maximum length of a user name, in characters
pub const MAX_NAME_LENGTH: usize = 20;

/// Maximum length of a chat message text, in characters
pub const MAX_MESSAGE_LENGTH: usize = 1024;

/// Typed name identifying a user. This is the identity published to other
/// users and the lookup key into the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserName(String);

impl UserName {
    /// Create a user name, rejecting values longer than [`MAX_NAME_LENGTH`].
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ProtocolError::InvalidUserName(format!(
                "name too long, max {MAX_NAME_LENGTH} chars: {name}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque store-assigned user identity. Never exposed to other users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// State of a contact-list entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactState {
    /// Invitation sent, not yet accepted or declined by the invitee
    Pending,
    /// Mutual contact
    Contact,
    /// Reserved; unused by the current protocol logic
    Blocked,
}

impl ContactState {
    /// Stable wire tag for this state
    pub fn id(self) -> u8 {
        match self {
            ContactState::Pending => 0,
            ContactState::Contact => 1,
            ContactState::Blocked => 2,
        }
    }

    /// Look up a state from its wire tag
    pub fn for_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(ContactState::Pending),
            1 => Ok(ContactState::Contact),
            2 => Ok(ContactState::Blocked),
            other => Err(ProtocolError::MalformedRecord(format!(
                "bad contact state: {other}"
            ))),
        }
    }
}

/// A contact-list entry: the contact plus the state of the relationship.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactInfo {
    pub contact: UserInfo,
    pub state: ContactState,
}

impl ContactInfo {
    pub fn new(contact: UserInfo, state: ContactState) -> Self {
        Self { contact, state }
    }
}

/// Everything the server knows about one user.
#[derive(Clone, Debug, PartialEq)]
pub struct UserInfo {
    /// Store-assigned id. None until the user is first persisted.
    pub id: Option<UserId>,
    pub name: UserName,
    pub password: String,
    pub contacts: Vec<ContactInfo>,
}

impl UserInfo {
    pub fn new(id: Option<UserId>, name: UserName, password: impl Into<String>) -> Self {
        Self {
            id,
            name,
            password: password.into(),
            contacts: Vec::new(),
        }
    }

    /// Find this user's contact entry for `name`, in any state.
    pub fn contact(&self, name: &UserName) -> Option<&ContactInfo> {
        self.contacts.iter().find(|c| &c.contact.name == name)
    }
}

/// Instant message content.
///
/// Sender and recipient are optional: an absent sender means "the current
/// user" on the sending side, an absent recipient means "the current user"
/// on the receiving side.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageInfo {
    pub sender: Option<UserName>,
    pub recipient: Option<UserName>,
    text: String,
}

impl MessageInfo {
    /// Create a message, rejecting texts longer than [`MAX_MESSAGE_LENGTH`].
    pub fn new(
        sender: Option<UserName>,
        recipient: Option<UserName>,
        text: impl Into<String>,
    ) -> Result<Self> {
        let text = text.into();
        if text.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ProtocolError::InvalidMessage(format!(
                "message too long, max {MAX_MESSAGE_LENGTH} chars"
            )));
        }
        Ok(Self {
            sender,
            recipient,
            text,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
