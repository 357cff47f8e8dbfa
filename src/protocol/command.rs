//! # Command Model
//!
//! The closed set of commands exchanged between client and server.
//!
//! Every command carries an `i32` correlation id assigned by the issuing
//! side's [`IdGenerator`]; the receiving side echoes it in the matching
//! response. Command-type tags are stable wire values inherited from the
//! protocol's first deployment and must never be renumbered; tag 5 is a
//! retired type and stays unassigned so the later tags keep their positions.
//!
//! [`IdGenerator`]: crate::utils::IdGenerator

use crate::error::{ProtocolError, Result};
use crate::protocol::types::{ContactState, MessageInfo, UserName};

/// One message instance of a fixed variant, carrying a correlation id.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Create a new account with the given credentials
    CreateAccount {
        id: i32,
        username: UserName,
        password: String,
    },
    /// Replace the password of an existing account.
    /// Recognized on the wire; the server has no flow for it and answers
    /// BAD_REQUEST.
    ChangePassword {
        id: i32,
        username: UserName,
        old_password: String,
        new_password: String,
    },
    /// Authenticate this connection
    Login {
        id: i32,
        username: UserName,
        password: String,
    },
    /// Unbind the authenticated user; the connection stays open
    Logout { id: i32 },
    /// Unbind and close the connection. Fire-and-forget: no reply is sent.
    Exit { id: i32 },
    /// Request (client to server) or notice (server to invitee) for a
    /// contact invitation. As a request `contact` is set; as a notice
    /// `requester` is set.
    AddContactInvite {
        id: i32,
        requester: Option<UserName>,
        contact: Option<UserName>,
    },
    /// Invitee's answer to an invitation, and the notice forwarding that
    /// answer to the requester.
    AddContactResponse {
        id: i32,
        requester: Option<UserName>,
        contact: Option<UserName>,
        accepted: bool,
    },
    /// Drop a contact-list entry
    RemoveContact { id: i32, contact: Option<UserName> },
    /// Query which users hold the current user in their contact list in the
    /// given state
    GetContactOfUsers { id: i32, state: ContactState },
    /// Names of the users with a pending invitation toward the current user
    GetContactOfUsersResponse { id: i32, requesters: Vec<UserName> },
    /// An instant message: request when sent to the server, notice when
    /// forwarded to a live recipient
    ChatMessage { id: i32, message: MessageInfo },
    /// Fetch (and clear) messages queued while the current user was offline
    GetPendingMessages { id: i32 },
    /// The queued messages, senders filled in
    GetPendingMessagesResponse { id: i32, messages: Vec<MessageInfo> },
    /// Orderly server shutdown. No reply is defined.
    ShutdownServer { id: i32 },
    /// Generic success response
    Ok { id: i32 },
    /// Generic failure response
    Error {
        id: i32,
        code: WireErrorCode,
        description: Option<String>,
    },
}

impl Command {
    /// The correlation id carried by every variant.
    pub fn id(&self) -> i32 {
        match *self {
            Command::CreateAccount { id, .. }
            | Command::ChangePassword { id, .. }
            | Command::Login { id, .. }
            | Command::Logout { id }
            | Command::Exit { id }
            | Command::AddContactInvite { id, .. }
            | Command::AddContactResponse { id, .. }
            | Command::RemoveContact { id, .. }
            | Command::GetContactOfUsers { id, .. }
            | Command::GetContactOfUsersResponse { id, .. }
            | Command::ChatMessage { id, .. }
            | Command::GetPendingMessages { id }
            | Command::GetPendingMessagesResponse { id, .. }
            | Command::ShutdownServer { id }
            | Command::Ok { id }
            | Command::Error { id, .. } => id,
        }
    }

    /// Stable one-byte command-type tag.
    pub fn tag(&self) -> u8 {
        match self {
            Command::CreateAccount { .. } => tags::CREATE_ACCOUNT,
            Command::ChangePassword { .. } => tags::CHANGE_PASSWORD,
            Command::Login { .. } => tags::LOGIN,
            Command::Logout { .. } => tags::LOGOUT,
            Command::Exit { .. } => tags::EXIT,
            Command::AddContactInvite { .. } => tags::ADD_CONTACT_INVITE,
            Command::AddContactResponse { .. } => tags::ADD_CONTACT_RESPONSE,
            Command::RemoveContact { .. } => tags::REMOVE_CONTACT,
            Command::GetContactOfUsers { .. } => tags::GET_CONTACT_OF_USERS,
            Command::GetContactOfUsersResponse { .. } => tags::GET_CONTACT_OF_USERS_RESPONSE,
            Command::ChatMessage { .. } => tags::CHAT_MESSAGE,
            Command::GetPendingMessages { .. } => tags::GET_PENDING_MESSAGES,
            Command::GetPendingMessagesResponse { .. } => tags::GET_PENDING_MESSAGES_RESPONSE,
            Command::ShutdownServer { .. } => tags::SHUTDOWN_SERVER,
            Command::Ok { .. } => tags::OK,
            Command::Error { .. } => tags::ERROR,
        }
    }

    /// Whether an inbound command of this type is always a notification,
    /// delivered independently of the pending-request map.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            Command::AddContactInvite { .. }
                | Command::AddContactResponse { .. }
                | Command::ChatMessage { .. }
        )
    }
}

/// Stable command-type tag values.
///
/// Tag 5 belonged to a retired send-message type and is deliberately
/// unassigned.
pub mod tags {
    pub const CREATE_ACCOUNT: u8 = 0;
    pub const CHANGE_PASSWORD: u8 = 1;
    pub const LOGIN: u8 = 2;
    pub const LOGOUT: u8 = 3;
    pub const EXIT: u8 = 4;
    pub const ADD_CONTACT_INVITE: u8 = 6;
    pub const ADD_CONTACT_RESPONSE: u8 = 7;
    pub const REMOVE_CONTACT: u8 = 8;
    pub const GET_CONTACT_OF_USERS: u8 = 9;
    pub const GET_CONTACT_OF_USERS_RESPONSE: u8 = 10;
    pub const CHAT_MESSAGE: u8 = 11;
    pub const GET_PENDING_MESSAGES: u8 = 12;
    pub const GET_PENDING_MESSAGES_RESPONSE: u8 = 13;
    pub const SHUTDOWN_SERVER: u8 = 14;
    pub const OK: u8 = 15;
    pub const ERROR: u8 = 16;
}

/// Application-level error codes transmitted on the wire inside
/// [`Command::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireErrorCode {
    UserAlreadyExists,
    NotLoggedIn,
    InvalidUserOrPass,
    BadGateway,
    InternalError,
    Timeout,
    BadRequest,
}

impl WireErrorCode {
    /// Stable wire tag for this code
    pub fn id(self) -> u8 {
        match self {
            WireErrorCode::UserAlreadyExists => 0,
            WireErrorCode::NotLoggedIn => 1,
            WireErrorCode::InvalidUserOrPass => 2,
            WireErrorCode::BadGateway => 3,
            WireErrorCode::InternalError => 4,
            WireErrorCode::Timeout => 5,
            WireErrorCode::BadRequest => 6,
        }
    }

    /// Look up a code from its wire tag
    pub fn for_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(WireErrorCode::UserAlreadyExists),
            1 => Ok(WireErrorCode::NotLoggedIn),
            2 => Ok(WireErrorCode::InvalidUserOrPass),
            3 => Ok(WireErrorCode::BadGateway),
            4 => Ok(WireErrorCode::InternalError),
            5 => Ok(WireErrorCode::Timeout),
            6 => Ok(WireErrorCode::BadRequest),
            other => Err(ProtocolError::MalformedRecord(format!(
                "bad error code: {other}"
            ))),
        }
    }
}
