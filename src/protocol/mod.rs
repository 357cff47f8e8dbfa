//! # Protocol Layer
//!
//! The command model and its wire layouts.
//!
//! ## Components
//! - **Command**: the closed command sum type and its stable tags
//! - **Types**: user names, contacts, message content
//! - **Wire**: per-variant encode/decode delegates

pub mod command;
pub mod types;
pub mod wire;

pub use command::{Command, WireErrorCode};
pub use types::{ContactInfo, ContactState, MessageInfo, UserId, UserInfo, UserName};
