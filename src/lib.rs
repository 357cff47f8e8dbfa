//! # Chat Protocol
//!
//! Core of a two-party chat service speaking a private binary protocol over
//! persistent TCP connections.
//!
//! ## Layers
//! - [`core`]: frame transport and the typed-field record codec
//! - [`protocol`]: the closed command set and its wire layouts
//! - [`client`]: connection handling and request/response correlation
//! - [`server`]: sessions, the authentication gate, and the contact and
//!   messaging flows
//! - [`store`]: the persistent-store contract and an in-memory backend
//!
//! ## Wire Format
//! ```text
//! [Tag(1)] [RecordLength(4, BE)] [Record(N)]
//! ```
//! The record is an ordered list of typed fields; see [`core::record`].
//!
//! ## Quick Start
//! ```no_run
//! use chat_protocol::client::ChatClient;
//! use chat_protocol::config::ChatConfig;
//! use chat_protocol::protocol::command::Command;
//! use chat_protocol::protocol::types::UserName;
//!
//! # async fn run() -> chat_protocol::error::Result<()> {
//! let config = ChatConfig::default();
//! let (client, mut notifications) = ChatClient::connect(&config).await?;
//!
//! let outcome = client
//!     .request(
//!         Command::Login {
//!             id: client.next_id(),
//!             username: UserName::new("Bob")?,
//!             password: String::from("mypass"),
//!         },
//!         None,
//!     )
//!     .await?;
//! # let _ = (outcome, notifications.recv().await);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;
pub mod utils;

pub use client::{ChatClient, RequestOutcome};
pub use config::ChatConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{Command, WireErrorCode};
pub use store::{MemoryStore, UserStore};
