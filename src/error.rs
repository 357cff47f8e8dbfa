//! # Error Types
//!
//! Comprehensive error handling for the chat protocol.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O errors to record-codec faults.
//!
//! ## Error Categories
//! - **I/O Errors**: Network failures, peer resets
//! - **Codec Errors**: Field type mismatches, exhausted records, oversized frames
//! - **Protocol Errors**: Correlation timeouts, closed connections
//! - **Store Errors**: Persistent-store failures surfaced to the server flows
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! Application-level failures (bad credentials, unknown contact, ...) are NOT
//! modeled here: they travel on the wire as [`Command::Error`] responses with a
//! [`WireErrorCode`] and are correlated back to the request like any other
//! response.
//!
//! [`Command::Error`]: crate::protocol::command::Command::Error
//! [`WireErrorCode`]: crate::protocol::command::WireErrorCode

use crate::store::StoreError;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Record codec errors
    pub const ERR_RECORD_EXHAUSTED: &str = "No more fields in record";
    pub const ERR_RECORD_TRUNCATED: &str = "Record payload shorter than its length field";
    pub const ERR_LIST_SIZE_MISMATCH: &str = "Sender list and message list have different sizes";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_TIMEOUT: &str = "Request timed out";

    /// Validation errors
    pub const ERR_NAME_TOO_LONG: &str = "User name exceeds maximum length";
    pub const ERR_MESSAGE_TOO_LONG: &str = "Message text exceeds maximum length";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Field type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("No more fields in record")]
    Exhausted,

    #[error("Unknown field type tag: {0}")]
    UnknownFieldTag(u8),

    #[error("Record too large: {0} bytes")]
    OversizedRecord(usize),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Invalid user name: {0}")]
    InvalidUserName(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
