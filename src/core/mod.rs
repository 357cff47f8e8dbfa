//! # Core Wire Components
//!
//! Low-level framing and the typed-field record codec.
//!
//! ## Components
//! - **Record**: ordered typed fields with length-prefixed serialization
//! - **Codec**: tokio codec for framing commands over byte streams
//!
//! ## Wire Format
//! ```text
//! [Tag(1)] [RecordLength(4)] [Record(N)]
//! ```

pub mod codec;
pub mod record;
