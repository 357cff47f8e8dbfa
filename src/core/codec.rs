//! # Frame Transport
//!
//! Tokio codec detecting command boundaries on the byte stream.
//!
//! ## Wire Format
//! ```text
//! [Tag(1)] [RecordLength(4, BE)] [Record(N)]
//! ```
//!
//! The length field counts only the record bytes following it, not the tag
//! byte and not itself. Decoding suspends until `5 + N` bytes are buffered
//! and never scans past a frame boundary, so frames arrive whole no matter
//! how the TCP segments were cut.
//!
//! The wire format places no bound on frame size; this implementation caps
//! the record length (default 16 MiB) and fails the connection on a larger
//! announcement rather than truncating.
//!
//! A frame whose tag is unrecognized is dropped with a warning and decoding
//! continues with the next frame (forward-compatible, ignore unknown).

use crate::config::MAX_RECORD_SIZE;
use crate::error::ProtocolError;
use crate::protocol::command::Command;
use crate::protocol::wire;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Tag byte + 4-byte record length
const HEADER_LEN: usize = 5;

/// Encoder/decoder for [`Command`] frames, used with
/// `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    max_record_size: usize,
}

impl CommandCodec {
    /// Codec with the default record size cap.
    pub fn new() -> Self {
        Self {
            max_record_size: MAX_RECORD_SIZE,
        }
    }

    /// Codec with an explicit record size cap.
    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Self { max_record_size }
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            // Peek the record length without consuming the header
            let length = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
            if length > self.max_record_size {
                return Err(ProtocolError::OversizedRecord(length));
            }
            if src.len() < HEADER_LEN + length {
                src.reserve(HEADER_LEN + length - src.len());
                return Ok(None);
            }

            let mut frame = src.split_to(HEADER_LEN + length);
            let tag = frame.get_u8();
            match wire::decode_body(tag, &mut frame)? {
                Some(cmd) => return Ok(Some(cmd)),
                None => {
                    warn!(tag, "unknown command tag, dropping frame");
                    // frame bytes already split off; try the next frame
                }
            }
        }
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = ProtocolError;

    fn encode(&mut self, cmd: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        wire::encode_command(&cmd, dst);
        Ok(())
    }
}
