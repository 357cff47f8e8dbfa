//! Frame integrity over a real byte stream: however the bytes are cut into
//! segments, the decoded command sequence is identical.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::BytesMut;
use chat_protocol::core::codec::CommandCodec;
use chat_protocol::protocol::command::{Command, WireErrorCode};
use chat_protocol::protocol::types::{MessageInfo, UserName};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Encoder, FramedRead};

fn sample_commands() -> Vec<Command> {
    vec![
        Command::Login {
            id: 1,
            username: UserName::new("Bob").unwrap(),
            password: String::from("mypass"),
        },
        Command::Ok { id: 1 },
        Command::ChatMessage {
            id: 2,
            message: MessageInfo::new(None, Some(UserName::new("Alice").unwrap()), "hello")
                .unwrap(),
        },
        Command::Error {
            id: 3,
            code: WireErrorCode::BadRequest,
            description: Some(String::from("nope")),
        },
    ]
}

fn encode_all(commands: &[Command]) -> Vec<u8> {
    let mut codec = CommandCodec::new();
    let mut wire = BytesMut::new();
    for cmd in commands {
        codec.encode(cmd.clone(), &mut wire).unwrap();
    }
    wire.to_vec()
}

async fn decode_stream(wire: Vec<u8>, chunk_size: usize) -> Vec<Command> {
    let (mut writer, reader) = tokio::io::duplex(64);

    tokio::spawn(async move {
        for chunk in wire.chunks(chunk_size) {
            writer.write_all(chunk).await.unwrap();
            writer.flush().await.unwrap();
            // let the reader observe the partial frame
            tokio::task::yield_now().await;
        }
    });

    let mut framed = FramedRead::new(reader, CommandCodec::new());
    let mut decoded = Vec::new();
    while let Some(frame) = framed.next().await {
        decoded.push(frame.unwrap());
    }
    decoded
}

#[tokio::test]
async fn test_byte_by_byte_equals_whole_feed() {
    let commands = sample_commands();
    let wire = encode_all(&commands);

    let whole = decode_stream(wire.clone(), wire.len()).await;
    let trickled = decode_stream(wire, 1).await;

    assert_eq!(whole, commands);
    assert_eq!(trickled, commands);
}

#[tokio::test]
async fn test_awkward_segment_sizes() {
    let commands = sample_commands();
    let wire = encode_all(&commands);

    for chunk_size in [2, 3, 5, 7, 13] {
        let decoded = decode_stream(wire.clone(), chunk_size).await;
        assert_eq!(decoded, commands, "chunk size {chunk_size} broke framing");
    }
}

#[tokio::test]
async fn test_stream_ending_mid_frame_is_an_error() {
    let wire = encode_all(&[Command::Ok { id: 1 }]);
    let truncated = wire[..wire.len() - 2].to_vec();

    let (mut writer, reader) = tokio::io::duplex(64);
    tokio::spawn(async move {
        writer.write_all(&truncated).await.unwrap();
        // writer drops: EOF mid-frame
    });

    let mut framed = FramedRead::new(reader, CommandCodec::new());
    let result = framed.next().await;
    assert!(matches!(result, Some(Err(_))), "got: {result:?}");
}
