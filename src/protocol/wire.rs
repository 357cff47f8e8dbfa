//! # Command Wire Layouts
//!
//! Per-variant encode/decode delegates. [`encode_command`] writes the
//! command-type tag byte and then the variant's record;
//! [`decode_body`] dispatches on a tag already read by the frame layer and
//! reconstructs the variant from its record. The dispatch is an exhaustive
//! `match` over the closed tag set, so adding a variant without a layout
//! fails to compile.
//!
//! List-valued response fields ride in single string fields: contact names
//! are comma-joined directly (a name must never contain a comma), message
//! texts are Base64-encoded before joining so embedded commas and newlines
//! survive.

use crate::core::record::{RecordBuilder, RecordReader};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::{tags, Command, WireErrorCode};
use crate::protocol::types::{ContactState, MessageInfo, UserName};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::{Buf, BufMut, BytesMut};

/// Encode `cmd` as tag byte + record (length field + typed fields).
///
/// # Panics
/// A `GetPendingMessagesResponse` message without a sender is a broken
/// internal invariant (the server fills senders in) and aborts the task.
pub fn encode_command(cmd: &Command, out: &mut BytesMut) {
    out.put_u8(cmd.tag());
    let mut rec = RecordBuilder::new();
    rec.add_i32(cmd.id());
    match cmd {
        Command::CreateAccount {
            username, password, ..
        }
        | Command::Login {
            username, password, ..
        } => {
            rec.add_string(Some(username.as_str()))
                .add_string(Some(password));
        }
        Command::ChangePassword {
            username,
            old_password,
            new_password,
            ..
        } => {
            rec.add_string(Some(username.as_str()))
                .add_string(Some(old_password))
                .add_string(Some(new_password));
        }
        Command::Logout { .. }
        | Command::Exit { .. }
        | Command::GetPendingMessages { .. }
        | Command::ShutdownServer { .. }
        | Command::Ok { .. } => {
            // id-only record
        }
        Command::AddContactInvite {
            requester, contact, ..
        } => {
            rec.add_string(requester.as_ref().map(UserName::as_str))
                .add_string(contact.as_ref().map(UserName::as_str));
        }
        Command::AddContactResponse {
            requester,
            contact,
            accepted,
            ..
        } => {
            rec.add_string(requester.as_ref().map(UserName::as_str))
                .add_string(contact.as_ref().map(UserName::as_str))
                .add_bool(*accepted);
        }
        Command::RemoveContact { contact, .. } => {
            rec.add_string(contact.as_ref().map(UserName::as_str));
        }
        Command::GetContactOfUsers { state, .. } => {
            rec.add_byte(state.id());
        }
        Command::GetContactOfUsersResponse { requesters, .. } => {
            rec.add_string(Some(&join_names(requesters)));
        }
        Command::ChatMessage { message, .. } => {
            rec.add_string(message.sender.as_ref().map(UserName::as_str))
                .add_string(message.recipient.as_ref().map(UserName::as_str))
                .add_string(Some(message.text()));
        }
        Command::GetPendingMessagesResponse { messages, .. } => {
            let senders: Vec<&str> = messages
                .iter()
                .map(|m| {
                    m.sender
                        .as_ref()
                        .map(UserName::as_str)
                        .expect("pending message without sender")
                })
                .collect();
            let texts: Vec<String> = messages
                .iter()
                .map(|m| BASE64.encode(m.text().as_bytes()))
                .collect();
            rec.add_string(Some(&senders.join(",")))
                .add_string(Some(&texts.join(",")));
        }
        Command::Error {
            code, description, ..
        } => {
            rec.add_byte(code.id())
                .add_string(description.as_deref());
        }
    }
    rec.write_to(out);
}

/// Decode a command body whose tag byte has already been consumed.
///
/// Returns `Ok(None)` for an unrecognized tag: the caller drops the frame
/// and keeps the connection (forward-compatible, ignore unknown). Every
/// other failure is an error.
pub fn decode_body(tag: u8, buf: &mut impl Buf) -> Result<Option<Command>> {
    let mut rec = match tag {
        tags::CREATE_ACCOUNT
        | tags::CHANGE_PASSWORD
        | tags::LOGIN
        | tags::LOGOUT
        | tags::EXIT
        | tags::ADD_CONTACT_INVITE
        | tags::ADD_CONTACT_RESPONSE
        | tags::REMOVE_CONTACT
        | tags::GET_CONTACT_OF_USERS
        | tags::GET_CONTACT_OF_USERS_RESPONSE
        | tags::CHAT_MESSAGE
        | tags::GET_PENDING_MESSAGES
        | tags::GET_PENDING_MESSAGES_RESPONSE
        | tags::SHUTDOWN_SERVER
        | tags::OK
        | tags::ERROR => RecordReader::read_from(buf)?,
        _ => return Ok(None),
    };

    let id = rec.read_i32()?;
    let cmd = match tag {
        tags::CREATE_ACCOUNT => Command::CreateAccount {
            id,
            username: UserName::new(require_string(&mut rec)?)?,
            password: require_string(&mut rec)?,
        },
        tags::CHANGE_PASSWORD => Command::ChangePassword {
            id,
            username: UserName::new(require_string(&mut rec)?)?,
            old_password: require_string(&mut rec)?,
            new_password: require_string(&mut rec)?,
        },
        tags::LOGIN => Command::Login {
            id,
            username: UserName::new(require_string(&mut rec)?)?,
            password: require_string(&mut rec)?,
        },
        tags::LOGOUT => Command::Logout { id },
        tags::EXIT => Command::Exit { id },
        tags::ADD_CONTACT_INVITE => Command::AddContactInvite {
            id,
            requester: optional_name(&mut rec)?,
            contact: optional_name(&mut rec)?,
        },
        tags::ADD_CONTACT_RESPONSE => Command::AddContactResponse {
            id,
            requester: optional_name(&mut rec)?,
            contact: optional_name(&mut rec)?,
            accepted: rec.read_bool()?,
        },
        tags::REMOVE_CONTACT => Command::RemoveContact {
            id,
            contact: optional_name(&mut rec)?,
        },
        tags::GET_CONTACT_OF_USERS => Command::GetContactOfUsers {
            id,
            state: ContactState::for_id(rec.read_byte()?)?,
        },
        tags::GET_CONTACT_OF_USERS_RESPONSE => Command::GetContactOfUsersResponse {
            id,
            requesters: split_names(&require_string(&mut rec)?)?,
        },
        tags::CHAT_MESSAGE => {
            let sender = optional_name(&mut rec)?;
            let recipient = optional_name(&mut rec)?;
            let text = require_string(&mut rec)?;
            Command::ChatMessage {
                id,
                message: MessageInfo::new(sender, recipient, text)?,
            }
        }
        tags::GET_PENDING_MESSAGES => Command::GetPendingMessages { id },
        tags::GET_PENDING_MESSAGES_RESPONSE => {
            let senders = split_names(&require_string(&mut rec)?)?;
            let texts = split_base64_texts(&require_string(&mut rec)?)?;
            if senders.len() != texts.len() {
                return Err(ProtocolError::MalformedRecord(String::from(
                    constants::ERR_LIST_SIZE_MISMATCH,
                )));
            }
            let messages = senders
                .into_iter()
                .zip(texts)
                .map(|(sender, text)| MessageInfo::new(Some(sender), None, text))
                .collect::<Result<Vec<_>>>()?;
            Command::GetPendingMessagesResponse { id, messages }
        }
        tags::SHUTDOWN_SERVER => Command::ShutdownServer { id },
        tags::OK => Command::Ok { id },
        tags::ERROR => Command::Error {
            id,
            code: WireErrorCode::for_id(rec.read_byte()?)?,
            description: rec.read_string()?,
        },
        _ => unreachable!("tag already filtered"),
    };
    Ok(Some(cmd))
}

fn require_string(rec: &mut RecordReader) -> Result<String> {
    rec.read_string()?.ok_or_else(|| {
        ProtocolError::MalformedRecord(String::from("unexpected null string field"))
    })
}

fn optional_name(rec: &mut RecordReader) -> Result<Option<UserName>> {
    rec.read_string()?.map(UserName::new).transpose()
}

fn join_names(names: &[UserName]) -> String {
    names
        .iter()
        .map(UserName::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn split_names(joined: &str) -> Result<Vec<UserName>> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(UserName::new)
        .collect()
}

fn split_base64_texts(joined: &str) -> Result<Vec<String>> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|b64| {
            let raw = BASE64
                .decode(b64)
                .map_err(|e| ProtocolError::MalformedRecord(format!("invalid Base64: {e}")))?;
            String::from_utf8(raw)
                .map_err(|e| ProtocolError::MalformedRecord(format!("invalid UTF-8: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn roundtrip(cmd: &Command) -> Command {
        let mut wire = BytesMut::new();
        encode_command(cmd, &mut wire);
        let tag = wire.get_u8();
        decode_body(tag, &mut wire)
            .unwrap()
            .expect("known tag must decode")
    }

    fn name(s: &str) -> UserName {
        UserName::new(s).unwrap()
    }

    #[test]
    fn test_every_variant_roundtrips() {
        let commands = vec![
            Command::CreateAccount {
                id: 1,
                username: name("Alice"),
                password: String::from("secret"),
            },
            Command::ChangePassword {
                id: 2,
                username: name("Alice"),
                old_password: String::from("old"),
                new_password: String::from("new"),
            },
            Command::Login {
                id: 7,
                username: name("Bob"),
                password: String::from("mypass"),
            },
            Command::Logout { id: 3 },
            Command::Exit { id: 4 },
            Command::AddContactInvite {
                id: 5,
                requester: None,
                contact: Some(name("Bob")),
            },
            Command::AddContactResponse {
                id: 6,
                requester: Some(name("Alice")),
                contact: None,
                accepted: true,
            },
            Command::RemoveContact {
                id: 8,
                contact: Some(name("Bob")),
            },
            Command::GetContactOfUsers {
                id: 9,
                state: ContactState::Pending,
            },
            Command::GetContactOfUsersResponse {
                id: 10,
                requesters: vec![name("Alice"), name("Carol")],
            },
            Command::ChatMessage {
                id: 11,
                message: MessageInfo::new(None, Some(name("Bob")), "hi there").unwrap(),
            },
            Command::GetPendingMessages { id: 12 },
            Command::GetPendingMessagesResponse {
                id: 13,
                messages: vec![
                    MessageInfo::new(Some(name("Alice")), None, "hello, with comma").unwrap(),
                    MessageInfo::new(Some(name("Carol")), None, "line\nbreak").unwrap(),
                ],
            },
            Command::ShutdownServer { id: 14 },
            Command::Ok { id: 15 },
            Command::Error {
                id: 16,
                code: WireErrorCode::InvalidUserOrPass,
                description: Some(String::from("nope")),
            },
            Command::Error {
                id: 17,
                code: WireErrorCode::BadRequest,
                description: None,
            },
        ];

        for cmd in &commands {
            assert_eq!(&roundtrip(cmd), cmd, "variant failed: {cmd:?}");
        }
    }

    #[test]
    fn test_unknown_tag_is_skipped_not_fatal() {
        let mut wire = BytesMut::new();
        // the retired tag 5 followed by an empty record
        wire.extend_from_slice(&[5, 0, 0, 0, 0]);
        let tag = wire.get_u8();
        assert!(decode_body(tag, &mut wire).unwrap().is_none());
    }

    #[test]
    fn test_message_texts_survive_commas_and_newlines() {
        let cmd = Command::GetPendingMessagesResponse {
            id: 1,
            messages: vec![MessageInfo::new(Some(name("A")), None, "a,b\nc,d").unwrap()],
        };
        match roundtrip(&cmd) {
            Command::GetPendingMessagesResponse { messages, .. } => {
                assert_eq!(messages[0].text(), "a,b\nc,d");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_empty_requester_list_roundtrips() {
        let cmd = Command::GetContactOfUsersResponse {
            id: 2,
            requesters: vec![],
        };
        assert_eq!(roundtrip(&cmd), cmd);
    }

    #[test]
    fn test_sender_text_size_mismatch_rejected() {
        // two senders, one text
        let mut wire = BytesMut::new();
        let mut rec = RecordBuilder::new();
        rec.add_i32(1)
            .add_string(Some("Alice,Bob"))
            .add_string(Some(&BASE64.encode("only one")));
        rec.write_to(&mut wire);
        assert!(decode_body(tags::GET_PENDING_MESSAGES_RESPONSE, &mut wire).is_err());
    }

    #[test]
    fn test_null_username_in_login_rejected() {
        let mut wire = BytesMut::new();
        let mut rec = RecordBuilder::new();
        rec.add_i32(1).add_string(None).add_string(Some("pw"));
        rec.write_to(&mut wire);
        assert!(decode_body(tags::LOGIN, &mut wire).is_err());
    }
}
