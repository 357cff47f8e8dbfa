//! # Protocol Flows
//!
//! Processes every inbound command against the session's authentication
//! state and the store, producing at most one reply for the requester and,
//! for the contact and messaging protocols, at most one notice for a peer
//! connection found in the registry.
//!
//! The dispatch is an exhaustive match over the closed command set. While
//! the session is unauthenticated everything except CreateAccount, Login,
//! and Exit is rejected with `NOT_LOGGED_IN`. Decodable commands with no
//! server flow (responses, ChangePassword) get `BAD_REQUEST`.

use crate::protocol::command::{Command, WireErrorCode};
use crate::protocol::types::{ContactInfo, ContactState, MessageInfo, UserId, UserInfo, UserName};
use crate::server::session::{with_store, Session};
use crate::store::StoreError;
use tracing::{error, info};

/// What the session task should do after a command was processed.
pub(crate) enum Action {
    /// Write this reply to the requester
    Reply(Command),
    /// Nothing to write (ShutdownServer has no reply)
    None,
    /// Close the connection without a reply (Exit)
    Close,
}

/// Process one inbound command.
pub(crate) async fn process(cmd: Command, session: &mut Session) -> Action {
    match cmd {
        Command::CreateAccount {
            id,
            username,
            password,
        } => create_account(session, id, username, password).await,
        Command::Login {
            id,
            username,
            password,
        } => login(session, id, username, password).await,
        Command::Exit { .. } => exit(session).await,

        // everything below requires an authenticated session
        cmd if session.user.is_none() => Action::Reply(Command::Error {
            id: cmd.id(),
            code: WireErrorCode::NotLoggedIn,
            description: None,
        }),

        Command::Logout { id } => logout(session, id).await,
        Command::AddContactInvite { id, contact, .. } => {
            add_contact_invite(session, id, contact).await
        }
        Command::AddContactResponse {
            id,
            requester,
            accepted,
            ..
        } => add_contact_response(session, id, requester, accepted).await,
        Command::RemoveContact { id, contact } => remove_contact(session, id, contact).await,
        Command::GetContactOfUsers { id, state } => {
            get_contact_of_users(session, id, state).await
        }
        Command::ChatMessage { id, message } => chat_message(session, id, message).await,
        Command::GetPendingMessages { id } => get_pending_messages(session, id).await,
        Command::ShutdownServer { id } => shutdown(session, id),

        other => Action::Reply(Command::Error {
            id: other.id(),
            code: WireErrorCode::BadRequest,
            description: Some(format!("unknown command: tag {}", other.tag())),
        }),
    }
}

async fn create_account(
    session: &mut Session,
    id: i32,
    username: UserName,
    password: String,
) -> Action {
    let result = with_store(&session.store, move |s| {
        s.persist_user(UserInfo::new(None, username, password))
    })
    .await;
    match result {
        Ok(user) => {
            info!(user = %user.name, "account created");
            reply_ok(id)
        }
        Err(StoreError::AlreadyExists(_)) => {
            info!("user already exists");
            Action::Reply(Command::Error {
                id,
                code: WireErrorCode::UserAlreadyExists,
                description: None,
            })
        }
        Err(e) => internal_error(id, e),
    }
}

async fn login(session: &mut Session, id: i32, username: UserName, password: String) -> Action {
    if let Some(user) = &session.user {
        // idempotent short-circuit: no credential re-check
        info!(user = %user.name, "user already logged in");
        return reply_ok(id);
    }

    let lookup = username.clone();
    let found = with_store(&session.store, move |s| s.get_user_by_name(&lookup)).await;
    let user = match found {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_credentials(id),
        Err(e) => return internal_error(id, e),
    };
    // passwords are opaque secrets compared byte for byte
    if user.password.as_bytes() != password.as_bytes() {
        return invalid_credentials(id);
    }

    session
        .registry
        .register(user.name.clone(), session.handle.clone())
        .await;
    session.user = Some(user);
    reply_ok(id)
}

async fn logout(session: &mut Session, id: i32) -> Action {
    let user = current_user(session).clone();
    session.registry.unregister(&user.name).await;
    session.user = None;
    info!(user = %user.name, "user logged out (still connected)");
    reply_ok(id)
}

async fn exit(session: &mut Session) -> Action {
    if let Some(user) = session.user.take() {
        session.registry.unregister(&user.name).await;
        info!(user = %user.name, "user logged out (connection closing)");
    }
    Action::Close
}

async fn add_contact_invite(
    session: &mut Session,
    id: i32,
    contact: Option<UserName>,
) -> Action {
    let Some(contact_name) = contact else {
        return bad_request(id, "add contact request must have a non-empty contact name");
    };

    // verify the contact exists
    let lookup = contact_name.clone();
    let contact_user = match with_store(&session.store, move |s| s.get_user_by_name(&lookup)).await
    {
        Ok(Some(user)) => user,
        Ok(None) => return bad_request(id, format!("contact does not exist: {contact_name}")),
        Err(e) => return internal_error(id, e),
    };

    // an existing entry in any state means nothing to do
    let mut requester = current_user(session).clone();
    if requester.contact(&contact_name).is_some() {
        return reply_ok(id);
    }

    // persist the invitation
    requester
        .contacts
        .push(ContactInfo::new(contact_user, ContactState::Pending));
    let persisted = match with_store(&session.store, move |s| s.persist_user(requester)).await {
        Ok(user) => user,
        Err(e) => return internal_error(id, e),
    };

    // contact currently connected: deliver the invite as a notice
    if let Some(peer) = session.registry.find(&contact_name).await {
        peer.deliver(Command::AddContactInvite {
            id: session.notif_ids.next_id(),
            requester: Some(persisted.name.clone()),
            contact: None,
        });
    }

    session.user = Some(persisted);
    reply_ok(id)
}

async fn add_contact_response(
    session: &mut Session,
    id: i32,
    requester: Option<UserName>,
    accepted: bool,
) -> Action {
    let Some(requester_name) = requester else {
        return bad_request(id, "invite response must have a non-empty requester user name");
    };

    // verify the invite requester exists
    let lookup = requester_name.clone();
    let mut requester_user =
        match with_store(&session.store, move |s| s.get_user_by_name(&lookup)).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return bad_request(
                    id,
                    format!("invite response requester does not exist: {requester_name}"),
                )
            }
            Err(e) => return internal_error(id, e),
        };

    // verify there is a pending invitation toward the current user
    let mut invitee = current_user(session).clone();
    let pending = requester_user
        .contact(&invitee.name)
        .filter(|entry| entry.state == ContactState::Pending)
        .cloned();
    let Some(pending) = pending else {
        return bad_request(id, "no pending add contact request for this requester");
    };

    requester_user
        .contacts
        .retain(|c| c.contact.name != invitee.name);
    if accepted {
        // mutual linkage: each side gets a CONTACT entry for the other
        requester_user
            .contacts
            .push(ContactInfo::new(pending.contact, ContactState::Contact));
        invitee.contacts.retain(|c| c.contact.name != requester_name);
        invitee.contacts.push(ContactInfo::new(
            UserInfo::new(
                requester_user.id,
                requester_user.name.clone(),
                requester_user.password.clone(),
            ),
            ContactState::Contact,
        ));
    }

    // persist both sides
    let requester_copy = requester_user.clone();
    if let Err(e) = with_store(&session.store, move |s| {
        s.persist_user(requester_copy).map(|_| ())
    })
    .await
    {
        return internal_error(id, e);
    }
    let invitee_copy = invitee.clone();
    let persisted = match with_store(&session.store, move |s| s.persist_user(invitee_copy)).await {
        Ok(user) => user,
        Err(e) => return internal_error(id, e),
    };

    // requester connected: forward the answer, reusing this request's id
    if let Some(peer) = session.registry.find(&requester_name).await {
        peer.deliver(Command::AddContactResponse {
            id,
            requester: None,
            contact: Some(persisted.name.clone()),
            accepted,
        });
    }

    session.user = Some(persisted);
    reply_ok(id)
}

async fn remove_contact(session: &mut Session, id: i32, contact: Option<UserName>) -> Action {
    let Some(contact_name) = contact else {
        return bad_request(id, "remove contact request must have a non-empty contact name");
    };

    let mut user = current_user(session).clone();
    let before = user.contacts.len();
    user.contacts.retain(|c| c.contact.name != contact_name);
    if user.contacts.len() == before {
        // removing an absent contact is a no-op
        return reply_ok(id);
    }

    let persisted = match with_store(&session.store, move |s| s.persist_user(user)).await {
        Ok(user) => user,
        Err(e) => return internal_error(id, e),
    };
    session.user = Some(persisted);
    reply_ok(id)
}

async fn get_contact_of_users(session: &mut Session, id: i32, state: ContactState) -> Action {
    let user_id = current_user_id(session);
    let holders =
        match with_store(&session.store, move |s| s.get_contact_of_users(user_id, state)).await {
            Ok(holders) => holders,
            Err(e) => return internal_error(id, e),
        };

    let requesters = holders
        .into_iter()
        .filter(|entry| entry.state == ContactState::Pending)
        .map(|entry| entry.contact.name)
        .collect();
    Action::Reply(Command::GetContactOfUsersResponse { id, requesters })
}

async fn chat_message(session: &mut Session, id: i32, message: MessageInfo) -> Action {
    let Some(recipient_name) = message.recipient.clone() else {
        return bad_request(id, "chat message must have a non-empty recipient name");
    };

    // verify the recipient exists
    let lookup = recipient_name.clone();
    let recipient = match with_store(&session.store, move |s| s.get_user_by_name(&lookup)).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return bad_request(id, format!("recipient does not exist: {recipient_name}"))
        }
        Err(e) => return internal_error(id, e),
    };

    let sender = current_user(session).clone();
    if let Some(peer) = session.registry.find(&recipient_name).await {
        // recipient connected: forward live, sender filled in, recipient
        // cleared; nothing is persisted
        let notice = match MessageInfo::new(Some(sender.name.clone()), None, message.text()) {
            Ok(notice) => notice,
            Err(e) => return bad_request(id, e.to_string()),
        };
        peer.deliver(Command::ChatMessage {
            id: session.notif_ids.next_id(),
            message: notice,
        });
    } else {
        // recipient offline: queue for a later GetPendingMessages
        let sender_id = current_user_id(session);
        let recipient_id = stored_id(&recipient);
        let text = message.text().to_owned();
        if let Err(e) = with_store(&session.store, move |s| {
            s.insert_message(sender_id, recipient_id, &text)
        })
        .await
        {
            return internal_error(id, e);
        }
    }
    reply_ok(id)
}

async fn get_pending_messages(session: &mut Session, id: i32) -> Action {
    let user_id = current_user_id(session);
    // read then clear: two store calls, not atomic; a crash between them
    // redelivers on retry
    let messages = match with_store(&session.store, move |s| s.get_messages(user_id)).await {
        Ok(messages) => messages,
        Err(e) => return internal_error(id, e),
    };
    if let Err(e) = with_store(&session.store, move |s| s.delete_messages_for(user_id)).await {
        return internal_error(id, e);
    }
    Action::Reply(Command::GetPendingMessagesResponse { id, messages })
}

fn shutdown(session: &mut Session, id: i32) -> Action {
    info!(id, "server shutdown requested");
    // signal from a separate task: this connection's own context is part of
    // the drain sequence and must not wait on itself
    let shutdown = session.shutdown.clone();
    tokio::spawn(async move {
        let _ = shutdown.send(()).await;
    });
    Action::None
}

/// The authenticated user. Only called on flows behind the login gate.
fn current_user(session: &Session) -> &UserInfo {
    session
        .user
        .as_ref()
        .expect("command handled past the login gate")
}

fn current_user_id(session: &Session) -> UserId {
    stored_id(current_user(session))
}

fn stored_id(user: &UserInfo) -> UserId {
    user.id.expect("stored user always has an id")
}

fn reply_ok(id: i32) -> Action {
    Action::Reply(Command::Ok { id })
}

fn bad_request(id: i32, description: impl Into<String>) -> Action {
    Action::Reply(Command::Error {
        id,
        code: WireErrorCode::BadRequest,
        description: Some(description.into()),
    })
}

fn invalid_credentials(id: i32) -> Action {
    Action::Reply(Command::Error {
        id,
        code: WireErrorCode::InvalidUserOrPass,
        description: None,
    })
}

fn internal_error(id: i32, e: StoreError) -> Action {
    error!(error = %e, "internal error");
    Action::Reply(Command::Error {
        id,
        code: WireErrorCode::InternalError,
        description: Some(e.to_string()),
    })
}
