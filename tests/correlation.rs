//! Correlation engine contract: exactly one outcome per request, timeout
//! wins over a late response, notifications bypass the pending map.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chat_protocol::client::{ChatClient, RequestOutcome};
use chat_protocol::config::ChatConfig;
use chat_protocol::core::codec::CommandCodec;
use chat_protocol::protocol::command::Command;
use chat_protocol::protocol::types::UserName;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

type ServerSide = Framed<TcpStream, CommandCodec>;

/// A hand-driven peer: accepts one connection and hands the framed stream
/// to the test body.
async fn fake_server() -> (SocketAddr, mpsc::Receiver<ServerSide>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ = tx.send(Framed::new(stream, CommandCodec::new())).await;
    });
    (addr, rx)
}

fn client_config(addr: SocketAddr) -> ChatConfig {
    ChatConfig::default_with_overrides(|c| {
        c.client.address = addr.to_string();
    })
}

#[tokio::test]
async fn test_response_resolves_request() {
    let (addr, mut accepted) = fake_server().await;
    let (client, _notifications) = ChatClient::connect(&client_config(addr)).await.unwrap();
    let mut server = accepted.recv().await.unwrap();

    let request = tokio::spawn(async move {
        client
            .request(Command::GetPendingMessages { id: 5 }, None)
            .await
            .unwrap()
    });

    // the server sees the request and answers with the same id
    let inbound = server.next().await.unwrap().unwrap();
    assert_eq!(inbound, Command::GetPendingMessages { id: 5 });
    server.send(Command::Ok { id: 5 }).await.unwrap();

    match request.await.unwrap() {
        RequestOutcome::Response(cmd) => assert_eq!(cmd, Command::Ok { id: 5 }),
        RequestOutcome::TimedOut => panic!("unexpected timeout"),
    }
}

#[tokio::test]
async fn test_timeout_fires_once_and_late_response_is_dropped() {
    let (addr, mut accepted) = fake_server().await;
    let (client, _notifications) = ChatClient::connect(&client_config(addr)).await.unwrap();
    let mut server = accepted.recv().await.unwrap();

    // server stays silent: the request times out
    let outcome = client
        .request(
            Command::GetPendingMessages { id: 1 },
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RequestOutcome::TimedOut));
    let _ = server.next().await; // drain the request frame

    // a response arriving after the timeout is a late response: silently
    // dropped, and the connection keeps working
    server.send(Command::Ok { id: 1 }).await.unwrap();

    let second = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(Command::GetPendingMessages { id: 2 }, None)
                .await
                .unwrap()
        }
    });
    let inbound = server.next().await.unwrap().unwrap();
    assert_eq!(inbound.id(), 2);
    server.send(Command::Ok { id: 2 }).await.unwrap();

    match second.await.unwrap() {
        RequestOutcome::Response(cmd) => assert_eq!(cmd, Command::Ok { id: 2 }),
        RequestOutcome::TimedOut => panic!("second request should resolve"),
    }
}

#[tokio::test]
async fn test_response_before_timeout_cancels_timer() {
    let (addr, mut accepted) = fake_server().await;
    let (client, _notifications) = ChatClient::connect(&client_config(addr)).await.unwrap();
    let mut server = accepted.recv().await.unwrap();

    let request = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(
                    Command::GetPendingMessages { id: 9 },
                    Some(Duration::from_millis(200)),
                )
                .await
                .unwrap()
        }
    });
    let _ = server.next().await;
    server.send(Command::Ok { id: 9 }).await.unwrap();
    assert!(matches!(
        request.await.unwrap(),
        RequestOutcome::Response(_)
    ));

    // past the original deadline nothing else happens: the next request
    // with the same id is tracked fresh
    tokio::time::sleep(Duration::from_millis(300)).await;
    let request = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(Command::GetPendingMessages { id: 9 }, None)
                .await
                .unwrap()
        }
    });
    let _ = server.next().await;
    server.send(Command::Ok { id: 9 }).await.unwrap();
    assert!(matches!(
        request.await.unwrap(),
        RequestOutcome::Response(_)
    ));
}

#[tokio::test]
async fn test_notifications_bypass_pending_map() {
    let (addr, mut accepted) = fake_server().await;
    let (client, mut notifications) = ChatClient::connect(&client_config(addr)).await.unwrap();
    let mut server = accepted.recv().await.unwrap();

    let request = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(Command::GetPendingMessages { id: 7 }, None)
                .await
                .unwrap()
        }
    });
    let _ = server.next().await;

    // a chat-message notice whose id collides with the outstanding request:
    // classified by type, it must NOT resolve the request
    let notice = Command::AddContactInvite {
        id: 7,
        requester: Some(UserName::new("Alice").unwrap()),
        contact: None,
    };
    server.send(notice.clone()).await.unwrap();
    assert_eq!(notifications.recv().await.unwrap(), notice);

    // the real response still resolves the request afterwards
    server.send(Command::Ok { id: 7 }).await.unwrap();
    match request.await.unwrap() {
        RequestOutcome::Response(cmd) => assert_eq!(cmd, Command::Ok { id: 7 }),
        RequestOutcome::TimedOut => panic!("unexpected timeout"),
    }
}

#[tokio::test]
async fn test_unsolicited_response_is_dropped() {
    let (addr, mut accepted) = fake_server().await;
    let (client, mut notifications) = ChatClient::connect(&client_config(addr)).await.unwrap();
    let mut server = accepted.recv().await.unwrap();

    // an Ok for an id nobody is waiting on
    server.send(Command::Ok { id: 999 }).await.unwrap();

    // neither a notification nor a crash; the connection still works
    let request = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(Command::GetPendingMessages { id: 1 }, None)
                .await
                .unwrap()
        }
    });
    let _ = server.next().await;
    server.send(Command::Ok { id: 1 }).await.unwrap();
    assert!(matches!(
        request.await.unwrap(),
        RequestOutcome::Response(_)
    ));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), notifications.recv())
            .await
            .is_err(),
        "unsolicited response must not surface as a notification"
    );
}

#[tokio::test]
async fn test_fire_and_forget_is_untracked() {
    let (addr, mut accepted) = fake_server().await;
    let (client, _notifications) = ChatClient::connect(&client_config(addr)).await.unwrap();
    let mut server = accepted.recv().await.unwrap();

    client.send(Command::Exit { id: 3 }).await.unwrap();
    let inbound = server.next().await.unwrap().unwrap();
    assert_eq!(inbound, Command::Exit { id: 3 });
}
