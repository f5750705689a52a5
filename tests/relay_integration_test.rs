//! Relay Client Integration Tests
//!
//! Runs `RelayClient` over a real `WsTransport` against an in-process
//! WebSocket relay. These tests verify:
//! - Requests are answered by correlation id, regardless of reply order
//! - Host events pushed on the same socket reach subscribers
//! - Malformed frames from the relay do not break the connection
//! - Closing the socket fails outstanding requests
//! - A socket dropped right after the handshake ends in a down state
//! - Concurrent connects dial the relay only once

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use signer_relay::{ConnectionState, RelayClient, RelayError, WsTransport};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// How the fake relay treats each request it receives.
#[derive(Clone, Copy)]
enum Behaviour {
    /// Reply `OK`, except `Fail` for sessions named "forbidden".
    Answer,
    /// Buffer two requests, then answer them in reverse order.
    AnswerReversed,
    /// Never reply; close the socket after the first request.
    CloseOnRequest,
    /// Complete the handshake, then drop the socket immediately.
    DropAfterHandshake,
}

/// Start a one-connection relay on a random port. Returns its ws:// URL.
async fn spawn_relay(behaviour: Behaviour) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        if matches!(behaviour, Behaviour::DropAfterHandshake) {
            drop(ws);
            return;
        }
        let mut held: Vec<Value> = Vec::new();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let request: Value = serde_json::from_str(&text).unwrap();

            match behaviour {
                Behaviour::Answer => {
                    // Noise first: the client must survive it
                    ws.send(Message::Text("{\"type\":\"Unknown\"}".into()))
                        .await
                        .unwrap();
                    let kind = if request["sessionId"] == "forbidden" {
                        "Fail"
                    } else {
                        "OK"
                    };
                    let reply = json!({"type": kind, "id": request["id"], "sessionId": request["sessionId"]});
                    ws.send(Message::Text(reply.to_string().into())).await.unwrap();

                    if request["type"] == "JoinSession" {
                        let event = json!({
                            "type": "Event",
                            "sessionId": request["sessionId"],
                            "eventId": "evt-1",
                            "event": "Web3Request",
                            "data": {"data": "ciphertext"},
                        });
                        ws.send(Message::Text(event.to_string().into())).await.unwrap();
                    }
                }
                Behaviour::AnswerReversed => {
                    held.push(request);
                    if held.len() == 2 {
                        for request in held.drain(..).rev() {
                            let reply = json!({"type": "OK", "id": request["id"]});
                            ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                        }
                    }
                }
                Behaviour::CloseOnRequest => {
                    ws.close(None).await.unwrap();
                    break;
                }
                Behaviour::DropAfterHandshake => unreachable!(),
            }
        }
    });

    format!("ws://{addr}/ws")
}

async fn connected_client(behaviour: Behaviour) -> RelayClient<WsTransport> {
    let url = spawn_relay(behaviour).await;
    let client = RelayClient::builder(WsTransport::new(&url, Vec::new()))
        .request_timeout(Duration::from_secs(5))
        .build();
    client.connect().await.unwrap();
    assert_eq!(
        *client.connection_states().borrow(),
        ConnectionState::Connected
    );
    client
}

#[tokio::test]
async fn test_join_session_and_receive_host_event() {
    let client = connected_client(Behaviour::Answer).await;
    let mut events = client.subscribe_events();

    assert_eq!(client.join_session("session-1", "key").await, Ok(true));

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.session_id, "session-1");
    assert_eq!(event.event_name, "Web3Request");
    assert_eq!(event.payload, json!({"data": "ciphertext"}));
    assert_eq!(client.pending_requests(), 0);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_fail_reply_maps_to_false() {
    let client = connected_client(Behaviour::Answer).await;
    assert_eq!(client.set_metadata("forbidden", "k", "v").await, Ok(false));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_all_request_kinds_round_trip() {
    let client = connected_client(Behaviour::Answer).await;
    let metadata = HashMap::from([("name".to_string(), "Wallet".to_string())]);
    let data = HashMap::from([("data".to_string(), "0x01".to_string())]);

    assert_eq!(client.join_session("s", "k").await, Ok(true));
    assert_eq!(client.set_metadata("s", "k", "v").await, Ok(true));
    assert_eq!(
        client
            .set_session_config("s", "wh", "https://hooks.example.com", metadata)
            .await,
        Ok(true)
    );
    assert_eq!(client.publish_event("s", "Web3Response", data).await, Ok(true));
    assert_eq!(client.last_request_id(), 4);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_replies_out_of_order_match_by_id() {
    let client = connected_client(Behaviour::AnswerReversed).await;

    let (a, b) = tokio::join!(
        client.join_session("a", "k"),
        client.set_metadata("b", "k", "v")
    );
    assert_eq!(a, Ok(true));
    assert_eq!(b, Ok(true));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_socket_close_fails_outstanding_request() {
    let client = connected_client(Behaviour::CloseOnRequest).await;

    let result = client.join_session("s", "k").await;
    assert_eq!(result, Err(RelayError::ConnectionClosed));
    assert_eq!(client.pending_requests(), 0);
    assert!(client.connection_states().borrow().is_down());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_dropped_after_handshake_ends_down() {
    for _ in 0..20 {
        let url = spawn_relay(Behaviour::DropAfterHandshake).await;
        let client = RelayClient::new(WsTransport::new(&url, Vec::new()));
        let mut states = client.connection_states();

        // The handshake may or may not win the race with the drop
        let _ = client.connect().await;

        let state = tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| s.is_down()))
            .await
            .expect("connection state never reported the dropped socket")
            .unwrap()
            .clone();
        assert!(state.is_down());
        assert!(matches!(
            client.join_session("s", "k").await,
            Err(RelayError::Transport(_))
        ));
        assert!(client.connection_states().borrow().is_down());
    }
}

#[tokio::test]
async fn test_concurrent_connect_dials_once() {
    let url = spawn_relay(Behaviour::Answer).await;
    let client = RelayClient::builder(WsTransport::new(&url, Vec::new()))
        .request_timeout(Duration::from_secs(5))
        .build();

    let (first, second) = tokio::join!(client.connect(), client.connect());
    assert_eq!(first, Ok(()));
    assert_eq!(
        second,
        Err(RelayError::Transport("connect already in progress".to_string()))
    );

    // The relay accepts a single connection; the surviving socket serves requests
    assert_eq!(client.join_session("s", "k").await, Ok(true));
    assert_eq!(client.connect().await, Ok(()));
}
