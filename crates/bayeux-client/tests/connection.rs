use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bayeux_client::{
    BayeuxConnection, BayeuxEvent, ClientError, ConnectionOptions, ConnectionState, ResponseHooks,
    ViolationKind,
};
use bayeux_protocol::{BayeuxResponse, Request};
use bayeux_transport::{RecordedTransport, TransportError, TransportRequest, TransportResponse};
use serde_json::{Value, json};
use tokio::sync::broadcast;

fn request_id(request: &TransportRequest) -> String {
    let message: Value = serde_json::from_slice(&request.body).unwrap();
    message["id"].as_str().unwrap().to_string()
}

/// Queues a reply built from the id of the request it answers.
fn reply(transport: &RecordedTransport, build: impl FnOnce(&str) -> Value + Send + 'static) {
    transport.push_with(move |request| {
        Ok(TransportResponse::ok(build(&request_id(request)).to_string()))
    });
}

fn drain(events: &mut broadcast::Receiver<BayeuxEvent>) -> Vec<BayeuxEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn names(events: &[BayeuxEvent]) -> Vec<&'static str> {
    events.iter().map(BayeuxEvent::name).collect()
}

async fn wait_for(events: &mut broadcast::Receiver<BayeuxEvent>, name: &str) -> Vec<BayeuxEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let event = events.recv().await.unwrap();
            let done = event.name() == name;
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"));
    seen
}

async fn handshake(connection: &BayeuxConnection, transport: &RecordedTransport) {
    reply(transport, |id| {
        json!({
            "channel": "/meta/handshake",
            "successful": true,
            "clientId": "abc",
            "id": id,
            "version": "1.0",
            "supportedConnectionTypes": ["long-polling"],
            "advice": {"reconnect": "retry", "interval": 0}
        })
    });
    let response = connection.handshake().await.unwrap().await.unwrap();
    assert!(response.is_successful());
}

async fn connected() -> (BayeuxConnection, Arc<RecordedTransport>) {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());
    handshake(&connection, &transport).await;
    (connection, transport)
}

#[tokio::test]
async fn handshake_success_connects() {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());
    let mut events = connection.events();
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    handshake(&connection, &transport).await;

    assert_eq!(connection.state(), ConnectionState::Connected);
    assert_eq!(connection.client_id().as_deref(), Some("abc"));
    assert_eq!(
        names(&drain(&mut events)),
        vec!["data_received", "connected", "response_received"]
    );

    let sent = transport.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["channel"], "/meta/handshake");
    assert_eq!(sent[0]["id"], "1");
    assert_eq!(sent[0]["version"], "1.0");
    assert_eq!(sent[0]["supportedConnectionTypes"], json!(["long-polling"]));
    assert!(sent[0].get("clientId").is_none());
}

#[tokio::test]
async fn handshake_reply_is_typed() {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());
    reply(&transport, |id| {
        json!({
            "channel": "/meta/handshake",
            "successful": true,
            "clientId": "xyz",
            "id": id,
            "version": "1.0",
            "supportedConnectionTypes": ["long-polling", "callback-polling"],
            "advice": {"reconnect": "retry", "interval": 0, "timeout": 30000}
        })
    });

    let response = connection.handshake().await.unwrap().await.unwrap();
    let BayeuxResponse::Handshake(handshake) = response else {
        panic!("expected handshake response");
    };
    assert_eq!(handshake.version.as_deref(), Some("1.0"));
    assert_eq!(handshake.supported_connection_types.len(), 2);
    assert_eq!(handshake.response.advice.unwrap().timeout, Some(30000));
}

#[tokio::test]
async fn handshake_in_progress_is_connecting() {
    let transport = Arc::new(RecordedTransport::new());
    transport.push_pending().push_pending();
    let connection = BayeuxConnection::new(transport.clone());

    let first = connection.handshake().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Connecting);
    assert!(connection.client_id().is_none());
    sent_at_least(&transport, 1).await;

    // A second handshake replaces the first.
    let second = connection.handshake().await.unwrap();
    assert!(matches!(first.await, Err(ClientError::Cancelled)));
    assert_eq!(connection.state(), ConnectionState::Connecting);
    assert_ne!(second.id(), "1");

    connection.cancel().await.unwrap();
    assert!(matches!(second.await, Err(ClientError::Cancelled)));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn handshake_failure_stays_disconnected() {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());
    let mut events = connection.events();
    reply(&transport, |id| {
        json!([{
            "channel": "/meta/handshake",
            "successful": false,
            "error": "403::Handshake denied",
            "id": id
        }])
    });

    let response = connection.handshake().await.unwrap().await.unwrap();

    assert!(!response.is_successful());
    let error = response.response().error.clone().unwrap();
    assert_eq!(error.code, 403);
    assert_eq!(error.message, "Handshake denied");
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(connection.client_id().is_none());

    let events = names(&drain(&mut events));
    assert!(events.contains(&"connection_failed"));
    assert!(!events.contains(&"connected"));
}

#[tokio::test]
async fn handshake_without_client_id_is_a_violation() {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());
    let mut events = connection.events();
    reply(&transport, |id| {
        json!({"channel": "/meta/handshake", "successful": true, "clientId": "", "id": id})
    });

    let err = connection.handshake().await.unwrap().await.unwrap_err();

    let violation = err.violation().unwrap();
    assert_eq!(violation.kind, ViolationKind::EmptyClientId);
    assert_eq!(violation.request.as_ref().unwrap().channel, "/meta/handshake");
    assert!(violation.response.is_some());
    assert!(violation.raw.contains("\"clientId\":\"\""));
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    let events = names(&drain(&mut events));
    assert!(events.contains(&"connection_failed"));
    assert!(events.contains(&"data_failed"));
}

#[tokio::test]
async fn handshake_transport_failure() {
    let transport = Arc::new(RecordedTransport::new());
    transport.push_failure(TransportError::network("connection refused"));
    let connection = BayeuxConnection::new(transport.clone());
    let mut events = connection.events();

    let err = connection.handshake().await.unwrap().await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert_eq!(
        names(&drain(&mut events)),
        vec!["data_failed", "connection_failed"]
    );
}

#[tokio::test]
async fn handshake_while_connected_fails() {
    let (connection, transport) = connected().await;

    let err = connection.handshake().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::InvalidState {
            operation: "handshake",
            state: ConnectionState::Connected
        }
    ));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn operations_require_connected_state() {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());

    let results = [
        connection.connect().await.map(|_| ()),
        connection.subscribe("/chat").await.map(|_| ()),
        connection.unsubscribe("/chat").await.map(|_| ()),
        connection.publish("/chat", json!(1)).await.map(|_| ()),
        connection
            .send_raw(r#"{"channel":"/chat","data":1}"#)
            .await
            .map(|_| ()),
        connection.disconnect().await.map(|_| ()),
        connection.start_long_polling().await,
    ];

    for result in results {
        assert!(
            matches!(
                result,
                Err(ClientError::InvalidState {
                    state: ConnectionState::Disconnected,
                    ..
                })
            ),
            "unexpected {result:?}"
        );
    }
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn subscribe_tracks_channel() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| {
        json!([{"channel": "/meta/subscribe", "successful": true, "subscription": "/chat/room1", "id": id}])
    });

    let response = connection
        .subscribe("/chat/room1")
        .await
        .unwrap()
        .await
        .unwrap();

    let BayeuxResponse::Subscribe(subscribe) = response else {
        panic!("expected subscribe response");
    };
    assert_eq!(subscribe.subscription(), Some("/chat/room1"));
    assert!(connection.subscribed("/chat/room1"));

    let sent = transport.sent_messages();
    assert_eq!(sent[1]["channel"], "/meta/subscribe");
    assert_eq!(sent[1]["subscription"], "/chat/room1");
    assert_eq!(sent[1]["clientId"], "abc");
    assert_eq!(sent[1]["id"], "2");
}

#[tokio::test]
async fn subscribe_twice_fails_without_sending() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| {
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/chat", "id": id})
    });
    connection.subscribe("/chat").await.unwrap().await.unwrap();
    let sent = transport.sent().len();

    let err = connection.subscribe("/chat").await.unwrap_err();

    assert!(matches!(err, ClientError::AlreadySubscribed(ref c) if c == "/chat"));
    assert_eq!(transport.sent().len(), sent);
}

#[tokio::test]
async fn unsubscribe_requires_subscription() {
    let (connection, transport) = connected().await;

    let err = connection.unsubscribe("/chat").await.unwrap_err();
    assert!(matches!(err, ClientError::NotSubscribed(ref c) if c == "/chat"));
    assert_eq!(transport.sent().len(), 1);

    reply(&transport, |id| {
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/chat", "id": id})
    });
    connection.subscribe("/chat").await.unwrap().await.unwrap();
    reply(&transport, |id| {
        json!({"channel": "/meta/unsubscribe", "successful": true, "subscription": "/chat", "id": id})
    });
    connection.unsubscribe("/chat").await.unwrap().await.unwrap();

    assert!(!connection.subscribed("/chat"));
}

#[tokio::test]
async fn subscriptions_keep_insertion_order() {
    let (connection, transport) = connected().await;
    for channel in ["/b", "/a", "/c"] {
        reply(&transport, move |id| {
            json!({"channel": "/meta/subscribe", "successful": true, "subscription": channel, "id": id})
        });
        connection.subscribe(channel).await.unwrap().await.unwrap();
    }

    assert_eq!(connection.status().subscriptions, vec!["/b", "/a", "/c"]);
}

#[tokio::test]
async fn rejected_subscription_is_not_tracked() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| {
        json!({
            "channel": "/meta/subscribe",
            "successful": false,
            "subscription": "/private",
            "error": "403:/private:Forbidden",
            "id": id
        })
    });

    let response = connection.subscribe("/private").await.unwrap().await.unwrap();

    assert!(!response.is_successful());
    assert!(!connection.subscribed("/private"));
}

#[tokio::test]
async fn pushed_event_on_subscribed_channel() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| {
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/foo/bar", "id": id})
    });
    connection.subscribe("/foo/bar").await.unwrap().await.unwrap();
    let mut events = connection.events();

    reply(&transport, |id| {
        json!([
            {"channel": "/meta/connect", "successful": true, "id": id},
            {"channel": "/foo/bar", "data": {"text": "hello"}}
        ])
    });
    let response = connection.connect().await.unwrap().await.unwrap();

    assert!(matches!(response, BayeuxResponse::Connect(_)));
    let events = drain(&mut events);
    assert_eq!(
        names(&events),
        vec!["data_received", "response_received", "event_received"]
    );
    let BayeuxEvent::EventReceived(notification) = &events[2] else {
        unreachable!()
    };
    assert_eq!(notification.channel(), Some("/foo/bar"));
    assert_eq!(notification.data(), Some(&json!({"text": "hello"})));
    assert_eq!(notification.status, 200);
}

#[tokio::test]
async fn batch_handshake_then_unsubscribed_message() {
    let transport = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::new(transport.clone());
    let mut events = connection.events();
    reply(&transport, |id| {
        json!([
            {"channel": "/meta/handshake", "successful": true, "clientId": "abc", "id": id},
            {"channel": "/foo/bar", "data": {"n": 1}}
        ])
    });

    connection.handshake().await.unwrap().await.unwrap();

    assert_eq!(connection.state(), ConnectionState::Connected);
    assert_eq!(connection.client_id().as_deref(), Some("abc"));
    let events = drain(&mut events);
    assert_eq!(
        names(&events),
        vec![
            "data_received",
            "connected",
            "response_received",
            "response_received"
        ]
    );
    assert_eq!(events[3].notification().channel(), Some("/foo/bar"));
}

#[tokio::test]
async fn meta_channel_mismatch_is_rejected() {
    let (connection, transport) = connected().await;
    let mut events = connection.events();
    reply(&transport, |id| {
        json!({"channel": "/meta/unsubscribe", "successful": true, "subscription": "/chat", "id": id})
    });

    let err = connection.subscribe("/chat").await.unwrap().await.unwrap_err();

    let violation = err.violation().unwrap();
    assert_eq!(violation.kind, ViolationKind::ChannelMismatch);
    assert_eq!(
        violation.request.as_ref().unwrap().subscription(),
        Some("/chat")
    );
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert!(!connection.subscribed("/chat"));
    assert_eq!(
        names(&drain(&mut events)),
        vec!["data_received", "data_failed"]
    );
}

#[tokio::test]
async fn reply_id_mismatch_is_rejected() {
    let (connection, transport) = connected().await;
    transport.push_response(
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/chat", "id": "999"})
            .to_string(),
    );

    let err = connection.subscribe("/chat").await.unwrap().await.unwrap_err();

    assert_eq!(err.violation().unwrap().kind, ViolationKind::IdMismatch);
    assert!(!connection.subscribed("/chat"));
}

#[tokio::test]
async fn bad_message_does_not_stop_the_batch() {
    let (connection, transport) = connected().await;
    let mut events = connection.events();
    reply(&transport, |id| {
        json!([
            {"successful": true},
            {"channel": "/meta/subscribe", "successful": true, "subscription": "/chat", "id": id}
        ])
    });

    connection.subscribe("/chat").await.unwrap().await.unwrap();

    assert!(connection.subscribed("/chat"));
    let events = drain(&mut events);
    assert_eq!(
        names(&events),
        vec!["data_received", "data_failed", "response_received"]
    );
    assert!(events[1].notification().description.contains("no channel"));
}

#[tokio::test]
async fn unparseable_payload_is_reported() {
    let (connection, transport) = connected().await;
    let mut events = connection.events();
    transport.push_response("<html>gateway</html>");

    let err = connection.connect().await.unwrap().await.unwrap_err();

    assert!(matches!(err, ClientError::Format(_)));
    assert_eq!(
        names(&drain(&mut events)),
        vec!["data_received", "data_failed"]
    );

    // The connection keeps working.
    reply(&transport, |id| json!({"channel": "/meta/connect", "successful": true, "id": id}));
    connection.connect().await.unwrap().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn reply_without_answer_is_no_response() {
    let (connection, transport) = connected().await;
    transport.push_response("[]");

    let pending = connection.connect().await.unwrap();
    let id = pending.id().to_string();

    assert!(matches!(pending.await, Err(ClientError::NoResponse(ref i)) if *i == id));
}

#[tokio::test]
async fn http_error_status_is_transport_failure() {
    let (connection, transport) = connected().await;
    let mut events = connection.events();
    transport.push_status(503, "Service Unavailable");

    let err = connection.connect().await.unwrap().await.unwrap_err();

    let ClientError::Transport(err) = err else {
        panic!("expected transport error");
    };
    assert_eq!(err.http_status(), Some(503));
    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["data_failed"]);
    assert_eq!(events[0].notification().status, 503);
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn new_request_cancels_in_flight() {
    let (connection, transport) = connected().await;
    transport.push_pending();
    reply(&transport, |id| json!({"channel": "/meta/connect", "successful": true, "id": id}));

    let first = connection.connect().await.unwrap();
    sent_at_least(&transport, 2).await;
    let second = connection.connect().await.unwrap();

    assert!(matches!(first.await, Err(ClientError::Cancelled)));
    assert!(second.await.unwrap().is_successful());
}

#[tokio::test]
async fn disconnect_clears_session() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| {
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/chat", "id": id})
    });
    connection.subscribe("/chat").await.unwrap().await.unwrap();
    let mut events = connection.events();
    reply(&transport, |id| json!({"channel": "/meta/disconnect", "successful": true, "id": id}));

    connection.disconnect().await.unwrap().await.unwrap();

    let status = connection.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(status.client_id.is_none());
    assert!(status.subscriptions.is_empty());

    let events = drain(&mut events);
    assert_eq!(
        names(&events),
        vec!["data_received", "disconnected", "response_received"]
    );
    assert_eq!(events[1].notification().status, 200);
    assert_eq!(transport.sent_messages()[2]["clientId"], "abc");
}

#[tokio::test]
async fn status_watchers_see_disconnect() {
    let (connection, transport) = connected().await;
    let mut status = connection.watch_status();
    status.borrow_and_update();
    reply(&transport, |id| json!({"channel": "/meta/disconnect", "successful": true, "id": id}));

    connection.disconnect().await.unwrap().await.unwrap();

    assert!(status.has_changed().unwrap());
    assert_eq!(status.borrow_and_update().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn failed_disconnect_still_disconnects() {
    let (connection, transport) = connected().await;
    let mut events = connection.events();
    reply(&transport, |id| {
        json!({"channel": "/meta/disconnect", "successful": false, "error": "402::Unknown client", "id": id})
    });

    let response = connection.disconnect().await.unwrap().await.unwrap();

    assert!(!response.is_successful());
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    let events = drain(&mut events);
    let disconnected = events
        .iter()
        .find(|e| matches!(e, BayeuxEvent::Disconnected(_)))
        .unwrap();
    assert_eq!(disconnected.notification().status, 400);
}

#[tokio::test]
async fn publish_sends_data() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| json!({"channel": "/chat/room1", "successful": true, "id": id}));

    let response = connection
        .publish("/chat/room1", json!({"text": "hi"}))
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(matches!(response, BayeuxResponse::Message(_)));
    assert!(response.is_successful());
    let sent = transport.sent_messages();
    assert_eq!(sent[1]["channel"], "/chat/room1");
    assert_eq!(sent[1]["data"], json!({"text": "hi"}));
    assert_eq!(sent[1]["clientId"], "abc");
}

#[tokio::test]
async fn publish_ack_wins_over_own_echo() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| {
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/chat", "id": id})
    });
    connection.subscribe("/chat").await.unwrap().await.unwrap();
    let mut events = connection.events();
    reply(&transport, |id| {
        json!([
            {"channel": "/chat", "data": {"text": "hi"}},
            {"channel": "/chat", "successful": true, "id": id}
        ])
    });

    let pending = connection.publish("/chat", json!({"text": "hi"})).await.unwrap();
    let id = pending.id().to_string();
    let response = pending.await.unwrap();

    assert!(response.is_successful());
    assert_eq!(response.response().id.as_deref(), Some(id.as_str()));
    let events = names(&drain(&mut events));
    assert_eq!(events.iter().filter(|e| **e == "event_received").count(), 1);
}

#[tokio::test]
async fn id_less_reply_still_answers() {
    let (connection, transport) = connected().await;
    transport.push_response(r#"[{"channel":"/service/x","successful":true}]"#);

    let response = connection
        .publish("/service/x", json!(1))
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(response.is_successful());
    assert!(response.response().id.is_none());
}

#[tokio::test]
async fn publish_rejects_bad_channels() {
    let (connection, transport) = connected().await;

    let err = connection.publish("/chat/*", json!(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::Format(_)));

    let err = connection.publish("/meta/connect", json!(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::Format(_)));

    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn send_raw_fills_in_session() {
    let (connection, transport) = connected().await;
    reply(&transport, |id| json!({"channel": "/service/echo", "successful": true, "id": id}));

    let response = connection
        .send_raw(r#"{"channel":"/service/echo","data":{"a":1},"ext":{"ack":true}}"#)
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(response.is_successful());
    let sent = transport.sent_messages();
    assert_eq!(sent[1]["clientId"], "abc");
    assert_eq!(sent[1]["id"], "2");
    assert_eq!(sent[1]["ext"], json!({"ack": true}));

    assert!(matches!(
        connection.send_raw("[1]").await,
        Err(ClientError::Format(_))
    ));
    assert!(matches!(
        connection.send_raw(r#"{"channel":"bad channel"}"#).await,
        Err(ClientError::Format(_))
    ));
}

#[tokio::test]
async fn send_keeps_caller_id() {
    let (connection, transport) = connected().await;
    transport.push_response(r#"{"channel":"/service/x","successful":true,"id":"custom"}"#);

    let request = Request::publish("/service/x".parse().unwrap(), json!(null)).with_id("custom");
    let pending = connection.send(request).await.unwrap();

    assert_eq!(pending.id(), "custom");
    assert!(pending.await.unwrap().is_successful());
}

struct CountingHooks {
    processed: AtomicUsize,
}

impl ResponseHooks for CountingHooks {
    fn process_response(&self, _request: Option<&Request>, _response: &BayeuxResponse) -> bool {
        self.processed.fetch_add(1, Ordering::SeqCst);
        false
    }
}

#[tokio::test]
async fn hooks_can_suppress_response_notifications() {
    let transport = Arc::new(RecordedTransport::new());
    let hooks = Arc::new(CountingHooks {
        processed: AtomicUsize::new(0),
    });
    let connection = BayeuxConnection::builder(transport.clone())
        .hooks(hooks.clone())
        .spawn();
    let mut events = connection.events();

    handshake(&connection, &transport).await;

    assert_eq!(hooks.processed.load(Ordering::SeqCst), 1);
    assert_eq!(
        names(&drain(&mut events)),
        vec!["data_received", "connected"]
    );
}

fn long_polling_connection(
    retries: u32,
) -> (
    BayeuxConnection,
    Arc<RecordedTransport>,
    Arc<RecordedTransport>,
) {
    let transport = Arc::new(RecordedTransport::new());
    let polling = Arc::new(RecordedTransport::new());
    let connection = BayeuxConnection::builder(transport.clone())
        .long_polling_transport(polling.clone())
        .options(
            ConnectionOptions::default().with_long_polling_retries(retries, Duration::from_millis(50)),
        )
        .spawn();
    (connection, transport, polling)
}

async fn sent_at_least(transport: &RecordedTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while transport.sent().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {count} requests"));
}

#[tokio::test]
async fn long_polling_preconditions() {
    let (connection, transport, _polling) = long_polling_connection(3);
    assert!(matches!(
        connection.start_long_polling().await,
        Err(ClientError::InvalidState { .. })
    ));

    handshake(&connection, &transport).await;
    connection.start_long_polling().await.unwrap();
    assert!(connection.status().long_polling);
    assert!(matches!(
        connection.start_long_polling().await,
        Err(ClientError::LongPollingActive)
    ));

    connection.stop_long_polling().await.unwrap();
    assert!(!connection.status().long_polling);

    let (plain, transport) = connected().await;
    assert!(matches!(
        plain.start_long_polling().await,
        Err(ClientError::LongPollingUnavailable)
    ));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn long_polling_reissues_and_delivers_events() {
    let (connection, transport, polling) = long_polling_connection(3);
    handshake(&connection, &transport).await;
    reply(&transport, |id| {
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/stock/acme", "id": id})
    });
    connection.subscribe("/stock/acme").await.unwrap().await.unwrap();
    let mut events = connection.events();

    reply(&polling, |id| {
        json!([
            {"channel": "/meta/connect", "successful": true, "id": id, "advice": {"reconnect": "retry", "interval": 0}},
            {"channel": "/stock/acme", "data": {"price": 42}}
        ])
    });
    connection.start_long_polling().await.unwrap();

    let seen = wait_for(&mut events, "event_received").await;
    assert_eq!(
        seen.last().unwrap().notification().data(),
        Some(&json!({"price": 42}))
    );
    sent_at_least(&polling, 2).await;

    let polls = polling.sent_messages();
    assert_eq!(polls[0]["channel"], "/meta/connect");
    assert_eq!(polls[0]["connectionType"], "long-polling");
    assert_eq!(polls[0]["clientId"], "abc");
    assert_ne!(polls[0]["id"], polls[1]["id"]);
    assert!(connection.status().long_polling);
}

#[tokio::test(start_paused = true)]
async fn long_polling_gives_up_after_retries() {
    let (connection, transport, polling) = long_polling_connection(3);
    handshake(&connection, &transport).await;
    for _ in 0..3 {
        polling.push_failure(TransportError::network("connection reset"));
    }
    let mut events = connection.events();

    connection.start_long_polling().await.unwrap();
    let seen = wait_for(&mut events, "long_polling_failed").await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let failed = seen
        .iter()
        .chain(drain(&mut events).iter())
        .filter(|e| matches!(e, BayeuxEvent::LongPollingFailed(_)))
        .count();
    assert_eq!(failed, 1);
    assert_eq!(polling.sent().len(), 3);
    assert!(!connection.status().long_polling);
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn long_polling_success_resets_failures() {
    let (connection, transport, polling) = long_polling_connection(3);
    handshake(&connection, &transport).await;
    polling.push_failure(TransportError::timeout("poll timed out"));
    polling.push_failure(TransportError::timeout("poll timed out"));
    reply(&polling, |id| json!([{"channel": "/meta/connect", "successful": true, "id": id}]));
    polling.push_failure(TransportError::timeout("poll timed out"));
    polling.push_failure(TransportError::timeout("poll timed out"));
    let mut events = connection.events();

    connection.start_long_polling().await.unwrap();
    sent_at_least(&polling, 6).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let events = drain(&mut events);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, BayeuxEvent::LongPollingFailed(_)))
    );
    assert!(connection.status().long_polling);
    assert_eq!(polling.sent().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_long_polling() {
    let (connection, transport, polling) = long_polling_connection(3);
    handshake(&connection, &transport).await;
    connection.start_long_polling().await.unwrap();
    sent_at_least(&polling, 1).await;

    reply(&transport, |id| json!({"channel": "/meta/disconnect", "successful": true, "id": id}));
    connection.disconnect().await.unwrap().await.unwrap();

    assert!(!connection.status().long_polling);
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn shutdown_resolves_pending_requests() {
    let (connection, transport) = connected().await;
    transport.push_pending();

    let pending = connection.connect().await.unwrap();
    connection.shutdown().await;

    assert!(matches!(pending.await, Err(ClientError::ConnectionClosed)));
    assert!(matches!(
        connection.connect().await,
        Err(ClientError::ConnectionClosed)
    ));
}
