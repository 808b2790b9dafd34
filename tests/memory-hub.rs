// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::time::Duration;

use serde_json::json;

use mqtt_mailbox_tokio::mqtt_mb::transport::MemoryHub;
use mqtt_mailbox_tokio::mqtt_mb::{
    ConnectCode, Connection, ConnectionError, ConnectionOption, JsonCodec, StaticCredentials,
};

mod common;

fn hub_option(topics: &[&str]) -> ConnectionOption {
    ConnectionOption::builder()
        .host("hub.local")
        .topics(topics.iter().map(|t| t.to_string()).collect::<Vec<_>>())
        .poll_interval(Duration::from_millis(100))
        .requeue_jitter_max(Duration::from_millis(10))
        .build()
        .expect("option should build")
}

#[tokio::test]
async fn test_hub_routes_between_endpoints() {
    common::init_tracing();

    let hub = MemoryHub::new();
    let receiver = Connection::new(hub.endpoint(), hub_option(&["telemetry"])).unwrap();
    let sender = Connection::new(hub.endpoint(), hub_option(&[])).unwrap();
    assert!(receiver.start().await.unwrap().is_accepted());
    assert!(sender.start().await.unwrap().is_accepted());

    sender
        .send("telemetry", &json!({"c": 20.5}))
        .await
        .unwrap();

    let inbound = receiver
        .receive_next("telemetry")
        .await
        .unwrap()
        .expect("message should arrive");
    assert_eq!(inbound.topic, "telemetry");
    assert_eq!(inbound.value, json!({"c": 20.5}));

    sender.end().await.unwrap();
    receiver.end().await.unwrap();
}

#[tokio::test]
async fn test_hub_requires_credentials_when_accounts_exist() {
    common::init_tracing();

    let hub = MemoryHub::new();
    hub.require_account("sensor-1", "hunter2");

    // Anonymous connects are refused with the broker's code, not an error.
    let anonymous = Connection::new(hub.endpoint(), hub_option(&["telemetry"])).unwrap();
    let code = anonymous.start().await.unwrap();
    assert_eq!(code, ConnectCode::NotAuthorized);
    assert_eq!(code.raw(), 5);
    anonymous.end().await.unwrap();
    assert!(!anonymous.is_active());
}

#[tokio::test]
async fn test_hub_verdict_depends_on_secret() {
    common::init_tracing();

    let hub = MemoryHub::new();
    hub.require_account("sensor-1", "hunter2");

    let wrong = StaticCredentials::new().add("hub.local", "sensor-1", "guessed");
    let option = ConnectionOption::builder()
        .host("hub.local")
        .user("sensor-1")
        .poll_interval(Duration::from_millis(100))
        .build()
        .expect("option should build");
    let refused =
        Connection::with_credentials(hub.endpoint(), option.clone(), JsonCodec::new(), &wrong)
            .unwrap();
    assert_eq!(
        refused.start().await.unwrap(),
        ConnectCode::BadCredentials
    );
    refused.end().await.unwrap();

    let right = StaticCredentials::new().add("hub.local", "sensor-1", "hunter2");
    let accepted =
        Connection::with_credentials(hub.endpoint(), option, JsonCodec::new(), &right).unwrap();
    assert!(accepted.start().await.unwrap().is_accepted());
    accepted.end().await.unwrap();
}

#[tokio::test]
async fn test_hub_refusal_code_passes_through() {
    common::init_tracing();

    let hub = MemoryHub::new();
    hub.refuse_connects(ConnectCode::ServerUnavailable);

    let connection = Connection::new(hub.endpoint(), hub_option(&[])).unwrap();
    let code = connection.start().await.unwrap();
    assert_eq!(code, ConnectCode::ServerUnavailable);
    assert_eq!(code.raw(), 3);
    connection.end().await.unwrap();
}

#[tokio::test]
async fn test_hub_grant_override_refuses_registered_subscription() {
    common::init_tracing();

    let hub = MemoryHub::new();
    hub.grant_only(vec![0x80]);

    let connection = Connection::new(hub.endpoint(), hub_option(&["telemetry"])).unwrap();
    match connection.start().await {
        Err(ConnectionError::SubscriptionRefused { granted }) => {
            assert_eq!(granted, vec![0x80]);
        }
        other => panic!("expected a refused subscription, got {other:?}"),
    }
    connection.end().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribed_topic_stops_delivering() {
    common::init_tracing();

    let hub = MemoryHub::new();
    let receiver = Connection::new(hub.endpoint(), hub_option(&["telemetry"])).unwrap();
    let sender = Connection::new(hub.endpoint(), hub_option(&[])).unwrap();
    assert!(receiver.start().await.unwrap().is_accepted());
    assert!(sender.start().await.unwrap().is_accepted());

    sender.send("telemetry", &json!(1)).await.unwrap();
    assert!(receiver
        .receive_next("telemetry")
        .await
        .unwrap()
        .is_some());

    receiver.unsubscribe(&["telemetry"]).await.unwrap();
    sender.send("telemetry", &json!(2)).await.unwrap();

    let nothing = receiver
        .receive_next_within("telemetry", Duration::from_millis(300))
        .await
        .unwrap();
    assert_eq!(nothing, None);

    sender.end().await.unwrap();
    receiver.end().await.unwrap();
}
