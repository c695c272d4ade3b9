//! End-to-end tests using a real WebSocket client.

use std::time::Duration;

use chrono::DateTime;
use ews_core::{BroadcastEnvelope, DeviceStatus, Reading, StatusRecord, StoredReading};
use ews_server::{EwsServer, Hub};
use ews_settings::{HubSettings, ServerSettings};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot a server on an ephemeral port and return its WS URL.
async fn boot_server(queue_capacity: usize) -> (String, EwsServer) {
    let (hub, _task) = Hub::spawn(&HubSettings {
        queue_capacity,
        command_buffer: 256,
    });
    let settings = ServerSettings {
        host: "127.0.0.1".into(),
        port: 0,
        write_timeout_secs: 2,
        ..ServerSettings::default()
    };
    let server = EwsServer::new(settings, hub);
    let (addr, _handle) = server.listen().await.unwrap();
    (format!("ws://{addr}/ws"), server)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _resp) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

async fn wait_for_count(hub: &Hub, expected: usize) {
    timeout(TIMEOUT, async {
        while hub.count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("hub count stuck at {}, wanted {expected}", hub.count()));
}

/// Next text frame as JSON, skipping keepalives.
async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

fn stored_reading(id: i64) -> StoredReading {
    StoredReading {
        id,
        created_at: DateTime::from_timestamp_millis(1_700_000_000_500).unwrap(),
        updated_at: DateTime::from_timestamp_millis(1_700_000_000_500).unwrap(),
        reading: Reading {
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            temperature: 25.5,
            humidity: 60.2,
            pressure: 1012.8,
            altitude: 110.0,
            co2: 410.0,
            distance: 42.0,
            wind_speed: 2.5,
            wind_direction: 180.0,
            rainfall: 0.0,
            voltage: 4.9,
            bus_voltage: 5.1,
            current: 95.0,
        },
    }
}

#[tokio::test]
async fn subscriber_receives_sensor_update() {
    let (url, server) = boot_server(16).await;
    let mut ws = connect(&url).await;
    wait_for_count(server.hub(), 1).await;

    let report = server
        .hub()
        .broadcast(&BroadcastEnvelope::SensorUpdate(stored_reading(7)))
        .await
        .unwrap();
    assert_eq!(report.delivered, 1);

    let json = next_json(&mut ws).await;
    assert_eq!(json["event"], "sensor:update");
    assert_eq!(json["data"]["id"], 7);
    assert_eq!(json["data"]["temperature"], 25.5);
    assert_eq!(json["data"]["humidity"], 60.2);
    assert_eq!(json["data"]["windSpeed"], 2.5);
    assert_eq!(json["data"]["timestamp"], "2023-11-14T22:13:20Z");
}

#[tokio::test]
async fn every_subscriber_gets_one_copy_in_order() {
    let (url, server) = boot_server(16).await;
    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(connect(&url).await);
    }
    wait_for_count(server.hub(), 5).await;

    for id in 1..=3 {
        let report = server
            .hub()
            .broadcast(&BroadcastEnvelope::SensorUpdate(stored_reading(id)))
            .await
            .unwrap();
        assert_eq!(report.delivered, 5);
    }

    for ws in &mut clients {
        for id in 1..=3 {
            let json = next_json(ws).await;
            assert_eq!(json["data"]["id"], id);
        }
    }
}

#[tokio::test]
async fn status_envelope_reaches_subscribers() {
    let (url, server) = boot_server(16).await;
    let mut ws = connect(&url).await;
    wait_for_count(server.hub(), 1).await;

    let status = StatusRecord {
        sensor_id: "sensors/ewsbe".into(),
        location: "Bandung".into(),
        calibration_date: "2024-06-01".into(),
        status: DeviceStatus::Offline,
        last_update: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
    };
    let _ = server
        .hub()
        .broadcast(&BroadcastEnvelope::SensorStatus(status))
        .await
        .unwrap();

    let json = next_json(&mut ws).await;
    assert_eq!(json["event"], "sensor:status");
    assert_eq!(json["data"]["sensorId"], "sensors/ewsbe");
    assert_eq!(json["data"]["status"], "offline");
}

#[tokio::test]
async fn client_close_unregisters() {
    let (url, server) = boot_server(16).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    wait_for_count(server.hub(), 2).await;

    a.close(None).await.unwrap();
    wait_for_count(server.hub(), 1).await;

    let report = server
        .hub()
        .broadcast(&BroadcastEnvelope::SensorUpdate(stored_reading(1)))
        .await
        .unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(next_json(&mut b).await["data"]["id"], 1);
}

#[tokio::test]
async fn client_text_frames_are_ignored() {
    let (url, server) = boot_server(16).await;
    let mut ws = connect(&url).await;
    wait_for_count(server.hub(), 1).await;

    ws.send(Message::Text("hello server".into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.hub().count(), 1);

    let _ = server
        .hub()
        .broadcast(&BroadcastEnvelope::SensorUpdate(stored_reading(2)))
        .await
        .unwrap();
    assert_eq!(next_json(&mut ws).await["data"]["id"], 2);
}

#[tokio::test]
async fn oversized_client_message_ends_session() {
    let (url, server) = boot_server(16).await;
    let mut ws = connect(&url).await;
    wait_for_count(server.hub(), 1).await;

    let big = "x".repeat(4096);
    let _ = ws.send(Message::Text(big.into())).await;
    wait_for_count(server.hub(), 0).await;
}

#[tokio::test]
async fn slow_subscriber_is_evicted_without_affecting_others() {
    let (url, server) = boot_server(2).await;
    let _slow = connect(&url).await;
    let mut fast = connect(&url).await;
    wait_for_count(server.hub(), 2).await;

    // Never read from `_slow`. Its pump keeps writing into the socket buffer,
    // so keep broadcasting until the hub reports an eviction.
    let mut evicted = 0;
    let mut sent = 0;
    let payload = BroadcastEnvelope::SensorUpdate(stored_reading(1));
    while evicted == 0 && sent < 100_000 {
        let report = server.hub().broadcast(&payload).await.unwrap();
        evicted += report.evicted;
        sent += 1;
        // Keep the fast client drained so only the slow one overflows.
        let _ = next_json(&mut fast).await;
    }
    assert_eq!(evicted, 1);
    assert_eq!(server.hub().count(), 1);
}

#[tokio::test]
async fn hub_shutdown_sends_close_and_drains() {
    let (url, server) = boot_server(16).await;
    let mut ws = connect(&url).await;
    wait_for_count(server.hub(), 1).await;

    server.shutdown().shutdown();
    server.hub().shutdown().await;

    let mut saw_close = false;
    while let Ok(Some(Ok(msg))) = timeout(TIMEOUT, ws.next()).await {
        if matches!(msg, Message::Close(_)) {
            saw_close = true;
        }
    }
    assert!(saw_close);
    assert!(server.shutdown().graceful_shutdown(TIMEOUT).await);
    assert_eq!(server.hub().count(), 0);
}
