//! Broadcast hub behavior seen from connected displays.
//!
//! Tests verify:
//! - Global-only messages never reach class-scoped subscribers
//! - Class messages reach the class and every venue screen
//! - Stopping a countdown silences the class immediately
//! - Disconnects during traffic do not disturb other subscribers

use std::time::Duration;

use arena::{BroadcastHub, ChannelSubscriber, HubMessage, Subscriber};
use serde_json::Value;
use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

#[tokio::test]
async fn test_global_only_isolation() {
    let hub = BroadcastHub::new().shared();
    let (room, mut room_rx) = ChannelSubscriber::new(16);
    let (screen, mut screen_rx) = ChannelSubscriber::new(16);
    hub.connect(room, Some(7));
    hub.connect(screen, None);

    hub.broadcast_global_only(&HubMessage::vote_progress(7, 1, 40))
        .await;
    hub.broadcast_to_class(7, &HubMessage::timer_update(7, 9))
        .await;

    let room_types: Vec<Value> = drain(&mut room_rx).into_iter().map(|m| m["type"].clone()).collect();
    assert_eq!(room_types, vec![Value::from("TIMER_UPDATE")]);

    let screen_types: Vec<Value> = drain(&mut screen_rx)
        .into_iter()
        .map(|m| m["type"].clone())
        .collect();
    assert_eq!(
        screen_types,
        vec![Value::from("vote_progress"), Value::from("TIMER_UPDATE")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_then_stop_countdown() {
    let hub = BroadcastHub::new().shared();
    let (room, mut room_rx) = ChannelSubscriber::new(16);
    hub.connect(room, Some(5));

    hub.start_countdown(5, 3, None);
    hub.stop_countdown(5);
    assert_eq!(hub.get_countdown(5), None);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(drain(&mut room_rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_countdown_visible_to_venue_screens() {
    let hub = BroadcastHub::new().shared();
    let (screen, mut screen_rx) = ChannelSubscriber::new(16);
    hub.connect(screen, None);

    hub.start_countdown(2, 2, None);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(hub.get_countdown(2), Some(1));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let ticks: Vec<u64> = drain(&mut screen_rx)
        .iter()
        .map(|m| m["data"]["countdown"].as_u64().unwrap())
        .collect();
    assert_eq!(ticks, vec![2, 1, 0]);
    assert_eq!(hub.get_countdown(2), None);
}

#[tokio::test]
async fn test_dropped_receiver_does_not_block_others() {
    let hub = BroadcastHub::new().shared();
    let (gone, gone_rx) = ChannelSubscriber::new(4);
    let (kept, mut kept_rx) = ChannelSubscriber::new(4);
    let gone_id = gone.id();
    hub.connect(gone, Some(1));
    hub.connect(kept, Some(1));
    drop(gone_rx);

    let report = hub
        .broadcast_to_class(1, &HubMessage::timer_update(1, 3))
        .await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(drain(&mut kept_rx).len(), 1);

    assert!(hub.disconnect(gone_id, Some(1)));
    let report = hub
        .broadcast_to_class(1, &HubMessage::timer_update(1, 2))
        .await;
    assert_eq!(report.failed, 0);
}
