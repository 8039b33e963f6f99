// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn emit_without_subscribers_is_fine() {
    let bus = EventBus::new(4);
    bus.emit(SyncEvent::Disconnected {
        reason: "closed".into(),
    });
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn every_subscriber_sees_events() {
    let bus = EventBus::new(4);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.emit(SyncEvent::Connected { devices: vec![] });

    assert_eq!(a.try_recv().unwrap(), SyncEvent::Connected { devices: vec![] });
    assert_eq!(b.try_recv().unwrap(), SyncEvent::Connected { devices: vec![] });
}

#[test]
fn dropping_receiver_unsubscribes() {
    let bus = EventBus::new(4);
    let rx = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 1);
    drop(rx);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn late_subscriber_misses_earlier_events() {
    let bus = EventBus::new(4);
    bus.emit(SyncEvent::ReconnectFailed {
        error: "down".into(),
    });
    let mut rx = bus.subscribe();
    assert!(rx.try_recv().is_err());
}
