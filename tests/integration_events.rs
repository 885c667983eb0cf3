//! Integration tests for the event bus contract
//!
//! Presentation layers consume events as JSON; the shape must stay stable.

mod common;

use common::*;
use serde_json::Value;
use tenant_slot_cache::{AppointmentFilter, BookingConfig, BookingEvent};

fn json(event: &BookingEvent) -> Value {
    let text = event.to_json().unwrap_or_else(|e| panic!("Serialize failed: {e}"));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Invalid JSON: {e}"))
}

/// A confirmed booking emits slotBlocked then bookingConfirmed with camelCase fields
#[tokio::test]
async fn test_booking_event_payloads() {
    let mut config = BookingConfig::default();
    config.verify_remotely = false;
    let (system, _) = setup_system(config).unwrap_or_else(|e| panic!("Failed to build system: {e}"));
    let tenant = unique_tenant("bb-alpha");
    let mut rx = system.subscribe();

    let record = system
        .create_appointment(&ctx(&tenant), &test_data::request("10:00", "u-1"), None)
        .await
        .unwrap_or_else(|e| panic!("Booking failed: {e}"));

    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec!["slotBlocked", "bookingConfirmed"]);

    let blocked = json(&events[0]);
    assert_eq!(blocked["type"], "slotBlocked");
    assert_eq!(blocked["tenant"], tenant.as_str());
    assert_eq!(blocked["date"], "2024-05-01");
    assert_eq!(blocked["time"], "10:00");
    assert_eq!(blocked["barberId"], "barber-01");
    let tentative = blocked["tentativeId"].as_str().unwrap_or_default().to_string();
    assert!(tentative.starts_with("temp-"));

    let confirmed = json(&events[1]);
    assert_eq!(confirmed["type"], "bookingConfirmed");
    assert_eq!(confirmed["tentativeId"], tentative.as_str());
    assert_eq!(confirmed["record"]["id"], record.id.as_str());
    assert_eq!(confirmed["record"]["barberId"], "barber-01");
    assert_eq!(confirmed["record"]["isCancelled"], false);

    // Round trip through the wire form.
    let text = events[1].to_json().unwrap_or_else(|e| panic!("Serialize failed: {e}"));
    assert_eq!(
        BookingEvent::from_json(&text).unwrap_or_else(|e| panic!("Parse failed: {e}")),
        events[1]
    );
}

/// cacheInvalidated carries logical keys and a millisecond timestamp
#[tokio::test]
async fn test_cache_invalidated_payload() {
    let (system, repo) = setup_system(BookingConfig::default())
        .unwrap_or_else(|e| panic!("Failed to build system: {e}"));
    let tenant = unique_tenant("bb-alpha");
    repo.seed(&tenant_id(&tenant), test_data::day(1));
    system
        .load_appointments(&ctx(&tenant), &AppointmentFilter::all())
        .await
        .unwrap_or_else(|e| panic!("Load failed: {e}"));
    let mut rx = system.subscribe();

    system
        .clear_tenant_cache(&ctx(&tenant))
        .await
        .unwrap_or_else(|e| panic!("Clear failed: {e}"));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let payload = json(&events[0]);
    assert_eq!(payload["type"], "cacheInvalidated");
    let keys: Vec<&str> = payload["keys"]
        .as_array()
        .unwrap_or_else(|| panic!("keys must be an array"))
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(keys.contains(&"appointments:all"));
    assert!(keys.iter().all(|key| !key.starts_with("tenant:")));
    assert!(payload["timestamp"].as_u64().unwrap_or_default() > 1_600_000_000_000);
}

/// Refreshes are announced so other views can pick up the new list
#[tokio::test]
async fn test_refresh_announced() {
    let (system, repo) = setup_system(BookingConfig::default())
        .unwrap_or_else(|e| panic!("Failed to build system: {e}"));
    let tenant = unique_tenant("bb-alpha");
    repo.seed(&tenant_id(&tenant), test_data::day(2));
    let mut sub = system
        .subscribe_tenant(&ctx(&tenant))
        .unwrap_or_else(|e| panic!("Subscribe failed: {e}"));

    system
        .load_appointments(&ctx(&tenant), &AppointmentFilter::barber(test_data::BARBER))
        .await
        .unwrap_or_else(|e| panic!("Load failed: {e}"));

    match sub.recv().await {
        Some(BookingEvent::AppointmentsRefreshed { key, count, .. }) => {
            assert_eq!(key, "appointments:barberId=barber-01");
            assert_eq!(count, 2);
        }
        other => panic!("Unexpected event {other:?}"),
    }
    assert_eq!(system.stats().events.refreshes, 1);
}
