//! Contract Test: Delta-Only Updates & Idempotency
//!
//! Constraints verified:
//! - An unchanged address set sends no UPDATE but is still verified
//! - Equivalent spellings of an address are not a change
//! - Recorded state survives a restart with the file store
//!
//! If this test fails, repeated runs generate update traffic.

mod common;

use common::*;
use hickory_proto::op::UpdateMessage;
use nsupdate_core::state::FileStateStore;
use nsupdate_core::traits::StateStore;

#[tokio::test]
async fn unchanged_update_sends_no_transaction() {
    let zone = ZoneTransport::new();
    let (engine, _store) = engine(&zone);

    let www = record_set("www", &["10.0.0.1", "10.0.0.2"]);
    engine.create(&www).await.unwrap();
    assert_eq!(zone.update_count(), 1);

    let delta = engine.update(&www).await.expect("no-op update succeeds");

    assert!(delta.is_empty());
    assert_eq!(zone.update_count(), 1, "no second UPDATE");
    assert_eq!(zone.query_count(), 2, "still verified");
}

#[tokio::test]
async fn leading_zero_octets_are_not_a_change() {
    let zone = ZoneTransport::new();
    let (engine, _store) = engine(&zone);

    engine
        .create(&record_set("www", &["192.168.1.1"]))
        .await
        .unwrap();

    let respelled = record_set("www", &["192.168.001.001"]);
    let delta = engine.update(&respelled).await.unwrap();

    assert!(delta.is_empty());
    assert_eq!(zone.update_count(), 1);
}

#[tokio::test]
async fn duplicate_declared_addresses_collapse() {
    let zone = ZoneTransport::new();
    let (engine, _store) = engine(&zone);

    engine
        .create(&record_set("www", &["10.0.0.1", "10.0.0.001", "10.0.0.1"]))
        .await
        .unwrap();

    assert_eq!(zone.last_update().updates().len(), 1);
    assert_eq!(zone.addresses("www.example.com."), vec!["10.0.0.1"]);
}

#[tokio::test]
async fn restart_with_file_store_sends_no_duplicate_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let zone = ZoneTransport::new();
    let www = record_set("www", &["10.0.0.1"]);

    // First run: create and persist
    {
        let store = FileStateStore::new(&path).await.unwrap();
        let engine = engine_with_store(&zone, Box::new(store));
        engine.create(&www).await.unwrap();
        engine.state_store().flush().await.unwrap();
    }

    // Second run: same declaration
    let store = FileStateStore::new(&path).await.unwrap();
    assert!(store.get_record("www.example.com.").await.unwrap().is_some());

    let engine = engine_with_store(&zone, Box::new(store));
    let delta = engine.update(&www).await.unwrap();

    assert!(delta.is_empty());
    assert_eq!(zone.update_count(), 1, "only the first run sent an UPDATE");
}

#[tokio::test]
async fn recorded_leading_zero_address_is_not_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    tokio::fs::write(
        &path,
        r#"{
  "version": "1.0",
  "records": {
    "www.example.com.": {
      "zone": "example.com.",
      "name": "www",
      "ttl": 300,
      "addresses": ["010.000.000.001"],
      "status": "present",
      "last_updated": "2024-01-01T00:00:00Z"
    }
  }
}"#,
    )
    .await
    .unwrap();

    let zone = ZoneTransport::new();
    zone.set_addresses("www.example.com.", &["10.0.0.1"]);

    let store = FileStateStore::new(&path).await.unwrap();
    let engine = engine_with_store(&zone, Box::new(store));
    let delta = engine
        .update(&record_set("www", &["10.0.0.1"]))
        .await
        .expect("equivalent recorded address updates cleanly");

    assert!(delta.is_empty());
    assert_eq!(zone.update_count(), 0);
    assert_eq!(zone.query_count(), 1);
}
