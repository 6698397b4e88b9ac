mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::future::join_all;
use sql_relay::{ConnectionManager, RelayError, RowValues};

use common::FakeConnector;

#[tokio::test(flavor = "current_thread")]
async fn init_twice_reuses_the_same_handle() {
    let connector = FakeConnector::new();
    let db = ConnectionManager::new(connector.clone());

    let first = db.init().await.expect("first init connects");
    let second = db.init().await.expect("second init returns the handle");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn query_while_disconnected_fails_without_io() {
    let connector = FakeConnector::new();
    let db = ConnectionManager::new(connector.clone());

    let err = db.query("SELECT 1").await.unwrap_err();

    assert!(matches!(err, RelayError::NotConnected));
    assert_eq!(connector.attempts(), 0);
    assert_eq!(connector.queries(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn is_connected_tracks_init_and_close() {
    let db = ConnectionManager::new(FakeConnector::new());
    assert!(!db.is_connected());

    db.init().await;
    assert!(db.is_connected());

    db.close().await;
    assert!(!db.is_connected());
}

#[tokio::test(flavor = "current_thread")]
async fn close_twice_is_a_no_op() {
    let db = ConnectionManager::new(FakeConnector::new());
    let pool = db.init().await.expect("connects");

    db.close().await;
    assert!(!db.is_connected());
    assert!(pool.closed.load(Ordering::SeqCst));

    db.close().await;
    assert!(!db.is_connected());
}

#[tokio::test(flavor = "current_thread")]
async fn close_error_is_logged_and_still_disconnects() {
    let connector = FakeConnector {
        close_fails: true,
        ..FakeConnector::default()
    };
    let db = ConnectionManager::new(connector);
    db.init().await.expect("connects");

    db.close().await;
    assert!(!db.is_connected());
}

#[tokio::test(flavor = "current_thread")]
async fn failed_init_returns_none_and_a_later_init_can_succeed() {
    let connector = FakeConnector::refusing();
    let db = ConnectionManager::new(connector.clone());

    assert!(db.init().await.is_none());
    assert!(!db.is_connected());
    assert!(matches!(
        db.query("SELECT 1").await.unwrap_err(),
        RelayError::NotConnected
    ));

    connector.refuse.store(false, Ordering::SeqCst);
    assert!(db.init().await.is_some());
    assert!(db.is_connected());
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn query_passes_rows_and_engine_errors_through() {
    let db = ConnectionManager::new(FakeConnector::new());
    db.init().await.expect("connects");

    let rows = db.query("SELECT 1").await.expect("query runs");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.results[0].get("x"), Some(&RowValues::Int(1)));

    let err = db.query("SELEKT 1").await.unwrap_err();
    assert_eq!(err.to_string(), "SQL execution error: Incorrect syntax near 'SELEKT'.");
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_init_shares_one_attempt() {
    let connector = FakeConnector {
        connect_delay: Some(Duration::from_millis(20)),
        ..FakeConnector::default()
    };
    let db = ConnectionManager::new(connector.clone());

    let handles = join_all((0..8).map(|_| db.init())).await;

    let first = handles[0].clone().expect("connects");
    for handle in &handles {
        let handle = handle.as_ref().expect("every caller sees the pool");
        assert!(Arc::ptr_eq(&first, handle));
    }
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn reconnect_after_close_opens_a_new_pool() {
    let connector = FakeConnector::new();
    let db = ConnectionManager::new(connector.clone());

    let first = db.init().await.expect("connects");
    db.close().await;
    let second = db.init().await.expect("reconnects");

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(connector.attempts(), 2);
}
