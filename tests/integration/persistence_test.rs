// tests/integration/persistence_test.rs

//! Tests that a snapshot-backed server keeps its ledger across restarts.

use super::test_helpers::{TestClient, expect_json, expect_text, init_tracing, test_config};
use currencydb::core::Message;
use currencydb::core::storage::LedgerStore;
use currencydb::server::{Server, open_store};
use serde_json::json;

#[test]
fn test_ledger_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.storage.path = Some(dir.path().join("ledger.json").display().to_string());

    {
        let store = open_store(&config.storage).unwrap();
        let server = Server::start(&config, store).unwrap();
        let mut client = TestClient::connect_to(server.local_addr());
        expect_text(client.request_json(json!({"type": "add-entry", "name": "USD"})));
        expect_text(client.request_json(json!({"type": "add-value", "name": "USD", "value": 3.5})));
        server.stop();
    }

    let store = open_store(&config.storage).unwrap();
    let server = Server::start(&config, store).unwrap();
    let mut client = TestClient::connect_to(server.local_addr());
    let list = expect_json(client.request(&Message::command("list")));
    assert_eq!(list[0]["name"], "USD");
    assert_eq!(list[0]["value"], 3.5);
}

#[test]
fn test_reset_on_start_discards_snapshot() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.storage.path = Some(dir.path().join("ledger.json").display().to_string());

    let store = open_store(&config.storage).unwrap();
    store.add("EUR").unwrap();
    drop(store);

    config.storage.reset_on_start = true;
    let store = open_store(&config.storage).unwrap();
    assert!(store.list().unwrap().is_empty());
}
