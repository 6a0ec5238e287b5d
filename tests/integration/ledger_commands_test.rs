// tests/integration/ledger_commands_test.rs

//! End-to-end tests of the ledger requests and the `list` command.

use super::test_helpers::{TestServer, expect_error, expect_json, expect_text};
use currencydb::core::Message;
use currencydb::core::storage::LedgerStore;
use serde_json::json;

#[test]
fn test_add_entry_then_duplicate() {
    let server = TestServer::start();
    let mut client = server.connect();

    let response = client.request_json(json!({"type": "add-entry", "name": "USD"}));
    assert_eq!(expect_text(response), "Successfully add currency USD");

    let response = client.request_json(json!({"type": "add-entry", "name": "USD"}));
    assert_eq!(expect_error(response), "Currency already exists: USD");
}

#[test]
fn test_add_value_requires_existing_entry() {
    let server = TestServer::start();
    let mut client = server.connect();

    let response = client.request_json(json!({"type": "add-value", "name": "EUR", "value": 1.5}));
    assert_eq!(expect_error(response), "No such entry: EUR");
}

#[test]
fn test_add_value_and_list() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.request_json(json!({"type": "add-entry", "name": "USD"}));
    let response = client.request_json(json!({"type": "add-value", "name": "USD", "value": 100.0}));
    assert_eq!(expect_text(response), "Successfully add value for currency USD");
    client.request_json(json!({"type": "add-value", "name": "USD", "value": 110.0}));

    let list = expect_json(client.request(&Message::command("list")));
    let entries = list.as_array().expect("list returns an array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "USD");
    assert_eq!(entries[0]["value"], 110.0);
    assert_eq!(entries[0]["absolute_increase"], 10.0);
    let relative = entries[0]["relative_increase"].as_f64().unwrap();
    assert!((relative - 0.1).abs() < 1e-9);
}

#[test]
fn test_list_is_ordered_by_name() {
    let server = TestServer::start();
    let mut client = server.connect();

    for name in ["JPY", "CHF", "USD"] {
        client.request_json(json!({"type": "add-entry", "name": name}));
    }
    let list = expect_json(client.request(&Message::command("list")));
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["CHF", "JPY", "USD"]);
}

#[test]
fn test_list_on_empty_ledger() {
    let server = TestServer::start();
    let mut client = server.connect();

    let list = expect_json(client.request(&Message::command("list")));
    assert_eq!(list, json!([]));
}

#[test]
fn test_get_history() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.request_json(json!({"type": "add-entry", "name": "GBP"}));
    for value in [1.0, 2.0, 4.0] {
        client.request_json(json!({"type": "add-value", "name": "GBP", "value": value}));
    }

    let history = expect_json(client.request_json(json!({"type": "get-history", "name": "GBP"})));
    assert_eq!(history["name"], "GBP");
    let values: Vec<f64> = history["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["value"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![1.0, 2.0, 4.0]);

    let response = client.request_json(json!({"type": "get-history", "name": "XXX"}));
    assert_eq!(expect_error(response), "No such entry: XXX");
}

#[test]
fn test_delete_entry() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.request_json(json!({"type": "add-entry", "name": "SEK"}));
    let response = client.request_json(json!({"type": "delete-entry", "name": "SEK"}));
    assert_eq!(expect_text(response), "Successfully del currency SEK");
    assert!(server.store.is_empty());

    let response = client.request_json(json!({"type": "delete-entry", "name": "SEK"}));
    assert_eq!(expect_error(response), "No such entry: SEK");
}

#[test]
fn test_currency_alias_is_accepted() {
    let server = TestServer::start();
    let mut client = server.connect();

    let response = client.request_json(json!({"type": "add-entry", "currency": "NOK"}));
    assert_eq!(expect_text(response), "Successfully add currency NOK");
    assert_eq!(server.store.list().unwrap()[0].name, "NOK");
}

#[test]
fn test_invalid_requests_are_incorrect_payload() {
    let server = TestServer::start();
    let mut client = server.connect();

    for body in [
        json!({"type": "add-entry"}),
        json!({"type": "add-value", "name": "USD"}),
        json!({"type": "rename-entry", "name": "USD"}),
        json!({"name": "USD"}),
        json!({"type": "add-entry", "name": ""}),
    ] {
        let error = expect_error(client.request_json(body.clone()));
        assert!(
            error.starts_with("Incorrect payload"),
            "unexpected error for {body}: {error}"
        );
    }
}

#[test]
fn test_changes_are_visible_to_other_clients() {
    let server = TestServer::start();
    let mut writer = server.connect();
    let mut reader = server.connect();

    writer.request_json(json!({"type": "add-entry", "name": "CAD"}));
    writer.request_json(json!({"type": "add-value", "name": "CAD", "value": 0.73}));

    let list = expect_json(reader.request(&Message::command("list")));
    assert_eq!(list[0]["name"], "CAD");
    assert_eq!(list[0]["value"], 0.73);
}
