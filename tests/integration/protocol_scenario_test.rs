// tests/integration/protocol_scenario_test.rs

//! End-to-end tests of framing and message-type handling over a real socket.

use super::test_helpers::{TestServer, expect_error, expect_text};
use bytes::Bytes;
use currencydb::core::Message;
use std::thread;
use std::time::Duration;

#[test]
fn test_text_message_is_echoed() {
    let server = TestServer::start();
    let mut client = server.connect();

    let response = client.request(&Message::text("hello"));
    assert_eq!(response, Message::Text(Bytes::from_static(b"hello")));
}

#[test]
fn test_empty_text_message_is_echoed() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"TX\r\n");
    assert_eq!(expect_text(client.recv()), "");
}

#[test]
fn test_unknown_tag_yields_error() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"ZZwhatever\r\n");
    assert_eq!(expect_error(client.recv()), "Unknown message type");
}

#[test]
fn test_frame_shorter_than_tag_yields_error() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"T\r\n");
    assert_eq!(expect_error(client.recv()), "Unknown message type");
}

#[test]
fn test_client_sent_error_message_is_rejected() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"ERoops\r\n");
    assert_eq!(expect_error(client.recv()), "Unknown message type");
}

#[test]
fn test_unknown_command_yields_error() {
    let server = TestServer::start();
    let mut client = server.connect();

    let response = client.request(&Message::command("frobnicate"));
    assert_eq!(expect_error(response), "Unknown command: frobnicate");
}

#[test]
fn test_malformed_json_yields_incorrect_payload() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"JS{not json\r\n");
    assert!(expect_error(client.recv()).starts_with("Incorrect payload"));
}

#[test]
fn test_several_messages_in_one_write_are_all_answered() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"TXone\r\nTXtwo\r\nTXthree\r\n");
    assert_eq!(expect_text(client.recv()), "one");
    assert_eq!(expect_text(client.recv()), "two");
    assert_eq!(expect_text(client.recv()), "three");
}

#[test]
fn test_message_split_across_writes_is_reassembled() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"TXhel");
    thread::sleep(Duration::from_millis(30));
    client.send_raw(b"lo\r");
    thread::sleep(Duration::from_millis(30));
    client.send_raw(b"\nTXnext\r\n");

    assert_eq!(expect_text(client.recv()), "hello");
    assert_eq!(expect_text(client.recv()), "next");
}

#[test]
fn test_partial_message_gets_no_response() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"TXno delimiter yet");
    assert!(client.try_recv(Duration::from_millis(200)).is_none());

    client.send_raw(b"\r\n");
    assert_eq!(expect_text(client.recv()), "no delimiter yet");
}

#[test]
fn test_large_text_message_is_echoed_intact() {
    let server = TestServer::start();
    let mut client = server.connect();

    let payload = "x".repeat(256 * 1024);
    let response = client.request(&Message::text(payload.clone()));
    assert_eq!(expect_text(response), payload);
}

#[test]
fn test_error_does_not_close_connection() {
    let server = TestServer::start();
    let mut client = server.connect();

    client.send_raw(b"??\r\n");
    expect_error(client.recv());
    assert_eq!(expect_text(client.request(&Message::text("still here"))), "still here");
}
