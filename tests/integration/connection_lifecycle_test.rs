// tests/integration/connection_lifecycle_test.rs

//! Tests for accepting, closing and limiting client connections.

use super::test_helpers::{
    RESPONSE_TIMEOUT, TestServer, expect_text, test_config, wait_until,
};
use currencydb::core::Message;
use std::time::Duration;

#[test]
fn test_disconnect_command_closes_connection_without_reply() {
    let server = TestServer::start();
    let mut client = server.connect();
    assert!(server.wait_for_clients(1));

    client.send(&Message::command("disconnect"));
    assert!(client.wait_closed(RESPONSE_TIMEOUT));
    assert!(server.wait_for_clients(0));
}

#[test]
fn test_client_hangup_is_unregistered() {
    let server = TestServer::start();
    let client = server.connect();
    assert!(server.wait_for_clients(1));

    client.close();
    assert!(server.wait_for_clients(0));
}

#[test]
fn test_connection_ids_are_never_reused() {
    let server = TestServer::start();
    let first = server.connect();
    assert!(server.wait_for_clients(1));
    let first_id = server.server.clients()[0].0;
    first.close();
    assert!(server.wait_for_clients(0));

    let _second = server.connect();
    assert!(server.wait_for_clients(1));
    let second_id = server.server.clients()[0].0;
    assert!(second_id > first_id);
}

#[test]
fn test_close_client_by_id() {
    let server = TestServer::start();
    let mut victim = server.connect();
    let mut bystander = server.connect();
    assert!(server.wait_for_clients(2));

    let victim_addr = victim.local_addr();
    let (victim_id, _) = server
        .server
        .clients()
        .into_iter()
        .find(|(_, addr)| *addr == victim_addr)
        .expect("victim is registered");

    assert!(server.server.close_client(victim_id));
    assert!(!server.server.close_client(victim_id));
    assert!(victim.wait_closed(RESPONSE_TIMEOUT));

    assert_eq!(expect_text(bystander.request(&Message::text("ok"))), "ok");
    assert_eq!(server.server.client_count(), 1);
}

#[test]
fn test_close_all_clients() {
    let server = TestServer::start();
    let mut clients: Vec<_> = (0..3).map(|_| server.connect()).collect();
    assert!(server.wait_for_clients(3));

    assert_eq!(server.server.close_all_clients(), 3);
    for client in clients.iter_mut() {
        assert!(client.wait_closed(RESPONSE_TIMEOUT));
    }
    assert_eq!(server.server.client_count(), 0);

    // The listener keeps accepting after a mass disconnect.
    let mut late = server.connect();
    assert_eq!(expect_text(late.request(&Message::text("again"))), "again");
}

#[test]
fn test_list_clients_format() {
    let server = TestServer::start();
    assert_eq!(server.server.list_clients(), "Clients connected:");

    let _a = server.connect();
    let _b = server.connect();
    assert!(server.wait_for_clients(2));

    let listing = server.server.list_clients();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Clients connected:");
    for line in &lines[1..] {
        assert!(line.starts_with("id: "), "unexpected line {line}");
        assert!(line.contains("127.0.0.1:"));
    }
}

#[test]
fn test_max_clients_rejects_extra_connections() {
    let mut config = test_config();
    config.max_clients = 1;
    let server = TestServer::with_config(config);

    let mut admitted = server.connect();
    assert!(server.wait_for_clients(1));

    let mut rejected = server.connect();
    assert!(rejected.wait_closed(RESPONSE_TIMEOUT));
    assert_eq!(server.server.client_count(), 1);
    assert!(wait_until(RESPONSE_TIMEOUT, || {
        server.server.stats().rejected_connections == 1
    }));

    assert_eq!(expect_text(admitted.request(&Message::text("hi"))), "hi");
}

#[test]
fn test_stats_count_connections_and_messages() {
    let server = TestServer::start();
    let mut client = server.connect();
    client.request(&Message::text("a"));
    client.request(&Message::command("nope"));

    let stats = server.server.stats();
    assert_eq!(stats.total_connections, 1);
    assert_eq!(stats.total_messages, 2);
    assert_eq!(stats.total_errors, 1);
}

#[test]
fn test_stop_closes_clients_and_is_idempotent() {
    let server = TestServer::start();
    let mut client = server.connect();
    assert!(server.wait_for_clients(1));
    assert!(server.server.is_active());

    server.server.stop();
    assert!(!server.server.is_active());
    assert!(client.wait_closed(RESPONSE_TIMEOUT));
    assert_eq!(server.server.client_count(), 0);

    server.server.stop();
}

#[test]
fn test_stop_refuses_new_connections() {
    let server = TestServer::start();
    let addr = server.server.local_addr();
    server.server.stop();

    let result = std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(500));
    assert!(result.is_err());
}

#[test]
fn test_response_to_departed_client_is_dropped() {
    let server = TestServer::start();
    let mut client = server.connect();
    client.send_raw(b"TXbye\r\nCMdisconnect\r\nTXnever\r\n");
    assert!(client.wait_closed(RESPONSE_TIMEOUT));

    // The server keeps serving others.
    let mut other = server.connect();
    assert_eq!(expect_text(other.request(&Message::text("fine"))), "fine");
}

#[test]
fn test_client_that_never_reads_is_disconnected_after_write_timeout() {
    let mut config = test_config();
    config.reactor.write_timeout_ms = 50;
    let server = TestServer::with_config(config);
    let mut stalled = server.connect();
    let mut bystander = server.connect();
    assert!(server.wait_for_clients(2));

    // Far more echo traffic than the socket buffers can hold while the client
    // is not reading.
    let frame = Message::text("x".repeat(256 * 1024)).encode_to_vec();
    for _ in 0..80 {
        if !stalled.try_send_raw(&frame) {
            break;
        }
    }

    assert!(server.wait_for_clients(1));
    assert!(stalled.wait_closed(RESPONSE_TIMEOUT));
    assert_eq!(expect_text(bystander.request(&Message::text("still here"))), "still here");
}

#[test]
fn test_burst_of_connections_is_fully_accepted() {
    let server = TestServer::start();
    let mut clients: Vec<_> = (0..32).map(|_| server.connect()).collect();
    assert!(server.wait_for_clients(32));

    for client in clients.iter_mut() {
        assert_eq!(expect_text(client.request(&Message::text("up"))), "up");
    }
}
