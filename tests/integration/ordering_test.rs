// tests/integration/ordering_test.rs

//! Tests for message ordering across the worker pool.

use super::test_helpers::{TestServer, expect_text, test_config};
use currencydb::core::workers::TaskOrdering;
use std::thread;

const PIPELINED: usize = 200;

fn pipelined_burst() -> Vec<u8> {
    let mut burst = Vec::new();
    for i in 0..PIPELINED {
        burst.extend_from_slice(format!("TXmsg-{i}\r\n").as_bytes());
    }
    burst
}

#[test]
fn test_per_connection_ordering_preserves_arrival_order() {
    let mut config = test_config();
    config.workers.threads = 4;
    config.workers.ordering = TaskOrdering::PerConnection;
    let server = TestServer::with_config(config);
    let mut client = server.connect();

    client.send_raw(&pipelined_burst());
    for i in 0..PIPELINED {
        assert_eq!(expect_text(client.recv()), format!("msg-{i}"));
    }
}

#[test]
fn test_unordered_mode_answers_every_message() {
    let mut config = test_config();
    config.workers.threads = 4;
    config.workers.ordering = TaskOrdering::Unordered;
    let server = TestServer::with_config(config);
    let mut client = server.connect();

    client.send_raw(&pipelined_burst());
    let mut received: Vec<String> = (0..PIPELINED).map(|_| expect_text(client.recv())).collect();
    received.sort();
    let mut expected: Vec<String> = (0..PIPELINED).map(|i| format!("msg-{i}")).collect();
    expected.sort();
    assert_eq!(received, expected);
}

#[test]
fn test_concurrent_clients_each_keep_their_order() {
    let server = TestServer::start();
    let mut clients: Vec<_> = (0..8).map(|_| server.connect()).collect();

    thread::scope(|scope| {
        for (c, client) in clients.iter_mut().enumerate() {
            scope.spawn(move || {
                for i in 0..50 {
                    client.send_raw(format!("TXc{c}-{i}\r\n").as_bytes());
                }
                for i in 0..50 {
                    assert_eq!(expect_text(client.recv()), format!("c{c}-{i}"));
                }
            });
        }
    });
}
