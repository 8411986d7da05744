//! Performance benchmarks for the protocol codecs and the send path

use bytes::Bytes;
use server::offline::OfflineHandler;
use server::outbound::{Outbound, Sequencer};
use server::router::{DatagramOutcome, Router, Routed};
use server::send_queue::SendQueue;
use server::session::{Level, PlayerFactory};
use shared::message::{ConnectedPing, ConnectionRequestAccepted};
use shared::{Ack, AckKind, AckRecord, ConnectedPackage, DatagramHeader, Message, Reliability};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

fn client() -> SocketAddr {
    "127.0.0.1:50000".parse().unwrap()
}

/// Benchmarks header byte classification
#[test]
fn benchmark_header_classification() {
    let iterations = 100_000;
    let start = Instant::now();

    let mut valid = 0;
    for i in 0..iterations {
        if DatagramHeader::classify((i % 256) as u8).is_ok() {
            valid += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Header classification: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // 96 of every 256 bytes are valid (0x80..=0xdf); 100_000 = 390 * 256 + 160
    assert_eq!(valid, 390 * 96 + 32);
    assert!(duration.as_millis() < 200);
}

/// Benchmarks the largest handshake message through encode and decode
#[test]
fn benchmark_message_codec() {
    let message = Message::ConnectionRequestAccepted(ConnectionRequestAccepted {
        client_address: "[2001:db8::1]:50000".parse().unwrap(),
        system_index: 0,
        request_timestamp: 1_234_567,
        accepted_timestamp: 1_234_999,
    });

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let encoded = message.encode();
        let decoded = Message::try_decode(&encoded).unwrap();
        assert_eq!(decoded.id(), message.id());
    }

    let duration = start.elapsed();
    println!(
        "Message codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks connected package framing with a full-size payload
#[test]
fn benchmark_envelope_codec() {
    let payload = Bytes::from(vec![0xfe; 1400]);
    let mut package = ConnectedPackage::new(0, Reliability::ReliableOrdered, payload);
    package.reliable_message_number = Some(0);
    package.ordering_index = Some(0);

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        package.sequence_number = i;
        let decoded = ConnectedPackage::decode(&package.encode().unwrap()).unwrap();
        assert_eq!(decoded.sequence_number, i);
    }

    let duration = start.elapsed();
    println!(
        "Envelope codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks decoding a NAK with many records
#[test]
fn benchmark_large_nak_decode() {
    let nak = Ack {
        kind: AckKind::Nak,
        records: (0..1000)
            .map(|i| {
                if i % 2 == 0 {
                    AckRecord::Single(i * 10)
                } else {
                    AckRecord::Range {
                        start: i * 10,
                        end: i * 10 + 5,
                    }
                }
            })
            .collect(),
    };
    let encoded = nak.encode();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let decoded = Ack::decode(&encoded).unwrap();
        assert_eq!(decoded.records.len(), 1000);
    }

    let duration = start.elapsed();
    println!(
        "Large NAK decode: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 3000);
}

/// Stress tests the router with a burst of connected pings
#[test]
fn stress_test_router_ping_burst() {
    let queue = SendQueue::new();
    let mut router = Router::new(
        OfflineHandler::new(12345, "Bench"),
        Outbound::new(queue.clone()),
        Arc::new(PlayerFactory),
        Arc::new(Level::new("Default")),
    );

    let datagrams: Vec<Bytes> = (0..10_000u32)
        .map(|i| {
            let ping = Message::ConnectedPing(ConnectedPing {
                send_ping_time: u64::from(i),
            });
            ConnectedPackage::new(i, Reliability::Unreliable, ping.encode())
                .encode()
                .unwrap()
        })
        .collect();

    let start = Instant::now();

    for (i, raw) in datagrams.iter().enumerate() {
        let outcome = router.handle_datagram(raw, client()).unwrap();
        assert_eq!(
            outcome,
            DatagramOutcome::Connected {
                sequence_number: i as u32,
                routed: Routed::Pong,
            }
        );
    }

    let duration = start.elapsed();
    println!(
        "Router ping burst: {} datagrams in {:?} ({:.2} μs/datagram)",
        datagrams.len(),
        duration,
        duration.as_micros() as f64 / datagrams.len() as f64
    );

    // One ACK and one pong per ping, nothing dropped
    assert_eq!(queue.len(), 20_000);
    assert!(duration.as_millis() < 3000);
}

/// Stress tests concurrent producers against a single consumer
#[test]
fn stress_test_send_queue_contention() {
    let queue = SendQueue::new();
    let producers = 4;
    let per_producer = 25_000;

    let start = Instant::now();

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for i in 0..per_producer {
                    let port = 1000 + p as u16;
                    queue.enqueue(
                        SocketAddr::from(([127, 0, 0, 1], port)),
                        Bytes::from((i as u32).to_be_bytes().to_vec()),
                    );
                }
            })
        })
        .collect();

    let consumer = {
        let queue = queue.clone();
        std::thread::spawn(move || {
            let mut last_seen = vec![None::<u32>; producers];
            let mut received = 0;
            while received < producers * per_producer {
                let Some(datagram) = queue.dequeue() else {
                    std::thread::yield_now();
                    continue;
                };
                let producer = (datagram.endpoint.port() - 1000) as usize;
                let value = u32::from_be_bytes(datagram.payload[..4].try_into().unwrap());

                // FIFO per producer
                if let Some(previous) = last_seen[producer] {
                    assert!(value > previous);
                }
                last_seen[producer] = Some(value);
                received += 1;
            }
            received
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    let received = consumer.join().unwrap();

    let duration = start.elapsed();
    println!(
        "Send queue contention: {} datagrams in {:?}",
        received, duration
    );

    assert_eq!(received, producers * per_producer);
    assert!(queue.is_empty());
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks per-endpoint sequencing across many endpoints
#[test]
fn benchmark_sequencer_many_endpoints() {
    let mut sequencer = Sequencer::new();
    let endpoints: Vec<SocketAddr> = (0..1000u16)
        .map(|port| SocketAddr::from(([10, 0, 0, 1], 10_000 + port)))
        .collect();

    let iterations = 100;
    let start = Instant::now();

    for round in 0..iterations {
        for endpoint in &endpoints {
            let package = sequencer.wrap(*endpoint, Reliability::Reliable, Bytes::new());
            assert_eq!(package.sequence_number, round);
        }
    }

    let duration = start.elapsed();
    println!(
        "Sequencer: {} packages in {:?}",
        iterations as usize * endpoints.len(),
        duration
    );

    assert_eq!(sequencer.tracked_endpoints(), 1000);
    assert!(duration.as_millis() < 2000);
}
