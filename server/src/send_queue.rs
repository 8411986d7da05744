//! Outbound datagram queue and the timer-driven pump that drains it.
//!
//! Everything the server emits goes through [`SendQueue`]: offline replies,
//! ACKs and connected messages alike. The receive path only ever pushes; the
//! [`SendPump`] task pops at most `datagrams_per_tick` entries per tick and
//! writes them to the socket. The queue lock is held for the push or pop
//! alone, never across the socket write.

use bytes::Bytes;
use log::{error, trace};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::utils::hex_dump;

/// One queued write: destination plus the finished datagram bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDatagram {
    pub endpoint: SocketAddr,
    pub payload: Bytes,
}

/// Unbounded FIFO shared between producers and the pump.
#[derive(Debug, Clone, Default)]
pub struct SendQueue {
    inner: Arc<Mutex<VecDeque<OutboundDatagram>>>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<OutboundDatagram>> {
        // A panicking producer cannot leave the deque half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, endpoint: SocketAddr, payload: Bytes) {
        self.lock().push_back(OutboundDatagram { endpoint, payload });
    }

    pub fn dequeue(&self) -> Option<OutboundDatagram> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every pending datagram, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }
}

/// Periodic task writing queued datagrams to the socket.
pub struct SendPump {
    socket: Arc<UdpSocket>,
    queue: SendQueue,
    period: Duration,
    per_tick: usize,
}

impl SendPump {
    pub fn new(socket: Arc<UdpSocket>, queue: SendQueue, period: Duration, per_tick: usize) -> Self {
        Self {
            socket,
            queue,
            period,
            per_tick: per_tick.max(1),
        }
    }

    /// Ticks until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        trace!("Send pump stopped with {} datagrams pending", self.queue.len());
    }

    /// Writes up to `per_tick` datagrams, returning how many were sent.
    pub async fn tick(&self) -> usize {
        let mut sent = 0;

        for _ in 0..self.per_tick {
            let Some(datagram) = self.queue.dequeue() else {
                break;
            };

            match self.socket.send_to(&datagram.payload, datagram.endpoint).await {
                Ok(_) => {
                    trace!(
                        "> {} bytes to {}: {}",
                        datagram.payload.len(),
                        datagram.endpoint,
                        hex_dump(&datagram.payload)
                    );
                    sent += 1;
                }
                Err(e) => {
                    error!("Failed to send datagram to {}: {}", datagram.endpoint, e);
                }
            }
        }

        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn endpoint(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_fifo_order() {
        let queue = SendQueue::new();
        for i in 0..5u8 {
            queue.enqueue(endpoint(1000 + i as u16), Bytes::from(vec![i]));
        }

        assert_eq!(queue.len(), 5);
        for i in 0..5u8 {
            let datagram = queue.dequeue().unwrap();
            assert_eq!(datagram.endpoint.port(), 1000 + i as u16);
            assert_eq!(&datagram.payload[..], &[i]);
        }
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let queue = SendQueue::new();
        let producer = queue.clone();
        producer.enqueue(endpoint(1), Bytes::from_static(b"x"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.clear(), 1);
        assert!(producer.is_empty());
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = SendQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..250u16 {
                        queue.enqueue(endpoint(t * 1000 + i), Bytes::new());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 1000);
    }

    #[tokio::test]
    async fn test_tick_drains_at_most_per_tick() {
        let sender = Arc::new(assert_ok!(UdpSocket::bind("127.0.0.1:0").await));
        let receiver = assert_ok!(UdpSocket::bind("127.0.0.1:0").await);
        let target = receiver.local_addr().unwrap();

        let queue = SendQueue::new();
        for i in 0..3u8 {
            queue.enqueue(target, Bytes::from(vec![i]));
        }

        let pump = SendPump::new(sender, queue.clone(), Duration::from_millis(10), 2);
        assert_eq!(pump.tick().await, 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(pump.tick().await, 1);
        assert_eq!(pump.tick().await, 0);

        let mut buf = [0u8; 16];
        for expected in 0..3u8 {
            let (len, _) = assert_ok!(receiver.recv_from(&mut buf).await);
            assert_eq!(&buf[..len], &[expected]);
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let socket = Arc::new(assert_ok!(UdpSocket::bind("127.0.0.1:0").await));
        let pump = SendPump::new(socket, SendQueue::new(), Duration::from_millis(5), 1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(pump.run(shutdown.clone()));

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
