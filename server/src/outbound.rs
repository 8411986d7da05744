//! Outbound path: per-endpoint sequencing and the handle the game layer sends through.

use bytes::Bytes;
use log::{debug, trace, warn};
use shared::codec::U24_MAX;
use shared::{ConnectedPackage, Message, Reliability, MAX_PAYLOAD_LEN};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::send_queue::SendQueue;
use crate::utils::hex_dump;

fn next_u24(counter: &mut u32) -> u32 {
    let value = *counter;
    *counter = (value + 1) & U24_MAX;
    value
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct EndpointCounters {
    sequence_number: u32,
    reliable_message_number: u32,
    sequencing_index: u32,
    ordering_index: u32,
}

/// Assigns sequence, reliable, sequencing and ordering numbers per endpoint.
///
/// The sequence number advances for every package; the other counters only
/// for packages whose reliability mode carries them.
#[derive(Debug, Default)]
pub struct Sequencer {
    endpoints: HashMap<SocketAddr, EndpointCounters>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(
        &mut self,
        endpoint: SocketAddr,
        reliability: Reliability,
        payload: Bytes,
    ) -> ConnectedPackage {
        let counters = self.endpoints.entry(endpoint).or_default();
        let mut package =
            ConnectedPackage::new(next_u24(&mut counters.sequence_number), reliability, payload);

        if reliability.is_reliable() {
            package.reliable_message_number = Some(next_u24(&mut counters.reliable_message_number));
        }
        if reliability.is_sequenced() {
            package.sequencing_index = Some(next_u24(&mut counters.sequencing_index));
            package.ordering_index = Some(counters.ordering_index);
        } else if reliability.is_ordered() {
            package.ordering_index = Some(next_u24(&mut counters.ordering_index));
        }

        package
    }

    /// Starts a new connection epoch for `endpoint`.
    pub fn reset(&mut self, endpoint: &SocketAddr) -> bool {
        self.endpoints.remove(endpoint).is_some()
    }

    pub fn clear(&mut self) {
        self.endpoints.clear();
    }

    pub fn tracked_endpoints(&self) -> usize {
        self.endpoints.len()
    }
}

/// Cloneable send handle shared by the router and every session.
///
/// Sequencing and enqueueing happen under the sequencer lock, so packages for
/// one endpoint reach the queue in sequence-number order. Lock order is always
/// sequencer, then queue.
#[derive(Debug, Clone)]
pub struct Outbound {
    sequencer: Arc<Mutex<Sequencer>>,
    queue: SendQueue,
}

impl Outbound {
    pub fn new(queue: SendQueue) -> Self {
        Self {
            sequencer: Arc::new(Mutex::new(Sequencer::new())),
            queue,
        }
    }

    fn sequencer(&self) -> MutexGuard<'_, Sequencer> {
        self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wraps `message` in a connected package and queues it for `endpoint`.
    ///
    /// Returns false when the encoded message does not fit in one frame. No
    /// counter advances for a rejected message.
    pub fn send(&self, endpoint: SocketAddr, message: &Message, reliability: Reliability) -> bool {
        if !message.is_ping_traffic() {
            debug!("> {} to {} ({:?})", message.name(), endpoint, reliability);
        }

        let payload = message.encode();
        if payload.len() > MAX_PAYLOAD_LEN {
            warn!(
                "Not sending {} to {}: {} bytes exceeds the {} byte frame limit",
                message.name(),
                endpoint,
                payload.len(),
                MAX_PAYLOAD_LEN
            );
            return false;
        }

        let mut sequencer = self.sequencer();
        let package = sequencer.wrap(endpoint, reliability, payload);
        let datagram = match package.encode() {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("Not sending {} to {}: {}", message.name(), endpoint, e);
                return false;
            }
        };
        trace!(
            "Queued package #{} for {}: {}",
            package.sequence_number,
            endpoint,
            hex_dump(&package.payload)
        );
        self.queue.enqueue(endpoint, datagram);
        true
    }

    pub fn send_reliable(&self, endpoint: SocketAddr, message: &Message) -> bool {
        self.send(endpoint, message, Reliability::Reliable)
    }

    /// Queues pre-framed bytes (offline replies, ACKs) without sequencing.
    pub fn send_raw(&self, endpoint: SocketAddr, payload: Bytes) {
        self.queue.enqueue(endpoint, payload);
    }

    pub fn reset_endpoint(&self, endpoint: &SocketAddr) {
        if self.sequencer().reset(endpoint) {
            trace!("Reset outbound counters for {}", endpoint);
        }
    }

    /// Endpoints with live counters. An endpoint is forgotten on reset, on
    /// `clear`, or never if the peer vanishes without disconnecting.
    pub fn tracked_endpoints(&self) -> usize {
        self.sequencer().tracked_endpoints()
    }

    /// Forgets all counters and drops anything still queued.
    pub fn clear(&self) -> usize {
        self.sequencer().clear();
        self.queue.clear()
    }

    pub fn queue(&self) -> &SendQueue {
        &self.queue
    }
}
