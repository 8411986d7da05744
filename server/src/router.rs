//! Per-datagram dispatch: offline handshake, ACK/NAK bookkeeping, and
//! routing of connected messages to sessions.

use log::{debug, info, trace, warn};
use shared::header::is_offline_id;
use shared::message::{ConnectedPong, ConnectionRequestAccepted};
use shared::{
    Ack, ConnectedPackage, DatagramHeader, DatagramKind, DecodeError, MalformedDatagram,
    Message,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::offline::OfflineHandler;
use crate::outbound::Outbound;
use crate::session::{Level, SessionFactory};
use crate::session_manager::SessionManager;
use crate::utils::{get_timestamp, hex_dump};

/// What happened to a connected message after decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Answered with a `ConnectedPong`
    Pong,
    /// Accepted; `replaced` is set when an earlier session was overwritten
    Accepted { replaced: bool },
    Disconnected { had_session: bool },
    Forwarded { consumed: bool },
    NoSession,
    Unknown(u8),
    /// Fragment of a split frame, acknowledged but not reassembled
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Offline message answered; carries the reply's message id
    OfflineReply(u8),
    OfflineIgnored,
    AckReceived { records: usize },
    NakReceived { records: usize },
    Connected { sequence_number: u32, routed: Routed },
}

pub struct Router {
    offline: OfflineHandler,
    outbound: Outbound,
    sessions: SessionManager,
    factory: Arc<dyn SessionFactory>,
    level: Arc<Level>,
}

impl Router {
    pub fn new(
        offline: OfflineHandler,
        outbound: Outbound,
        factory: Arc<dyn SessionFactory>,
        level: Arc<Level>,
    ) -> Self {
        Self {
            offline,
            outbound,
            sessions: SessionManager::new(),
            factory,
            level,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handles one raw datagram. Errors mean the datagram was dropped; they
    /// never leave partial state behind.
    pub fn handle_datagram(
        &mut self,
        raw: &[u8],
        from: SocketAddr,
    ) -> Result<DatagramOutcome, DecodeError> {
        let first = *raw.first().ok_or(MalformedDatagram::Empty)?;
        trace!("< {} bytes from {}: {}", raw.len(), from, hex_dump(raw));

        if is_offline_id(first) {
            return self.handle_offline(raw, from);
        }

        match DatagramHeader::classify(first)? {
            DatagramKind::Ack => {
                let ack = Ack::decode(raw)?;
                trace!("ACK from {}: {}", from, format_records(&ack));
                Ok(DatagramOutcome::AckReceived {
                    records: ack.records.len(),
                })
            }
            DatagramKind::Nak => {
                let nak = Ack::decode(raw)?;
                warn!(
                    "NAK from {} for {} ({} datagrams); retransmission is not supported",
                    from,
                    format_records(&nak),
                    nak.count()
                );
                Ok(DatagramOutcome::NakReceived {
                    records: nak.records.len(),
                })
            }
            DatagramKind::Data => self.handle_connected(raw, from),
        }
    }

    fn handle_offline(
        &mut self,
        raw: &[u8],
        from: SocketAddr,
    ) -> Result<DatagramOutcome, DecodeError> {
        let message = Message::decode(raw)?;
        if !message.is_ping_traffic() {
            debug!("< {} from {}", message.name(), from);
        }

        let Some(reply) = self.offline.respond(&message, from) else {
            debug!(
                "No offline reply for {} (id 0x{:02x}) from {}",
                message.name(),
                message.id(),
                from
            );
            return Ok(DatagramOutcome::OfflineIgnored);
        };

        if matches!(message, Message::OpenConnectionRequest2(_)) {
            // A new connection epoch starts numbering from zero
            self.outbound.reset_endpoint(&from);
        }

        let reply_id = reply.id();
        self.outbound.send_raw(from, reply.encode());
        Ok(DatagramOutcome::OfflineReply(reply_id))
    }

    fn handle_connected(
        &mut self,
        raw: &[u8],
        from: SocketAddr,
    ) -> Result<DatagramOutcome, DecodeError> {
        let package = ConnectedPackage::decode(raw)?;
        let sequence_number = package.sequence_number;

        // Acknowledge before dispatch, whatever the payload turns out to be
        self.outbound
            .send_raw(from, Ack::ack_single(sequence_number).encode());

        let routed = if let Some(split) = package.split {
            warn!(
                "Dropping split frame {}/{} (id {}) from {}",
                split.index.saturating_add(1),
                split.count,
                split.id,
                from
            );
            Routed::Split
        } else {
            self.route(package.message()?, from)
        };

        Ok(DatagramOutcome::Connected {
            sequence_number,
            routed,
        })
    }

    fn route(&mut self, message: Message, from: SocketAddr) -> Routed {
        if !message.is_ping_traffic() {
            debug!("< {} from {}", message.name(), from);
        }

        match message {
            Message::ConnectedPing(ping) => {
                let pong = Message::ConnectedPong(ConnectedPong {
                    send_ping_time: ping.send_ping_time,
                    send_pong_time: get_timestamp(),
                });
                self.outbound.send_reliable(from, &pong);
                Routed::Pong
            }
            Message::ConnectionRequest(request) => {
                let accepted = Message::ConnectionRequestAccepted(ConnectionRequestAccepted {
                    client_address: from,
                    system_index: 0,
                    request_timestamp: request.timestamp,
                    accepted_timestamp: get_timestamp(),
                });
                self.outbound.send_reliable(from, &accepted);

                let session =
                    self.factory
                        .create_session(from, Arc::clone(&self.level), self.outbound.clone());
                let replaced = self.sessions.replace(from, session);
                Routed::Accepted { replaced }
            }
            Message::DisconnectionNotification => {
                let had_session = self.sessions.remove(&from);
                self.outbound.reset_endpoint(&from);
                if !had_session {
                    debug!("Disconnect from {} without a session", from);
                }
                Routed::Disconnected { had_session }
            }
            Message::Unknown { id, raw } => {
                debug!(
                    "Unknown message 0x{:02x} from {}: {}",
                    id,
                    from,
                    hex_dump(&raw)
                );
                Routed::Unknown(id)
            }
            other => match self.sessions.get_mut(&from) {
                Some(session) => Routed::Forwarded {
                    consumed: session.handle_message(other),
                },
                None => {
                    trace!("No session for {}, dropping {}", from, other.name());
                    Routed::NoSession
                }
            },
        }
    }

    /// Closes every session and forgets outbound state.
    pub fn shutdown(&mut self) {
        let closed = self.sessions.clear();
        let dropped = self.outbound.clear();
        info!(
            "Router shut down: {} sessions closed, {} queued datagrams dropped",
            closed, dropped
        );
    }
}

fn format_records(ack: &Ack) -> String {
    ack.records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
