//! Message registry: maps a message-id byte to a typed decoder and back.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::codec::{
    read_address, read_bool, read_magic, read_u16, read_u64, read_u8, read_string,
    write_address, write_magic, write_string,
};
use crate::error::DecodeError;

/// Message ids of the system messages this server understands.
pub mod id {
    pub const CONNECTED_PING: u8 = 0x00;
    pub const UNCONNECTED_PING: u8 = 0x01;
    pub const UNCONNECTED_PING_OPEN_CONNECTIONS: u8 = 0x02;
    pub const CONNECTED_PONG: u8 = 0x03;
    pub const OPEN_CONNECTION_REQUEST_1: u8 = 0x05;
    pub const OPEN_CONNECTION_REPLY_1: u8 = 0x06;
    pub const OPEN_CONNECTION_REQUEST_2: u8 = 0x07;
    pub const OPEN_CONNECTION_REPLY_2: u8 = 0x08;
    pub const CONNECTION_REQUEST: u8 = 0x09;
    pub const CONNECTION_REQUEST_ACCEPTED: u8 = 0x10;
    pub const NEW_INCOMING_CONNECTION: u8 = 0x13;
    pub const DISCONNECTION_NOTIFICATION: u8 = 0x15;
    pub const UNCONNECTED_PONG: u8 = 0x1c;
}

/// IP + UDP header bytes the MTU discovery request does not see in the datagram itself.
pub const UDP_HEADER_OVERHEAD: u16 = 28;

/// Smallest MTU an `OpenConnectionRequest1` can express: the unpadded id,
/// magic and protocol version plus the header overhead.
pub const MIN_OPEN_CONNECTION_MTU: u16 = 18 + UDP_HEADER_OVERHEAD;

/// Number of internal addresses listed in connection handshake messages.
const INTERNAL_ADDRESS_COUNT: usize = 10;

fn internal_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)), 19132)
}

/// Skips the internal address list, leaving the two trailing timestamps.
fn skip_internal_addresses(src: &mut impl Buf) -> Result<(), DecodeError> {
    while src.remaining() > 16 {
        read_address(src)?;
    }
    Ok(())
}

fn write_internal_addresses(dst: &mut impl BufMut) {
    let addr = internal_address();
    for _ in 0..INTERNAL_ADDRESS_COUNT {
        write_address(dst, &addr);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconnectedPing {
    pub ping_id: u64,
    pub client_guid: Option<u64>,
    /// Sent as `UNCONNECTED_PING_OPEN_CONNECTIONS` rather than `UNCONNECTED_PING`.
    pub open_connections: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconnectedPong {
    pub ping_id: u64,
    pub server_guid: u64,
    pub server_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest1 {
    pub protocol_version: u8,
    /// Carried as padding, so it decodes as at least [`MIN_OPEN_CONNECTION_MTU`].
    pub mtu_size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply1 {
    pub server_guid: u64,
    pub use_security: bool,
    pub mtu_size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest2 {
    pub server_address: SocketAddr,
    pub mtu_size: u16,
    pub client_guid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply2 {
    pub server_guid: u64,
    pub client_udp_port: u16,
    pub mtu_size: u16,
    pub use_security: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPing {
    pub send_ping_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPong {
    pub send_ping_time: u64,
    pub send_pong_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub client_guid: u64,
    pub timestamp: u64,
    pub use_security: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequestAccepted {
    pub client_address: SocketAddr,
    pub system_index: u16,
    pub request_timestamp: u64,
    pub accepted_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncomingConnection {
    pub server_address: SocketAddr,
    pub request_timestamp: u64,
    pub accepted_timestamp: u64,
}

/// A decoded application unit. Every registered id has a variant; anything
/// else lands in `Unknown` with its raw bytes intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ConnectedPing(ConnectedPing),
    UnconnectedPing(UnconnectedPing),
    ConnectedPong(ConnectedPong),
    OpenConnectionRequest1(OpenConnectionRequest1),
    OpenConnectionReply1(OpenConnectionReply1),
    OpenConnectionRequest2(OpenConnectionRequest2),
    OpenConnectionReply2(OpenConnectionReply2),
    ConnectionRequest(ConnectionRequest),
    ConnectionRequestAccepted(ConnectionRequestAccepted),
    NewIncomingConnection(NewIncomingConnection),
    DisconnectionNotification,
    UnconnectedPong(UnconnectedPong),
    Unknown { id: u8, raw: Bytes },
}

impl Message {
    /// The id byte this message is written with.
    pub fn id(&self) -> u8 {
        match self {
            Message::ConnectedPing(_) => id::CONNECTED_PING,
            Message::UnconnectedPing(ping) if ping.open_connections => {
                id::UNCONNECTED_PING_OPEN_CONNECTIONS
            }
            Message::UnconnectedPing(_) => id::UNCONNECTED_PING,
            Message::ConnectedPong(_) => id::CONNECTED_PONG,
            Message::OpenConnectionRequest1(_) => id::OPEN_CONNECTION_REQUEST_1,
            Message::OpenConnectionReply1(_) => id::OPEN_CONNECTION_REPLY_1,
            Message::OpenConnectionRequest2(_) => id::OPEN_CONNECTION_REQUEST_2,
            Message::OpenConnectionReply2(_) => id::OPEN_CONNECTION_REPLY_2,
            Message::ConnectionRequest(_) => id::CONNECTION_REQUEST,
            Message::ConnectionRequestAccepted(_) => id::CONNECTION_REQUEST_ACCEPTED,
            Message::NewIncomingConnection(_) => id::NEW_INCOMING_CONNECTION,
            Message::DisconnectionNotification => id::DISCONNECTION_NOTIFICATION,
            Message::UnconnectedPong(_) => id::UNCONNECTED_PONG,
            Message::Unknown { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::ConnectedPing(_) => "ConnectedPing",
            Message::UnconnectedPing(_) => "UnconnectedPing",
            Message::ConnectedPong(_) => "ConnectedPong",
            Message::OpenConnectionRequest1(_) => "OpenConnectionRequest1",
            Message::OpenConnectionReply1(_) => "OpenConnectionReply1",
            Message::OpenConnectionRequest2(_) => "OpenConnectionRequest2",
            Message::OpenConnectionReply2(_) => "OpenConnectionReply2",
            Message::ConnectionRequest(_) => "ConnectionRequest",
            Message::ConnectionRequestAccepted(_) => "ConnectionRequestAccepted",
            Message::NewIncomingConnection(_) => "NewIncomingConnection",
            Message::DisconnectionNotification => "DisconnectionNotification",
            Message::UnconnectedPong(_) => "UnconnectedPong",
            Message::Unknown { .. } => "Unknown",
        }
    }

    /// Keep-alive traffic that diagnostics skip.
    pub fn is_ping_traffic(&self) -> bool {
        matches!(
            self,
            Message::ConnectedPing(_)
                | Message::ConnectedPong(_)
                | Message::UnconnectedPing(_)
                | Message::UnconnectedPong(_)
        )
    }

    /// Decodes a message, falling back to `Unknown` for unregistered ids and
    /// for bodies that fail structural decode.
    pub fn decode(raw: &[u8]) -> Result<Message, DecodeError> {
        let Some(&first) = raw.first() else {
            return Err(DecodeError::EmptyPayload);
        };
        Ok(Self::try_decode(raw).unwrap_or_else(|_| Message::Unknown {
            id: first,
            raw: Bytes::copy_from_slice(raw),
        }))
    }

    /// Strict decode: unregistered ids and short bodies are errors.
    pub fn try_decode(raw: &[u8]) -> Result<Message, DecodeError> {
        let mut src = raw;
        let msg_id = read_u8(&mut src)?;

        let message = match msg_id {
            id::CONNECTED_PING => Message::ConnectedPing(ConnectedPing {
                send_ping_time: read_u64(&mut src)?,
            }),
            id::UNCONNECTED_PING | id::UNCONNECTED_PING_OPEN_CONNECTIONS => {
                let ping_id = read_u64(&mut src)?;
                read_magic(&mut src)?;
                let client_guid = if src.remaining() >= 8 {
                    Some(read_u64(&mut src)?)
                } else {
                    None
                };
                Message::UnconnectedPing(UnconnectedPing {
                    ping_id,
                    client_guid,
                    open_connections: msg_id == id::UNCONNECTED_PING_OPEN_CONNECTIONS,
                })
            }
            id::CONNECTED_PONG => Message::ConnectedPong(ConnectedPong {
                send_ping_time: read_u64(&mut src)?,
                send_pong_time: read_u64(&mut src)?,
            }),
            id::OPEN_CONNECTION_REQUEST_1 => {
                read_magic(&mut src)?;
                let protocol_version = read_u8(&mut src)?;
                let mtu = (raw.len() as u64 + u64::from(UDP_HEADER_OVERHEAD)).min(u16::MAX as u64);
                Message::OpenConnectionRequest1(OpenConnectionRequest1 {
                    protocol_version,
                    mtu_size: mtu as u16,
                })
            }
            id::OPEN_CONNECTION_REPLY_1 => {
                read_magic(&mut src)?;
                Message::OpenConnectionReply1(OpenConnectionReply1 {
                    server_guid: read_u64(&mut src)?,
                    use_security: read_bool(&mut src)?,
                    mtu_size: read_u16(&mut src)?,
                })
            }
            id::OPEN_CONNECTION_REQUEST_2 => {
                read_magic(&mut src)?;
                Message::OpenConnectionRequest2(OpenConnectionRequest2 {
                    server_address: read_address(&mut src)?,
                    mtu_size: read_u16(&mut src)?,
                    client_guid: read_u64(&mut src)?,
                })
            }
            id::OPEN_CONNECTION_REPLY_2 => {
                read_magic(&mut src)?;
                Message::OpenConnectionReply2(OpenConnectionReply2 {
                    server_guid: read_u64(&mut src)?,
                    client_udp_port: read_u16(&mut src)?,
                    mtu_size: read_u16(&mut src)?,
                    use_security: read_bool(&mut src)?,
                })
            }
            id::CONNECTION_REQUEST => Message::ConnectionRequest(ConnectionRequest {
                client_guid: read_u64(&mut src)?,
                timestamp: read_u64(&mut src)?,
                use_security: read_bool(&mut src)?,
            }),
            id::CONNECTION_REQUEST_ACCEPTED => {
                let client_address = read_address(&mut src)?;
                let system_index = read_u16(&mut src)?;
                skip_internal_addresses(&mut src)?;
                Message::ConnectionRequestAccepted(ConnectionRequestAccepted {
                    client_address,
                    system_index,
                    request_timestamp: read_u64(&mut src)?,
                    accepted_timestamp: read_u64(&mut src)?,
                })
            }
            id::NEW_INCOMING_CONNECTION => {
                let server_address = read_address(&mut src)?;
                skip_internal_addresses(&mut src)?;
                Message::NewIncomingConnection(NewIncomingConnection {
                    server_address,
                    request_timestamp: read_u64(&mut src)?,
                    accepted_timestamp: read_u64(&mut src)?,
                })
            }
            id::DISCONNECTION_NOTIFICATION => Message::DisconnectionNotification,
            id::UNCONNECTED_PONG => {
                let ping_id = read_u64(&mut src)?;
                let server_guid = read_u64(&mut src)?;
                read_magic(&mut src)?;
                Message::UnconnectedPong(UnconnectedPong {
                    ping_id,
                    server_guid,
                    server_name: read_string(&mut src)?,
                })
            }
            other => Message::Unknown {
                id: other,
                raw: Bytes::copy_from_slice(raw),
            },
        };

        Ok(message)
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(64);
        self.encode_into(&mut dst);
        dst.freeze()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        if let Message::Unknown { raw, .. } = self {
            dst.put_slice(raw);
            return;
        }

        let start = dst.len();
        dst.put_u8(self.id());

        match self {
            Message::ConnectedPing(msg) => dst.put_u64(msg.send_ping_time),
            Message::UnconnectedPing(msg) => {
                dst.put_u64(msg.ping_id);
                write_magic(dst);
                if let Some(guid) = msg.client_guid {
                    dst.put_u64(guid);
                }
            }
            Message::ConnectedPong(msg) => {
                dst.put_u64(msg.send_ping_time);
                dst.put_u64(msg.send_pong_time);
            }
            Message::OpenConnectionRequest1(msg) => {
                write_magic(dst);
                dst.put_u8(msg.protocol_version);
                let target = msg.mtu_size.saturating_sub(UDP_HEADER_OVERHEAD) as usize;
                let written = dst.len() - start;
                if target > written {
                    dst.put_bytes(0, target - written);
                }
            }
            Message::OpenConnectionReply1(msg) => {
                write_magic(dst);
                dst.put_u64(msg.server_guid);
                dst.put_u8(u8::from(msg.use_security));
                dst.put_u16(msg.mtu_size);
            }
            Message::OpenConnectionRequest2(msg) => {
                write_magic(dst);
                write_address(dst, &msg.server_address);
                dst.put_u16(msg.mtu_size);
                dst.put_u64(msg.client_guid);
            }
            Message::OpenConnectionReply2(msg) => {
                write_magic(dst);
                dst.put_u64(msg.server_guid);
                dst.put_u16(msg.client_udp_port);
                dst.put_u16(msg.mtu_size);
                dst.put_u8(u8::from(msg.use_security));
            }
            Message::ConnectionRequest(msg) => {
                dst.put_u64(msg.client_guid);
                dst.put_u64(msg.timestamp);
                dst.put_u8(u8::from(msg.use_security));
            }
            Message::ConnectionRequestAccepted(msg) => {
                write_address(dst, &msg.client_address);
                dst.put_u16(msg.system_index);
                write_internal_addresses(dst);
                dst.put_u64(msg.request_timestamp);
                dst.put_u64(msg.accepted_timestamp);
            }
            Message::NewIncomingConnection(msg) => {
                write_address(dst, &msg.server_address);
                write_internal_addresses(dst);
                dst.put_u64(msg.request_timestamp);
                dst.put_u64(msg.accepted_timestamp);
            }
            Message::DisconnectionNotification => {}
            Message::UnconnectedPong(msg) => {
                dst.put_u64(msg.ping_id);
                dst.put_u64(msg.server_guid);
                write_magic(dst);
                write_string(dst, &msg.server_name);
            }
            Message::Unknown { .. } => {}
        }
    }
}
