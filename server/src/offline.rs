//! Stateless responder for unconnected (pre-session) messages.

use log::debug;
use shared::message::{OpenConnectionReply1, OpenConnectionReply2, UnconnectedPong};
use shared::Message;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct OfflineHandler {
    server_guid: u64,
    motd: String,
}

impl OfflineHandler {
    pub fn new(server_guid: u64, motd: impl Into<String>) -> Self {
        Self {
            server_guid,
            motd: motd.into(),
        }
    }

    /// Returns the single reply for a recognised offline message, or `None`
    /// for anything that is not part of the unconnected handshake.
    pub fn respond(&self, message: &Message, from: SocketAddr) -> Option<Message> {
        match message {
            Message::UnconnectedPing(ping) => Some(Message::UnconnectedPong(UnconnectedPong {
                ping_id: ping.ping_id,
                server_guid: self.server_guid,
                server_name: self.motd.clone(),
            })),
            Message::OpenConnectionRequest1(request) => {
                debug!(
                    "Open connection request 1 from {} (protocol {}, mtu {})",
                    from, request.protocol_version, request.mtu_size
                );
                Some(Message::OpenConnectionReply1(OpenConnectionReply1 {
                    server_guid: self.server_guid,
                    use_security: false,
                    mtu_size: request.mtu_size,
                }))
            }
            Message::OpenConnectionRequest2(request) => {
                debug!(
                    "Open connection request 2 from {} (guid {}, mtu {})",
                    from, request.client_guid, request.mtu_size
                );
                Some(Message::OpenConnectionReply2(OpenConnectionReply2 {
                    server_guid: self.server_guid,
                    client_udp_port: from.port(),
                    mtu_size: request.mtu_size,
                    use_security: false,
                }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::{
        ConnectionRequest, OpenConnectionRequest1, OpenConnectionRequest2, UnconnectedPing,
    };

    fn handler() -> OfflineHandler {
        OfflineHandler::new(12345, "MCCPP;Demo;MiNET - Another MC server")
    }

    fn client() -> SocketAddr {
        "192.168.1.20:50123".parse().unwrap()
    }

    #[test]
    fn test_both_ping_variants_get_pong() {
        for open_connections in [false, true] {
            let ping = Message::UnconnectedPing(UnconnectedPing {
                ping_id: 0xabcdef,
                client_guid: Some(1),
                open_connections,
            });

            match handler().respond(&ping, client()) {
                Some(Message::UnconnectedPong(pong)) => {
                    assert_eq!(pong.ping_id, 0xabcdef);
                    assert_eq!(pong.server_guid, 12345);
                    assert_eq!(pong.server_name, "MCCPP;Demo;MiNET - Another MC server");
                }
                other => panic!("Unexpected reply: {:?}", other),
            }
        }
    }

    #[test]
    fn test_request_1_echoes_mtu() {
        let request = Message::OpenConnectionRequest1(OpenConnectionRequest1 {
            protocol_version: 5,
            mtu_size: 1192,
        });

        assert_eq!(
            handler().respond(&request, client()),
            Some(Message::OpenConnectionReply1(OpenConnectionReply1 {
                server_guid: 12345,
                use_security: false,
                mtu_size: 1192,
            }))
        );
    }

    #[test]
    fn test_request_2_uses_observed_port() {
        let request = Message::OpenConnectionRequest2(OpenConnectionRequest2 {
            server_address: "10.0.0.1:19132".parse().unwrap(),
            mtu_size: 1464,
            client_guid: 42,
        });

        assert_eq!(
            handler().respond(&request, client()),
            Some(Message::OpenConnectionReply2(OpenConnectionReply2 {
                server_guid: 12345,
                client_udp_port: 50123,
                mtu_size: 1464,
                use_security: false,
            }))
        );
    }

    #[test]
    fn test_connected_messages_get_no_reply() {
        let request = Message::ConnectionRequest(ConnectionRequest {
            client_guid: 1,
            timestamp: 2,
            use_security: false,
        });
        assert_eq!(handler().respond(&request, client()), None);
        assert_eq!(
            handler().respond(&Message::DisconnectionNotification, client()),
            None
        );
    }
}
