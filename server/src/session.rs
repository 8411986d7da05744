//! The contract between the transport core and the game layer.
//!
//! The core owns sessions but never looks inside them: it creates one through
//! a [`SessionFactory`] when a connection request completes, hands it every
//! decoded message from its endpoint, and calls [`Session::on_close`] when the
//! session is replaced, disconnected, or dropped at shutdown. Sessions send
//! through the [`Outbound`] handle they were created with.

use log::{debug, info};
use shared::message::ConnectedPing;
use shared::Message;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::outbound::Outbound;
use crate::utils::get_timestamp;

/// World context a session is bound to. Owned by the game layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub name: String,
}

impl Level {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Per-endpoint application state created after a successful handshake.
pub trait Session: Send {
    /// Handles one decoded message. Returns whether the session consumed it.
    fn handle_message(&mut self, message: Message) -> bool;

    /// Called exactly once when the core lets go of this session.
    fn on_close(&mut self) {}
}

pub trait SessionFactory: Send + Sync {
    fn create_session(
        &self,
        endpoint: SocketAddr,
        level: Arc<Level>,
        outbound: Outbound,
    ) -> Box<dyn Session>;
}

/// Default session used by the `server` binary.
pub struct Player {
    endpoint: SocketAddr,
    level: Arc<Level>,
    outbound: Outbound,
    joined: bool,
}

impl Player {
    pub fn new(endpoint: SocketAddr, level: Arc<Level>, outbound: Outbound) -> Self {
        Self {
            endpoint,
            level,
            outbound,
            joined: false,
        }
    }

    pub fn has_joined(&self) -> bool {
        self.joined
    }
}

impl Session for Player {
    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::NewIncomingConnection(_) => {
                self.joined = true;
                info!("Player {} joined level '{}'", self.endpoint, self.level.name);

                // Start latency measurement right away
                let ping = Message::ConnectedPing(ConnectedPing {
                    send_ping_time: get_timestamp(),
                });
                self.outbound.send_reliable(self.endpoint, &ping);
                true
            }
            Message::ConnectedPong(pong) => {
                let rtt = get_timestamp().saturating_sub(pong.send_ping_time);
                debug!("Player {} round trip {}ms", self.endpoint, rtt);
                true
            }
            other => {
                debug!("Player {} ignored {}", self.endpoint, other.name());
                false
            }
        }
    }

    fn on_close(&mut self) {
        info!("Player {} left level '{}'", self.endpoint, self.level.name);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlayerFactory;

impl SessionFactory for PlayerFactory {
    fn create_session(
        &self,
        endpoint: SocketAddr,
        level: Arc<Level>,
        outbound: Outbound,
    ) -> Box<dyn Session> {
        Box::new(Player::new(endpoint, level, outbound))
    }
}
