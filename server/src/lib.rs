//! # RakNet Server Library
//!
//! This library provides the transport core of a game server speaking a
//! RakNet-derived protocol over UDP. It answers discovery pings, walks
//! clients through the connection handshake, acknowledges connected
//! datagrams, and routes decoded messages to per-endpoint sessions owned by
//! the game layer.
//!
//! ## Core Responsibilities
//!
//! ### Offline Handshake
//! Unconnected pings and the two open-connection requests are answered
//! statelessly by the offline handler. Nothing is remembered about a peer
//! until it completes a `ConnectionRequest` over a connected datagram.
//!
//! ### Connected Datagrams
//! Every valid data datagram is acknowledged before its message is looked at.
//! Inbound ACKs and NAKs are decoded and logged; there is no retransmission
//! buffer, so a NAKed datagram is not resent.
//!
//! ### Session Routing
//! A `ConnectionRequest` creates a session through the configured
//! [`session::SessionFactory`], overwriting any previous session at the same
//! endpoint. Later messages from that endpoint go to
//! [`session::Session::handle_message`]; messages from endpoints without a
//! session are dropped.
//!
//! ## Architecture Design
//!
//! ### Two Tasks, One Socket
//! The receive task waits on the socket and handles each datagram to
//! completion, including any session callbacks. It never writes to the
//! socket: replies are pushed onto the send queue. The pump task wakes on a
//! fixed interval and writes at most `datagrams_per_tick` queued datagrams.
//!
//! ### Shared State
//! The send queue is the only structure both tasks touch, guarded by one
//! mutex held for a single push or pop. The session directory lives inside
//! the receive task and needs no locking.
//!
//! ### Shutdown
//! Both tasks watch one cancellation token. `stop()` cancels it, waits for
//! both tasks, closes every session, and drops whatever is still queued.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Server settings with defaults, loadable from a JSON file.
//!
//! ### Network Module (`network`)
//! The [`network::Server`] type with `start()`/`stop()` and the receive loop.
//!
//! ### Router Module (`router`)
//! Per-datagram dispatch between the offline handler, ACK/NAK logging and
//! session routing.
//!
//! ### Outbound and Send Queue Modules (`outbound`, `send_queue`)
//! Per-endpoint sequence numbering, the [`outbound::Outbound`] send handle,
//! and the pump.
//!
//! ### Session Modules (`session`, `session_manager`)
//! The session contract for the game layer and the endpoint directory.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::session::PlayerFactory;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Listen on 0.0.0.0:19132 with the default MOTD and a 30ms pump
//!     let mut server = Server::new(ServerConfig::default(), Arc::new(PlayerFactory));
//!
//!     if !server.start().await {
//!         return;
//!     }
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     server.stop().await;
//! }
//! ```
//!
//! ## Known Limits
//!
//! ### Throughput
//! With the default one datagram per 30ms tick, the server emits about 33
//! datagrams per second across all peers. Bursts are queued, never dropped,
//! so latency grows under load. Raise `datagrams_per_tick` or shorten
//! `pump_interval_ms` to trade smoothing for throughput.
//!
//! ### Reliability
//! Reliable modes are numbered and framed correctly, but lost datagrams are
//! not resent and split frames are not reassembled. One frame holds at most
//! `shared::MAX_PAYLOAD_LEN` bytes; `Outbound::send` refuses anything larger.
//!
//! ### Peer state
//! There is no liveness timeout. Outbound counters for an endpoint are dropped
//! on `DisconnectionNotification`, on a new `OpenConnectionRequest2`, and on
//! stop. A peer that vanishes without disconnecting keeps its counters (and
//! its session) until the server stops, so the map grows with every such peer.

pub mod config;
pub mod error;
pub mod network;
pub mod offline;
pub mod outbound;
pub mod router;
pub mod send_queue;
pub mod session;
pub mod session_manager;
pub mod utils;
