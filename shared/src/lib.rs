pub mod ack;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod header;
pub mod message;
pub mod reliability;

pub use ack::{Ack, AckKind, AckRecord};
pub use envelope::{ConnectedPackage, SplitInfo, MAX_PAYLOAD_LEN};
pub use error::{DecodeError, EncodeError, MalformedDatagram};
pub use header::{DatagramFlags, DatagramHeader, DatagramKind};
pub use message::Message;
pub use reliability::Reliability;

pub const DEFAULT_PORT: u16 = 19132;
pub const DEFAULT_SERVER_GUID: u64 = 12345;
pub const DEFAULT_MOTD: &str = "MCCPP;Demo;MiNET - Another MC server";
pub const RAKNET_PROTOCOL_VERSION: u8 = 5;
