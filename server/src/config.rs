//! Server configuration, loadable from JSON with every field optional.

use serde::{Deserialize, Serialize};
use shared::{DEFAULT_MOTD, DEFAULT_PORT, DEFAULT_SERVER_GUID};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the UDP socket binds to
    pub bind_address: SocketAddr,
    /// Identifier advertised in pongs and open-connection replies
    pub server_guid: u64,
    /// Server name string returned to discovery pings
    pub motd: String,
    /// Period of the send pump
    pub pump_interval_ms: u64,
    /// Maximum datagrams the pump writes per tick
    pub datagrams_per_tick: usize,
    pub receive_buffer_size: usize,
    /// Level handed to every new session
    pub level_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            server_guid: DEFAULT_SERVER_GUID,
            motd: DEFAULT_MOTD.to_string(),
            pump_interval_ms: 30,
            datagrams_per_tick: 1,
            receive_buffer_size: 2048,
            level_name: "Default".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ServerError::ConfigJson {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms.max(1))
    }

    /// Per-tick drain count, never below one so the pump always makes progress.
    pub fn datagrams_per_tick(&self) -> usize {
        self.datagrams_per_tick.max(1)
    }
}
