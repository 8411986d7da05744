use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("failed to query local socket address: {0}")]
    LocalAddr(#[source] io::Error),
    #[error("server is already running")]
    AlreadyRunning,
    #[error("failed to read config file {path}: {source}")]
    ConfigIo { path: PathBuf, source: io::Error },
    #[error("invalid config file {path}: {source}")]
    ConfigJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}
