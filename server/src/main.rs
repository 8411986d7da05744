use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use server::session::PlayerFactory;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Command line arguments. Flags override values from `--config`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file; missing fields fall back to defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to bind, e.g. 0.0.0.0:19132
    #[arg(short, long)]
    bind: Option<SocketAddr>,
    /// Port to listen on, keeping the configured IP
    #[arg(short, long)]
    port: Option<u16>,
    /// Server GUID advertised to clients
    #[arg(long)]
    guid: Option<u64>,
    /// Server name returned to discovery pings
    #[arg(short, long)]
    motd: Option<String>,
    /// Send pump interval in milliseconds
    #[arg(long)]
    pump_interval_ms: Option<u64>,
    /// Datagrams written per pump tick
    #[arg(long)]
    datagrams_per_tick: Option<usize>,
    /// Receive buffer size in bytes
    #[arg(long)]
    buffer_size: Option<usize>,
    /// Level name handed to new sessions
    #[arg(short, long)]
    level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.bind_address.set_port(port);
        }
        if let Some(guid) = self.guid {
            config.server_guid = guid;
        }
        if let Some(motd) = self.motd {
            config.motd = motd;
        }
        if let Some(interval) = self.pump_interval_ms {
            config.pump_interval_ms = interval;
        }
        if let Some(count) = self.datagrams_per_tick {
            config.datagrams_per_tick = count;
        }
        if let Some(size) = self.buffer_size {
            config.receive_buffer_size = size;
        }
        if let Some(level) = self.level {
            config.level_name = level;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    info!(
        "Starting '{}' (guid {}) on {}",
        config.motd, config.server_guid, config.bind_address
    );

    let mut server = Server::new(config, Arc::new(PlayerFactory));
    server.try_start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");
    server.stop().await;

    Ok(())
}
