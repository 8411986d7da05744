//! Server loop: owns the UDP socket and runs the receive and pump tasks.

use log::{error, info, trace, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::offline::OfflineHandler;
use crate::outbound::Outbound;
use crate::router::Router;
use crate::send_queue::{SendPump, SendQueue};
use crate::session::{Level, SessionFactory};
use crate::utils::hex_dump;

/// State that exists only between `start()` and `stop()`.
struct Running {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    receiver: JoinHandle<()>,
    pump: JoinHandle<()>,
}

/// RakNet server bound to a single UDP socket
pub struct Server {
    config: ServerConfig,
    factory: Arc<dyn SessionFactory>,
    level: Arc<Level>,
    outbound: Outbound,
    running: Option<Running>,
}

impl Server {
    pub fn new(config: ServerConfig, factory: Arc<dyn SessionFactory>) -> Self {
        let level = Arc::new(Level::new(config.level_name.clone()));
        Self {
            config,
            factory,
            level,
            outbound: Outbound::new(SendQueue::new()),
            running: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Send handle for the game layer. Datagrams queued while the server is
    /// stopped are written once it starts.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address actually bound, useful when configured with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Starts the server. Returns false if it was already running or if the
    /// socket could not be set up.
    pub async fn start(&mut self) -> bool {
        match self.try_start().await {
            Ok(()) => true,
            Err(ServerError::AlreadyRunning) => {
                warn!("Server already started");
                false
            }
            Err(e) => {
                error!("Failed to start server: {}", e);
                false
            }
        }
    }

    pub async fn try_start(&mut self) -> Result<(), ServerError> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = self.config.bind_address;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(ServerError::LocalAddr)?;
        let socket = Arc::new(socket);

        let shutdown = CancellationToken::new();
        let router = Router::new(
            OfflineHandler::new(self.config.server_guid, self.config.motd.clone()),
            self.outbound.clone(),
            Arc::clone(&self.factory),
            Arc::clone(&self.level),
        );

        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            router,
            self.config.receive_buffer_size,
            shutdown.clone(),
        ));
        let pump = SendPump::new(
            socket,
            self.outbound.queue().clone(),
            self.config.pump_interval(),
            self.config.datagrams_per_tick(),
        );
        let pump = tokio::spawn(pump.run(shutdown.clone()));

        info!("Server listening on {}", local_addr);
        self.running = Some(Running {
            local_addr,
            shutdown,
            receiver,
            pump,
        });
        Ok(())
    }

    /// Stops the server, closing every session. Always returns true; stopping
    /// a stopped server is a no-op.
    pub async fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return true;
        };

        running.shutdown.cancel();
        if let Err(e) = running.receiver.await {
            error!("Receive task failed: {}", e);
        }
        if let Err(e) = running.pump.await {
            error!("Send pump task failed: {}", e);
        }

        self.outbound.clear();
        info!("Server on {} stopped", running.local_addr);
        true
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.cancel();
        }
    }
}

/// Receives datagrams until cancelled, handing each to the router.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    mut router: Router,
    buffer_size: usize,
    shutdown: CancellationToken,
) {
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buffer) => result,
        };

        match result {
            Ok((len, from)) => {
                let raw = &buffer[..len];
                if let Err(e) = router.handle_datagram(raw, from) {
                    warn!("Dropped datagram from {}: {}", from, e);
                    trace!("Dropped bytes: {}", hex_dump(raw));
                }
            }
            // ICMP port unreachable from a peer that went away
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                trace!("Ignoring connection reset: {}", e);
            }
            Err(e) => {
                error!("Error receiving datagram: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    router.shutdown();
}
