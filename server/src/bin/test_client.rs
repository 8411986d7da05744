//! Probe for a running server: pings it and optionally walks the full handshake.

use clap::Parser;
use rand::Rng;
use server::utils::get_timestamp;
use shared::header::is_offline_id;
use shared::message::{
    ConnectedPing, ConnectionRequest, NewIncomingConnection, OpenConnectionRequest1,
    OpenConnectionRequest2, UnconnectedPing,
};
use shared::{
    Ack, ConnectedPackage, DatagramHeader, DatagramKind, Message, Reliability,
    RAKNET_PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:19132")]
    server: SocketAddr,
    /// Number of discovery pings to send
    #[arg(short, long, default_value = "1")]
    pings: u32,
    /// Complete the connection handshake after pinging
    #[arg(long)]
    handshake: bool,
    /// MTU to request during the handshake
    #[arg(long, default_value = "1464")]
    mtu: u16,
    /// Seconds to wait for each reply
    #[arg(long, default_value = "2")]
    wait: u64,
}

/// Connected-side counters for the probe's own datagrams.
struct Probe {
    socket: UdpSocket,
    server: SocketAddr,
    wait: Duration,
    sequence_number: u32,
    reliable_message_number: u32,
}

impl Probe {
    async fn send_offline(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        self.socket.send_to(&message.encode(), self.server).await?;
        Ok(())
    }

    async fn send_connected(&mut self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let mut package =
            ConnectedPackage::new(self.sequence_number, Reliability::Reliable, message.encode());
        package.reliable_message_number = Some(self.reliable_message_number);
        self.sequence_number += 1;
        self.reliable_message_number += 1;

        self.socket.send_to(&package.encode()?, self.server).await?;
        Ok(())
    }

    /// Waits for the next message, acknowledging and skipping ACK datagrams.
    async fn recv_message(&mut self) -> Result<Message, Box<dyn std::error::Error>> {
        let mut buf = [0u8; 2048];

        loop {
            let (len, _) = timeout(self.wait, self.socket.recv_from(&mut buf)).await??;
            let raw = &buf[..len];
            let Some(&first) = raw.first() else {
                continue;
            };

            if is_offline_id(first) {
                return Ok(Message::decode(raw)?);
            }

            match DatagramHeader::classify(first)? {
                DatagramKind::Ack | DatagramKind::Nak => {
                    let ack = Ack::decode(raw)?;
                    println!("  ({:?} for {} datagrams)", ack.kind, ack.count());
                }
                DatagramKind::Data => {
                    let package = ConnectedPackage::decode(raw)?;
                    let ack = Ack::ack_single(package.sequence_number).encode();
                    self.socket.send_to(&ack, self.server).await?;
                    return Ok(package.message()?);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut rng = rand::thread_rng();
    let client_guid: u64 = rng.gen();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let mut probe = Probe {
        socket,
        server: args.server,
        wait: Duration::from_secs(args.wait),
        sequence_number: 0,
        reliable_message_number: 0,
    };

    for _ in 0..args.pings {
        let ping_id: u64 = rng.gen();
        let sent_at = get_timestamp();
        probe
            .send_offline(&Message::UnconnectedPing(UnconnectedPing {
                ping_id,
                client_guid: Some(client_guid),
                open_connections: false,
            }))
            .await?;

        match probe.recv_message().await? {
            Message::UnconnectedPong(pong) if pong.ping_id == ping_id => {
                println!(
                    "Pong from {} in {}ms: guid {}, motd '{}'",
                    args.server,
                    get_timestamp().saturating_sub(sent_at),
                    pong.server_guid,
                    pong.server_name
                );
            }
            other => println!("Unexpected reply to ping: {:?}", other),
        }
    }

    if !args.handshake {
        return Ok(());
    }

    println!("Sending open connection request 1 (mtu {})", args.mtu);
    probe
        .send_offline(&Message::OpenConnectionRequest1(OpenConnectionRequest1 {
            protocol_version: RAKNET_PROTOCOL_VERSION,
            mtu_size: args.mtu,
        }))
        .await?;
    let mtu = match probe.recv_message().await? {
        Message::OpenConnectionReply1(reply) => {
            println!("Reply 1: server guid {}, mtu {}", reply.server_guid, reply.mtu_size);
            reply.mtu_size
        }
        other => return Err(format!("expected OpenConnectionReply1, got {:?}", other).into()),
    };

    probe
        .send_offline(&Message::OpenConnectionRequest2(OpenConnectionRequest2 {
            server_address: args.server,
            mtu_size: mtu,
            client_guid,
        }))
        .await?;
    match probe.recv_message().await? {
        Message::OpenConnectionReply2(reply) => {
            println!("Reply 2: server sees our port as {}", reply.client_udp_port);
        }
        other => return Err(format!("expected OpenConnectionReply2, got {:?}", other).into()),
    }

    let request_time = get_timestamp();
    probe
        .send_connected(&Message::ConnectionRequest(ConnectionRequest {
            client_guid,
            timestamp: request_time,
            use_security: false,
        }))
        .await?;
    let accepted = match probe.recv_message().await? {
        Message::ConnectionRequestAccepted(accepted) => {
            println!("Connection accepted, server sees us as {}", accepted.client_address);
            accepted
        }
        other => return Err(format!("expected ConnectionRequestAccepted, got {:?}", other).into()),
    };

    probe
        .send_connected(&Message::NewIncomingConnection(NewIncomingConnection {
            server_address: args.server,
            request_timestamp: accepted.request_timestamp,
            accepted_timestamp: accepted.accepted_timestamp,
        }))
        .await?;

    let ping_time = get_timestamp();
    probe
        .send_connected(&Message::ConnectedPing(ConnectedPing {
            send_ping_time: ping_time,
        }))
        .await?;
    loop {
        match probe.recv_message().await? {
            Message::ConnectedPong(pong) if pong.send_ping_time == ping_time => {
                println!("Connected round trip {}ms", get_timestamp().saturating_sub(ping_time));
                break;
            }
            other => println!("Received {}", other.name()),
        }
    }

    println!("Sending disconnect");
    probe
        .send_connected(&Message::DisconnectionNotification)
        .await?;
    // Give the ACK a chance to arrive before exiting
    let _ = timeout(Duration::from_millis(200), probe.recv_message()).await;

    println!("Test client finished");
    Ok(())
}
