//! Headless probe client: joins a running server, prints everything it
//! receives for a while, then logs out.

use clap::Parser;
use shared::protocol::Packet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep_until, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Probe client for the survival server")]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:7777")]
    server: SocketAddr,

    /// Display name to join with
    #[clap(short, long, default_value = "Probe")]
    name: String,

    /// How long to stay connected, in seconds
    #[clap(short, long, default_value = "10")]
    duration: u64,

    /// Resource id to hit once the world snapshot arrives
    #[clap(long)]
    gather: Option<u32>,
}

fn describe(packet: &Packet) -> String {
    match packet {
        Packet::ResourcesSync { resources } => format!("ResourcesSync ({} nodes)", resources.len()),
        Packet::RecipesSync { recipes } => format!("RecipesSync ({} recipes)", recipes.len()),
        Packet::InventoryUpdate { slots } => format!("InventoryUpdate ({} slots)", slots.len()),
        other => format!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);
    socket.connect(args.server).await?;

    println!("Sending connection request to {}", args.server);
    let request = Packet::ConnectionRequest {
        player_name: args.name.clone(),
    };
    socket.send(&request.encode()).await?;

    let mut buf = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut heartbeat = interval(Duration::from_secs(2));
    let mut player_id = None;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => break,
            _ = heartbeat.tick() => {
                if player_id.is_some() {
                    socket.send(&Packet::Heartbeat.encode()).await?;
                }
            }
            received = socket.recv(&mut buf) => {
                let len = received?;
                let packet = match Packet::decode(&buf[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        println!("Undecodable packet ({} bytes): {}", len, e);
                        continue;
                    }
                };
                println!("<- {}", describe(&packet));

                match packet {
                    Packet::ConnectionAccept { player_id: id, spawn } => {
                        println!("Accepted as player {} at {:?}", id, spawn);
                        player_id = Some(id);
                        socket.send(&Packet::ClientReady.encode()).await?;
                    }
                    Packet::ResourcesSync { .. } => {
                        if let Some(resource_id) = args.gather {
                            let hit = Packet::ResourceHit {
                                resource_id,
                                damage: 10.0,
                                tool_type: 0,
                            };
                            socket.send(&hit.encode()).await?;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if let Some(id) = player_id {
        socket
            .send(&Packet::PlayerDisconnect { player_id: id }.encode())
            .await?;
        println!("Logged out");
    }

    Ok(())
}
