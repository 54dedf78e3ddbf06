//! Server network layer: UDP intake, per-session workers, the outbound
//! sender and the periodic simulation ticks

use crate::config::ServerConfig;
use crate::game::Game;
use crate::session::INBOX_CAPACITY;
use log::{error, info, trace, warn};
use shared::catalog::Catalog;
use shared::protocol::{Frame, Packet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const RECV_BUFFER_LEN: usize = 4096;

/// Delivery class requested for an outbound packet
///
/// Every packet still travels as one best-effort datagram; the class is
/// carried for logging and for a future reliability layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Structural events: spawn, disconnect, inventory, crafting
    ReliableOrdered,
    /// Newest value wins: movement relay
    Sequenced,
    /// Loss tolerated: stats sync, resource health
    Unreliable,
}

/// Messages sent from game logic to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
        delivery: Delivery,
    },
    SendToPlayer {
        packet: Packet,
        player_id: u32,
        delivery: Delivery,
    },
    /// Sent to every session that owns a player, except `exclude`
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
        delivery: Delivery,
    },
}

/// UDP front end for one game world
pub struct Server {
    socket: Arc<UdpSocket>,
    game: Game,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig, catalog: Catalog) -> ServerResult<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let game = Game::new(config, catalog, game_tx);

        Ok(Server {
            socket,
            game,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle onto the world this server drives
    pub fn game(&self) -> Game {
        self.game.clone()
    }

    /// Spawns the task that drains the outbound queue
    ///
    /// A single sender keeps packets for one peer in the order game logic
    /// queued them.
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let sessions = self.game.sessions();

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket {
                        packet,
                        addr,
                        delivery,
                    } => {
                        send_packet_impl(&socket, &packet.encode(), addr, delivery).await;
                    }
                    GameMessage::SendToPlayer {
                        packet,
                        player_id,
                        delivery,
                    } => {
                        let addr = sessions.read().await.addr_of_player(player_id);
                        match addr {
                            Some(addr) => {
                                send_packet_impl(&socket, &packet.encode(), addr, delivery).await
                            }
                            None => trace!("No session for player {}", player_id),
                        }
                    }
                    GameMessage::BroadcastPacket {
                        packet,
                        exclude,
                        delivery,
                    } => {
                        let targets = sessions.read().await.player_addrs();
                        let bytes = packet.encode();
                        for (player_id, addr) in targets {
                            if Some(player_id) == exclude {
                                continue;
                            }
                            send_packet_impl(&socket, &bytes, addr, delivery).await;
                        }
                    }
                }
            }
        });
    }

    /// Spawns one independent task per periodic simulation loop
    fn spawn_ticks(&self) {
        let config = self.game.config().clone();

        spawn_periodic("stats tick", config.stats_tick, self.game(), |game| async move {
            game.tick_stats().await
        });
        spawn_periodic("stats sync", config.stats_sync, self.game(), |game| async move {
            game.sync_stats().await
        });
        spawn_periodic(
            "resource sweep",
            config.resource_sweep,
            self.game(),
            |game| async move { game.sweep_resources().await },
        );
        spawn_periodic(
            "timeout sweep",
            config.timeout_sweep,
            self.game(),
            |game| async move { game.sweep_timeouts().await },
        );
        spawn_periodic("craft sweep", config.craft_sweep, self.game(), |game| async move {
            game.sweep_crafting().await
        });
    }

    /// Starts the worker that handles one session's frames in arrival
    /// order, plus a supervisor that tears the session down if the worker
    /// panics
    fn spawn_session(&self, addr: SocketAddr) -> mpsc::Sender<Frame> {
        let (inbox_tx, mut inbox_rx) = mpsc::channel::<Frame>(INBOX_CAPACITY);

        let game = self.game();
        let worker = tokio::spawn(async move {
            while let Some(frame) = inbox_rx.recv().await {
                game.handle_frame(addr, frame).await;
            }
        });

        let game = self.game();
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!("Session worker for {} failed: {}", addr, e);
                game.disconnect(addr, "worker failure").await;
            }
        });

        inbox_tx
    }

    /// Hands a datagram to its session, opening one for new addresses
    async fn route_datagram(&self, data: &[u8], addr: SocketAddr) {
        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Malformed datagram from {}: {}", addr, e);
                return;
            }
        };
        if let Err(e) = frame.packet_type() {
            warn!("Malformed datagram from {}: {}", addr, e);
            return;
        }

        let sessions = self.game.sessions();
        let mut sessions = sessions.write().await;

        if let Some(session) = sessions.get_mut(addr) {
            match session.deliver(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Session {} is flooding, dropping frame", addr)
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Session worker for {} is gone, dropping frame", addr)
                }
            }
            return;
        }

        if sessions.is_full() {
            warn!("Server full, dropping frame from {}", addr);
            return;
        }

        let inbox = self.spawn_session(addr);
        if sessions.open(addr, inbox) {
            if let Some(session) = sessions.get_mut(addr) {
                if let Err(e) = session.deliver(frame) {
                    warn!("First frame from {} not queued: {}", addr, e);
                }
            }
        }
    }

    /// Runs the receive loop; ticks and the sender run as their own tasks
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_network_sender();
        self.spawn_ticks();

        info!("Server started successfully");

        let mut buffer = [0u8; RECV_BUFFER_LEN];
        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => self.route_datagram(&buffer[..len], addr).await,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

async fn send_packet_impl(socket: &UdpSocket, bytes: &[u8], addr: SocketAddr, delivery: Delivery) {
    trace!("Sending {} bytes to {} ({:?})", bytes.len(), addr, delivery);
    if let Err(e) = socket.send_to(bytes, addr).await {
        error!("Failed to send packet to {}: {}", addr, e);
    }
}

/// Runs `task` every `period`; a panic in one run is logged and the next
/// run still happens
fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, game: Game, task: F)
where
    F: Fn(Game) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = tokio::spawn(task(game.clone())).await {
                error!("{} failed: {}", name, e);
            }
        }
    });
}
