//! Authoritative world state and the handlers that mutate it
//!
//! `Game` is a cheap clonable handle; every session worker and every tick
//! task holds its own clone. Locking rules:
//! - the roster, the resource table and the session table each have their
//!   own lock, and no code path holds two of them at once
//! - a player's own mutex is only taken after the roster lock is released
//! - nothing is sent while a lock is held; packets are queued to the sender
//!   task once the state change is complete

use crate::config::ServerConfig;
use crate::inventory::{slot_index, InventoryError};
use crate::network::{Delivery, GameMessage};
use crate::player::Player;
use crate::resources::{GatherYield, ResourceManager, ToolType};
use crate::session::{SessionManager, SessionState};
use log::{debug, info, trace, warn};
use shared::catalog::{item_ids, Catalog};
use shared::protocol::{Frame, Packet};
use shared::{Vec2, Vec3};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};

pub type PlayerHandle = Arc<Mutex<Player>>;

#[derive(Clone)]
pub struct Game {
    config: Arc<ServerConfig>,
    catalog: Arc<Catalog>,
    players: Arc<RwLock<HashMap<u32, PlayerHandle>>>,
    resources: Arc<Mutex<ResourceManager>>,
    sessions: Arc<RwLock<SessionManager>>,
    next_player_id: Arc<AtomicU32>,
    outbox: mpsc::UnboundedSender<GameMessage>,
}

impl Game {
    pub fn new(
        config: ServerConfig,
        catalog: Catalog,
        outbox: mpsc::UnboundedSender<GameMessage>,
    ) -> Self {
        let resources = ResourceManager::new(config.world_seed, config.resource_respawn_delay);
        let sessions = SessionManager::new(config.max_clients);
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            players: Arc::new(RwLock::new(HashMap::new())),
            resources: Arc::new(Mutex::new(resources)),
            sessions: Arc::new(RwLock::new(sessions)),
            next_player_id: Arc::new(AtomicU32::new(1)),
            outbox,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> Arc<RwLock<SessionManager>> {
        Arc::clone(&self.sessions)
    }

    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn player(&self, player_id: u32) -> Option<PlayerHandle> {
        self.players.read().await.get(&player_id).cloned()
    }

    /// Health of a resource node, if it exists
    pub async fn resource_health(&self, resource_id: u32) -> Option<f32> {
        self.resources.lock().await.get(resource_id).map(|n| n.health)
    }

    async fn player_at(&self, addr: SocketAddr) -> Option<(u32, PlayerHandle)> {
        let player_id = self.sessions.read().await.player_id(addr)?;
        let handle = self.player(player_id).await?;
        Some((player_id, handle))
    }

    /// Copies the roster so sweeps never iterate under the roster lock
    async fn roster_snapshot(&self) -> Vec<(u32, PlayerHandle)> {
        self.players
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect()
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.outbox.send(message) {
            warn!("Outbound queue closed: {}", e);
        }
    }

    fn send(&self, addr: SocketAddr, packet: Packet, delivery: Delivery) {
        self.queue(GameMessage::SendPacket {
            packet,
            addr,
            delivery,
        });
    }

    fn send_to_player(&self, player_id: u32, packet: Packet, delivery: Delivery) {
        self.queue(GameMessage::SendToPlayer {
            packet,
            player_id,
            delivery,
        });
    }

    fn broadcast(&self, packet: Packet, exclude: Option<u32>, delivery: Delivery) {
        self.queue(GameMessage::BroadcastPacket {
            packet,
            exclude,
            delivery,
        });
    }

    /// Decodes and dispatches one inbound frame for the session at `addr`
    ///
    /// Malformed frames are logged and dropped; the session stays open.
    pub async fn handle_frame(&self, addr: SocketAddr, frame: Frame) {
        let packet = match Packet::from_frame(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping frame from {}: {}", addr, e);
                return;
            }
        };

        if packet.is_high_frequency() {
            trace!("{:?} from {}", packet.packet_type(), addr);
        } else {
            debug!("{:?} from {}", packet.packet_type(), addr);
        }

        match packet {
            Packet::ConnectionRequest { player_name } => {
                self.handle_connection_request(addr, &player_name).await
            }
            Packet::ClientReady => self.handle_client_ready(addr).await,
            Packet::Heartbeat => self.handle_heartbeat(addr).await,
            Packet::PlayerMovement {
                position, rotation, ..
            } => self.handle_movement(addr, position, rotation).await,
            Packet::PlayerDisconnect { .. } => self.disconnect(addr, "logout").await,
            Packet::PlayerRespawn { .. } => self.handle_respawn(addr).await,
            Packet::ItemUse { slot } => self.handle_item_use(addr, slot).await,
            Packet::ItemMove { from_slot, to_slot } => {
                self.handle_item_move(addr, from_slot, to_slot).await
            }
            Packet::ItemDrop { slot, quantity } => {
                self.handle_item_drop(addr, slot, quantity).await
            }
            Packet::HotbarSelect { index } => self.handle_hotbar_select(addr, index).await,
            Packet::ResourceHit {
                resource_id,
                damage,
                tool_type,
            } => {
                self.handle_resource_hit(addr, resource_id, damage, tool_type)
                    .await
            }
            Packet::CraftRequest { recipe_id } => self.handle_craft_request(addr, recipe_id).await,
            Packet::CraftCancel { queue_index } => {
                self.handle_craft_cancel(addr, queue_index).await
            }
            other => {
                warn!(
                    "Unexpected {:?} from client at {}",
                    other.packet_type(),
                    addr
                );
            }
        }
    }

    async fn handle_connection_request(&self, addr: SocketAddr, requested_name: &str) {
        let state = self.sessions.read().await.state(addr);
        if state != Some(SessionState::Connecting) {
            warn!(
                "Ignoring connection request from {} in state {:?}",
                addr, state
            );
            return;
        }

        let player_id = self.next_player_id.fetch_add(1, Ordering::SeqCst);
        let player = Player::new(player_id, requested_name, &self.catalog);
        let name = player.name.clone();
        let spawn = player.position;

        self.players
            .write()
            .await
            .insert(player_id, Arc::new(Mutex::new(player)));

        let bound = self.sessions.write().await.bind_player(addr, player_id);
        if !bound {
            // Session was torn down while the player was being created
            self.players.write().await.remove(&player_id);
            return;
        }

        info!("Player {} ({}) joined from {}", player_id, name, addr);
        self.send(
            addr,
            Packet::ConnectionAccept { player_id, spawn },
            Delivery::ReliableOrdered,
        );
    }

    async fn handle_client_ready(&self, addr: SocketAddr) {
        let (state, player_id) = {
            let sessions = self.sessions.read().await;
            (sessions.state(addr), sessions.player_id(addr))
        };
        let (Some(SessionState::AwaitingReady), Some(player_id)) = (state, player_id) else {
            warn!("Ignoring ready signal from {} in state {:?}", addr, state);
            return;
        };

        self.sessions
            .write()
            .await
            .set_state(addr, SessionState::Synchronizing);
        self.synchronize(addr, player_id).await;
    }

    /// Streams the initial world to a newly ready client
    ///
    /// Order is part of the protocol: inventory, existing players,
    /// resources, recipes, and only then the new player's own spawn
    /// broadcast to everyone else.
    async fn synchronize(&self, addr: SocketAddr, player_id: u32) {
        let Some(handle) = self.player(player_id).await else {
            return;
        };

        pace(self.config.sync_initial_delay).await;

        let (inventory, own_spawn) = {
            let player = handle.lock().await;
            (player.inventory_packet(), player.spawn_packet())
        };
        self.send(addr, inventory, Delivery::ReliableOrdered);

        let mut roster = Vec::new();
        for (id, other) in self.roster_snapshot().await {
            if id != player_id {
                roster.push(other.lock().await.spawn_packet());
            }
        }
        debug!("Sending {} roster entries to {}", roster.len(), addr);
        for spawn in roster {
            self.send(addr, spawn, Delivery::ReliableOrdered);
            pace(self.config.sync_roster_delay).await;
        }

        pace(self.config.sync_stage_delay).await;
        let resources = self.resources.lock().await.snapshot();
        self.send(
            addr,
            Packet::ResourcesSync { resources },
            Delivery::ReliableOrdered,
        );

        pace(self.config.sync_stage_delay).await;
        let recipes = self.catalog.recipes().map(|r| r.to_wire()).collect();
        self.send(addr, Packet::RecipesSync { recipes }, Delivery::ReliableOrdered);

        pace(self.config.sync_stage_delay).await;
        self.broadcast(own_spawn, Some(player_id), Delivery::ReliableOrdered);

        let now_active = self
            .sessions
            .write()
            .await
            .set_state(addr, SessionState::Active);
        if now_active {
            let stats = handle.lock().await.stats_packet();
            self.send(addr, stats, Delivery::Unreliable);
            info!("Player {} synchronized", player_id);
        }
    }

    async fn handle_heartbeat(&self, addr: SocketAddr) {
        if let Some((_, handle)) = self.player_at(addr).await {
            handle.lock().await.touch();
        }
    }

    async fn handle_movement(&self, addr: SocketAddr, position: Vec3, rotation: Vec2) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let accepted = {
            let mut player = handle.lock().await;
            let accepted = player.update_transform(position, rotation);
            if accepted {
                player.touch();
            }
            accepted
        };
        if !accepted {
            debug!("Player {} sent a non-finite transform", player_id);
            return;
        }
        self.broadcast(
            Packet::PlayerMovement {
                player_id,
                position,
                rotation,
            },
            Some(player_id),
            Delivery::Sequenced,
        );
    }

    async fn handle_respawn(&self, addr: SocketAddr) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let respawned = {
            let mut player = handle.lock().await;
            if player.is_dead() {
                player.respawn();
                Some((player.position, player.stats_packet()))
            } else {
                None
            }
        };

        match respawned {
            Some((position, stats)) => {
                self.broadcast(
                    Packet::PlayerRespawn {
                        player_id,
                        position,
                    },
                    None,
                    Delivery::ReliableOrdered,
                );
                self.send(addr, stats, Delivery::ReliableOrdered);
            }
            None => warn!("Player {} asked to respawn while alive", player_id),
        }
    }

    async fn handle_item_use(&self, addr: SocketAddr, slot: i32) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let outcome = {
            let mut player = handle.lock().await;
            player
                .use_item(slot)
                .map(|item| (item, player.inventory_packet(), player.stats_packet()))
        };

        match outcome {
            Ok((item, inventory, stats)) => {
                info!("Player {} used {}", player_id, item.name);
                self.send(addr, inventory, Delivery::ReliableOrdered);
                self.send(addr, stats, Delivery::ReliableOrdered);
            }
            Err(e) => debug!("Player {} item use rejected: {}", player_id, e),
        }
    }

    async fn handle_item_move(&self, addr: SocketAddr, from_slot: i32, to_slot: i32) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let (Some(from), Some(to)) = (slot_index(from_slot), slot_index(to_slot)) else {
            debug!(
                "Player {} sent move with bad slots {} -> {}",
                player_id, from_slot, to_slot
            );
            return;
        };

        let update = {
            let mut player = handle.lock().await;
            player
                .inventory
                .move_item(from, to)
                .then(|| player.inventory_packet())
        };
        if let Some(update) = update {
            self.send(addr, update, Delivery::ReliableOrdered);
        }
    }

    async fn handle_item_drop(&self, addr: SocketAddr, slot: i32, quantity: u32) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let Some(index) = slot_index(slot) else {
            return;
        };

        let (dropped, update) = {
            let mut player = handle.lock().await;
            let dropped = player.inventory.drop_from_slot(index, quantity);
            (dropped, player.inventory_packet())
        };
        if dropped > 0 {
            debug!("Player {} dropped {} from slot {}", player_id, dropped, slot);
            self.send(addr, update, Delivery::ReliableOrdered);
        }
    }

    async fn handle_hotbar_select(&self, addr: SocketAddr, index: i32) {
        if let Some((player_id, handle)) = self.player_at(addr).await {
            let selected = handle.lock().await.inventory.select_hotbar(index);
            if !selected {
                debug!("Player {} selected invalid hotbar slot {}", player_id, index);
            }
        }
    }

    async fn handle_resource_hit(
        &self,
        addr: SocketAddr,
        resource_id: u32,
        damage: f32,
        tool_type: i32,
    ) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        if handle.lock().await.is_dead() {
            debug!("Dead player {} tried to gather", player_id);
            return;
        }

        let gathered = self.resources.lock().await.gather(
            resource_id,
            damage,
            ToolType::from_wire(tool_type),
            Instant::now(),
        );
        let Some(gathered) = gathered else {
            debug!(
                "Player {} hit unknown or dead resource {} ({} damage)",
                player_id, resource_id, damage
            );
            return;
        };

        let (credited, inventory) = {
            let mut player = handle.lock().await;
            let credited = self.credit_yield(&mut player, &gathered);
            (credited, player.inventory_packet())
        };

        let [wood, stone, metal, sulfur] = credited;
        self.send(
            addr,
            Packet::GatherResult {
                wood,
                stone,
                metal,
                sulfur,
            },
            Delivery::ReliableOrdered,
        );
        self.send(addr, inventory, Delivery::ReliableOrdered);

        if gathered.destroyed {
            info!("Resource {} destroyed by player {}", resource_id, player_id);
            self.broadcast(
                Packet::ResourceDestroyed { resource_id },
                None,
                Delivery::ReliableOrdered,
            );
        } else {
            self.broadcast(
                Packet::ResourceUpdate {
                    resource_id,
                    health: gathered.health,
                    max_health: gathered.max_health,
                },
                None,
                Delivery::Unreliable,
            );
        }
    }

    /// Adds a gather yield to the inventory and returns what actually fit,
    /// as (wood, stone, metal, sulfur); overflow is logged and lost
    fn credit_yield(&self, player: &mut Player, gathered: &GatherYield) -> [u32; 4] {
        let amounts = [
            (item_ids::WOOD, gathered.wood),
            (item_ids::STONE, gathered.stone),
            (item_ids::METAL_ORE, gathered.metal),
            (item_ids::SULFUR_ORE, gathered.sulfur),
        ];
        amounts.map(|(item_id, quantity)| {
            if quantity == 0 {
                return 0;
            }
            match player.inventory.add_item(&self.catalog, item_id, quantity) {
                Ok(()) => quantity,
                Err(InventoryError::Full { leftover, .. }) => {
                    warn!(
                        "Player {} gather overflow: {} of item {} lost",
                        player.id, leftover, item_id
                    );
                    quantity - leftover
                }
                Err(e) => {
                    warn!("Player {} gather failed: {}", player.id, e);
                    0
                }
            }
        })
    }

    async fn handle_craft_request(&self, addr: SocketAddr, recipe_id: u32) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let now = Instant::now();

        let (result, follow_up) = {
            let mut player = handle.lock().await;
            let result = player.start_craft(&self.catalog, recipe_id, now);
            let follow_up = result
                .is_ok()
                .then(|| (player.inventory_packet(), player.craft_queue_packet(now)));
            (result, follow_up)
        };

        let started = match result {
            Ok(duration) => {
                info!("Player {} started recipe {}", player_id, recipe_id);
                Packet::CraftStarted {
                    recipe_id,
                    duration: duration.as_secs_f32(),
                    success: true,
                    message: String::new(),
                }
            }
            Err(e) => {
                debug!("Player {} craft rejected: {}", player_id, e);
                Packet::CraftStarted {
                    recipe_id,
                    duration: 0.0,
                    success: false,
                    message: e.to_string(),
                }
            }
        };
        self.send(addr, started, Delivery::ReliableOrdered);

        if let Some((inventory, queue)) = follow_up {
            self.send(addr, inventory, Delivery::ReliableOrdered);
            self.send(addr, queue, Delivery::ReliableOrdered);
        }
    }

    async fn handle_craft_cancel(&self, addr: SocketAddr, queue_index: i32) {
        let Some((player_id, handle)) = self.player_at(addr).await else {
            return;
        };
        let now = Instant::now();

        let outcome = {
            let mut player = handle.lock().await;
            player
                .cancel_craft(&self.catalog, queue_index)
                .map(|recipe_id| {
                    (
                        recipe_id,
                        player.inventory_packet(),
                        player.craft_queue_packet(now),
                    )
                })
        };

        match outcome {
            Ok((recipe_id, inventory, queue)) => {
                info!("Player {} cancelled recipe {}", player_id, recipe_id);
                self.send(addr, inventory, Delivery::ReliableOrdered);
                self.send(addr, queue, Delivery::ReliableOrdered);
            }
            Err(e) => debug!("Player {} cancel rejected: {}", player_id, e),
        }
    }

    /// Ends the session at `addr` and removes its player from the world
    pub async fn disconnect(&self, addr: SocketAddr, reason: &str) {
        let closed = self.sessions.write().await.close(addr);
        let Some(session) = closed else {
            return;
        };
        if let Some(player_id) = session.player_id {
            self.remove_player(player_id, reason).await;
        }
    }

    async fn remove_player(&self, player_id: u32, reason: &str) {
        let removed = self.players.write().await.remove(&player_id);
        if let Some(handle) = removed {
            let queued = handle.lock().await.craft_queue.len();
            if queued > 0 {
                debug!("Abandoning {} queued crafts of player {}", queued, player_id);
            }
            info!("Player {} removed ({})", player_id, reason);
            self.broadcast(
                Packet::PlayerDisconnect { player_id },
                None,
                Delivery::ReliableOrdered,
            );
        }
    }

    /// Advances every player's vitals and announces new deaths
    pub async fn tick_stats(&self) {
        for (player_id, handle) in self.roster_snapshot().await {
            let death = {
                let mut player = handle.lock().await;
                player.tick_stats().map(|cause| (cause, player.name.clone()))
            };
            if let Some((cause, name)) = death {
                info!("Player {} ({}) died of {}", player_id, name, cause);
                self.broadcast(
                    Packet::PlayerDeath {
                        player_id,
                        killer_name: String::new(),
                    },
                    None,
                    Delivery::ReliableOrdered,
                );
            }
        }
    }

    /// Sends each player their own vitals
    pub async fn sync_stats(&self) {
        for (player_id, handle) in self.roster_snapshot().await {
            let stats = handle.lock().await.stats_packet();
            self.send_to_player(player_id, stats, Delivery::Unreliable);
        }
    }

    /// Respawns every resource node whose delay has elapsed
    pub async fn sweep_resources(&self) {
        let respawned = self.resources.lock().await.respawn_due(Instant::now());
        if !respawned.is_empty() {
            info!("Respawned {} resource nodes", respawned.len());
        }
        for node in respawned {
            self.broadcast(
                Packet::ResourceRespawn {
                    resource_id: node.id,
                    health: node.health,
                    max_health: node.max_health,
                },
                None,
                Delivery::ReliableOrdered,
            );
        }
    }

    /// Drops players that stopped heartbeating and sessions that never
    /// finished connecting
    pub async fn sweep_timeouts(&self) {
        let timeout = self.config.heartbeat_timeout;

        let mut timed_out = Vec::new();
        for (player_id, handle) in self.roster_snapshot().await {
            if handle.lock().await.is_timed_out(timeout) {
                timed_out.push(player_id);
            }
        }

        for player_id in timed_out {
            let addr = self.sessions.read().await.addr_of_player(player_id);
            match addr {
                Some(addr) => self.disconnect(addr, "timed out").await,
                None => self.remove_player(player_id, "timed out").await,
            }
        }

        let stale = self.sessions.read().await.stale_unbound(timeout);
        for addr in stale {
            debug!("Dropping idle session {}", addr);
            self.sessions.write().await.close(addr);
        }
    }

    /// Delivers finished crafts, front of each queue first
    pub async fn sweep_crafting(&self) {
        let now = Instant::now();
        for (player_id, handle) in self.roster_snapshot().await {
            let mut outgoing = Vec::new();
            {
                let mut player = handle.lock().await;
                let finished = player.craft_queue.take_completed(now);
                if finished.is_empty() {
                    continue;
                }

                for entry in finished {
                    let Some(recipe) = self.catalog.lookup_recipe(entry.recipe_id) else {
                        continue;
                    };
                    if let Err(e) = player.inventory.add_item(
                        &self.catalog,
                        recipe.result_item_id,
                        recipe.result_quantity,
                    ) {
                        warn!("Player {} craft result overflow: {}", player_id, e);
                    }
                    outgoing.push(Packet::CraftComplete {
                        recipe_id: recipe.id,
                        result_item_id: recipe.result_item_id,
                        result_quantity: recipe.result_quantity,
                    });
                }
                outgoing.push(player.inventory_packet());
                outgoing.push(player.craft_queue_packet(now));
            }

            debug!("Player {} finished {} crafts", player_id, outgoing.len() - 2);
            for packet in outgoing {
                self.send_to_player(player_id, packet, Delivery::ReliableOrdered);
            }
        }
    }
}

async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
