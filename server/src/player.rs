//! Per-player aggregate: identity, transform, vitals, inventory and craft queue

use crate::crafting::{CraftError, CraftQueue};
use crate::inventory::{slot_index, Inventory};
use crate::stats::{DeathCause, Stats};
use log::info;
use shared::catalog::{Catalog, ItemDefinition};
use shared::protocol::Packet;
use shared::{Vec2, Vec3, MAX_NAME_LEN, SPAWN_POSITION};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Reasons an item use is refused. None of them change the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UseItemError {
    #[error("slot {0} is out of range")]
    InvalidSlot(i32),

    #[error("slot {0} is empty")]
    EmptySlot(i32),

    #[error("{0} cannot be consumed")]
    NotConsumable(String),

    #[error("{0} would have no effect")]
    NoBenefit(String),

    #[error("dead players cannot use items")]
    PlayerDead,
}

/// Trims a requested display name, falling back to `Player<id>`
pub fn sanitize_name(raw: &str, id: u32) -> String {
    let name: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        format!("Player{}", id)
    } else {
        name
    }
}

#[derive(Debug)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    /// `x` yaw, `y` pitch
    pub rotation: Vec2,
    pub last_heartbeat: Instant,
    pub stats: Stats,
    pub inventory: Inventory,
    pub craft_queue: CraftQueue,
    /// Set once the current life's death has been broadcast
    death_announced: bool,
}

impl Player {
    pub fn new(id: u32, requested_name: &str, catalog: &Catalog) -> Self {
        Self {
            id,
            name: sanitize_name(requested_name, id),
            position: SPAWN_POSITION,
            rotation: Vec2::default(),
            last_heartbeat: Instant::now(),
            stats: Stats::new(),
            inventory: Inventory::with_starter_kit(catalog),
            craft_queue: CraftQueue::new(),
            death_announced: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() > timeout
    }

    /// Stores a client-reported transform; non-finite values are rejected
    pub fn update_transform(&mut self, position: Vec3, rotation: Vec2) -> bool {
        if !position.is_finite() || !rotation.is_finite() {
            return false;
        }
        self.position = position;
        self.rotation = rotation;
        true
    }

    pub fn is_dead(&self) -> bool {
        self.stats.is_dead()
    }

    /// Consumes one unit from `slot` and applies its effect
    ///
    /// Refused without change when the item would not raise any stat that
    /// is below its cap.
    pub fn use_item(&mut self, slot: i32) -> Result<Arc<ItemDefinition>, UseItemError> {
        if self.is_dead() {
            return Err(UseItemError::PlayerDead);
        }
        let index = slot_index(slot).ok_or(UseItemError::InvalidSlot(slot))?;
        let stack = self
            .inventory
            .slot(index)
            .ok_or(UseItemError::EmptySlot(slot))?;

        let definition = &stack.definition;
        let Some(effect) = definition.consumable else {
            return Err(UseItemError::NotConsumable(definition.name.clone()));
        };
        if !self.stats.would_benefit(&effect) {
            return Err(UseItemError::NoBenefit(definition.name.clone()));
        }

        let consumed = self
            .inventory
            .consume_item(index)
            .ok_or_else(|| UseItemError::EmptySlot(slot))?;
        self.stats.apply(&effect);
        Ok(consumed)
    }

    pub fn start_craft(
        &mut self,
        catalog: &Catalog,
        recipe_id: u32,
        now: Instant,
    ) -> Result<Duration, CraftError> {
        if self.is_dead() {
            return Err(CraftError::PlayerDead);
        }
        self.craft_queue
            .start(catalog, recipe_id, &mut self.inventory, now)
    }

    pub fn cancel_craft(&mut self, catalog: &Catalog, index: i32) -> Result<u32, CraftError> {
        let entry = self.craft_queue.cancel(catalog, index, &mut self.inventory)?;
        Ok(entry.recipe_id)
    }

    pub fn craft_queue_packet(&self, now: Instant) -> Packet {
        Packet::CraftQueueUpdate {
            entries: self.craft_queue.snapshot(now),
        }
    }

    /// Advances the stats tick, returning the cause the first time the
    /// player is found dead in this life
    pub fn tick_stats(&mut self) -> Option<DeathCause> {
        self.stats.update();
        if self.death_announced {
            return None;
        }
        let cause = self.stats.death_cause()?;
        self.death_announced = true;
        Some(cause)
    }

    pub fn respawn(&mut self) {
        self.stats.respawn();
        self.position = SPAWN_POSITION;
        self.death_announced = false;
        info!("Player {} ({}) respawned", self.id, self.name);
    }

    pub fn stats_packet(&self) -> Packet {
        Packet::StatsUpdate {
            player_id: self.id,
            health: self.stats.health,
            hunger: self.stats.hunger,
            thirst: self.stats.thirst,
            temperature: self.stats.temperature,
        }
    }

    pub fn inventory_packet(&self) -> Packet {
        Packet::InventoryUpdate {
            slots: self.inventory.snapshot(),
        }
    }

    pub fn spawn_packet(&self) -> Packet {
        Packet::PlayerSpawn {
            player_id: self.id,
            player_name: self.name.clone(),
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::catalog::item_ids::*;

    fn player() -> Player {
        Player::new(1, "Ana", &Catalog::builtin())
    }

    #[test]
    fn test_new_player() {
        let player = player();
        assert_eq!(player.name, "Ana");
        assert_eq!(player.position, SPAWN_POSITION);
        assert_eq!(player.inventory.count_item(APPLE), 5);
        assert!(!player.is_dead());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Bob  ", 3), "Bob");
        assert_eq!(sanitize_name("   ", 7), "Player7");
        assert_eq!(sanitize_name(&"x".repeat(40), 1).chars().count(), 32);
    }

    #[test]
    fn test_eating_at_full_hunger_is_rejected() {
        let mut player = player();
        assert_eq!(
            player.use_item(0),
            Err(UseItemError::NoBenefit("Apple".to_string()))
        );
        assert_eq!(player.inventory.count_item(APPLE), 5);
    }

    #[test]
    fn test_bandage_at_full_health_is_rejected() {
        let mut player = player();
        assert!(matches!(player.use_item(2), Err(UseItemError::NoBenefit(_))));
        assert_eq!(player.inventory.count_item(BANDAGE), 10);
    }

    #[test]
    fn test_use_item_applies_effect() {
        let mut player = player();
        player.stats.hunger = 50.0;

        let used = player.use_item(0).unwrap();
        assert_eq!(used.id, APPLE);
        assert_eq!(player.stats.hunger, 70.0);
        assert_eq!(player.inventory.count_item(APPLE), 4);
    }

    #[test]
    fn test_use_item_rejections() {
        let mut player = player();
        assert_eq!(player.use_item(30), Err(UseItemError::InvalidSlot(30)));
        assert_eq!(player.use_item(10), Err(UseItemError::EmptySlot(10)));

        let catalog = Catalog::builtin();
        player.inventory.add_item(&catalog, WOOD, 5).unwrap();
        assert_eq!(
            player.use_item(3),
            Err(UseItemError::NotConsumable("Wood".to_string()))
        );

        player.stats.health = 0.0;
        assert_eq!(player.use_item(2), Err(UseItemError::PlayerDead));
    }

    #[test]
    fn test_death_reported_once_per_life() {
        let mut player = player();
        player.stats.thirst = 0.1;

        assert_eq!(player.tick_stats(), Some(DeathCause::Dehydration));
        assert_eq!(player.tick_stats(), None);

        player.respawn();
        assert!(!player.is_dead());
        assert_eq!(player.inventory.count_item(APPLE), 5);

        player.stats.health = 0.0;
        assert_eq!(player.tick_stats(), Some(DeathCause::Wounds));
    }

    #[test]
    fn test_dead_player_cannot_craft() {
        let catalog = Catalog::builtin();
        let mut player = player();
        player.inventory.add_item(&catalog, WOOD, 100).unwrap();
        player.stats.hunger = 0.0;

        assert_eq!(
            player.start_craft(&catalog, 3, Instant::now()),
            Err(CraftError::PlayerDead)
        );
        assert_eq!(player.inventory.count_item(WOOD), 100);
    }

    #[test]
    fn test_craft_and_cancel_round_trip() {
        let catalog = Catalog::builtin();
        let mut player = player();
        player.inventory.add_item(&catalog, WOOD, 100).unwrap();

        player.start_craft(&catalog, 3, Instant::now()).unwrap();
        assert_eq!(player.inventory.count_item(WOOD), 0);

        assert_eq!(player.cancel_craft(&catalog, 0), Ok(3));
        assert_eq!(player.inventory.count_item(WOOD), 100);
    }

    #[test]
    fn test_non_finite_transform_rejected() {
        let mut player = player();
        assert!(!player.update_transform(Vec3::new(f32::NAN, 0.0, 0.0), Vec2::default()));
        assert_eq!(player.position, SPAWN_POSITION);
        assert!(player.update_transform(Vec3::new(4.0, 1.0, 2.0), Vec2::new(90.0, 0.0)));
        assert_eq!(player.position.x, 4.0);
    }
}
