//! World resource nodes: health pools, gathering yield and timed respawn

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::ResourceData;
use shared::Vec3;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Damage above this is clamped per hit
pub const MAX_HIT_DAMAGE: f32 = 50.0;
/// Half the side of the square nodes are scattered in
pub const WORLD_HALF_EXTENT: f32 = 100.0;
/// Longest accepted respawn delay: 30 days
pub const MAX_RESPAWN_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const TOOL_BONUS: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceType {
    Tree = 0,
    Stone = 1,
    Metal = 2,
    Sulfur = 3,
}

impl ResourceType {
    pub fn max_health(self) -> f32 {
        match self {
            ResourceType::Tree => 100.0,
            ResourceType::Stone => 200.0,
            ResourceType::Metal | ResourceType::Sulfur => 300.0,
        }
    }

    /// Units gained per point of damage: (wood, stone, metal, sulfur)
    fn yield_rates(self) -> [f32; 4] {
        match self {
            ResourceType::Tree => [1.0, 0.0, 0.0, 0.0],
            ResourceType::Stone => [0.0, 1.0, 0.0, 0.0],
            ResourceType::Metal => [0.0, 0.25, 0.5, 0.0],
            ResourceType::Sulfur => [0.0, 0.25, 0.0, 0.5],
        }
    }

    fn is_rock(self) -> bool {
        !matches!(self, ResourceType::Tree)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolType {
    Hand,
    Hatchet,
    Pickaxe,
}

impl ToolType {
    /// Unknown tool ids are treated as bare hands
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => ToolType::Hatchet,
            2 => ToolType::Pickaxe,
            _ => ToolType::Hand,
        }
    }

    pub fn multiplier(self, kind: ResourceType) -> f32 {
        match (self, kind) {
            (ToolType::Hatchet, ResourceType::Tree) => TOOL_BONUS,
            (ToolType::Pickaxe, kind) if kind.is_rock() => TOOL_BONUS,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub id: u32,
    pub kind: ResourceType,
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
    /// Set while the node is dead
    pub respawn_at: Option<Instant>,
}

impl ResourceNode {
    pub fn new(id: u32, kind: ResourceType, position: Vec3) -> Self {
        Self {
            id,
            kind,
            position,
            health: kind.max_health(),
            max_health: kind.max_health(),
            respawn_at: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.respawn_at.is_none()
    }

    pub fn to_wire(&self) -> ResourceData {
        ResourceData {
            id: self.id,
            kind: self.kind as u8,
            position: self.position,
            health: self.health,
            max_health: self.max_health,
        }
    }
}

/// Outcome of one successful hit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GatherYield {
    pub wood: u32,
    pub stone: u32,
    pub metal: u32,
    pub sulfur: u32,
    pub destroyed: bool,
    /// Node health after the hit
    pub health: f32,
    pub max_health: f32,
}

impl GatherYield {
    pub fn is_empty(&self) -> bool {
        self.wood == 0 && self.stone == 0 && self.metal == 0 && self.sulfur == 0
    }
}

/// Owns every resource node in the world
#[derive(Debug)]
pub struct ResourceManager {
    nodes: BTreeMap<u32, ResourceNode>,
    respawn_delay: Duration,
}

impl ResourceManager {
    pub const TREE_COUNT: usize = 20;
    pub const STONE_COUNT: usize = 15;
    pub const METAL_COUNT: usize = 8;
    pub const SULFUR_COUNT: usize = 6;

    /// Generates the standard layout; the same seed always yields the same
    /// positions
    pub fn new(seed: u64, respawn_delay: Duration) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let layout = [
            (ResourceType::Tree, Self::TREE_COUNT),
            (ResourceType::Stone, Self::STONE_COUNT),
            (ResourceType::Metal, Self::METAL_COUNT),
            (ResourceType::Sulfur, Self::SULFUR_COUNT),
        ];

        let mut nodes = Vec::new();
        let mut next_id = 1;
        for (kind, count) in layout {
            for _ in 0..count {
                let position = Vec3::new(
                    rng.gen_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT),
                    0.0,
                    rng.gen_range(-WORLD_HALF_EXTENT..WORLD_HALF_EXTENT),
                );
                nodes.push(ResourceNode::new(next_id, kind, position));
                next_id += 1;
            }
        }

        info!("Spawned {} resource nodes (seed {})", nodes.len(), seed);
        Self::with_nodes(nodes, respawn_delay)
    }

    /// Builds a manager over explicit nodes; delays above
    /// `MAX_RESPAWN_DELAY` are clamped to it
    pub fn with_nodes(nodes: Vec<ResourceNode>, respawn_delay: Duration) -> Self {
        if respawn_delay > MAX_RESPAWN_DELAY {
            warn!(
                "Respawn delay {:?} clamped to {:?}",
                respawn_delay, MAX_RESPAWN_DELAY
            );
        }
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            respawn_delay: respawn_delay.min(MAX_RESPAWN_DELAY),
        }
    }

    /// Applies one hit to a node
    ///
    /// Returns `None` with no change if the node is unknown or dead, or the
    /// damage is not a positive finite number.
    pub fn gather(
        &mut self,
        resource_id: u32,
        damage: f32,
        tool: ToolType,
        now: Instant,
    ) -> Option<GatherYield> {
        if !damage.is_finite() || damage <= 0.0 {
            return None;
        }
        let node = self.nodes.get_mut(&resource_id)?;
        if !node.is_alive() {
            return None;
        }

        let damage = damage.min(MAX_HIT_DAMAGE);
        node.health = (node.health - damage).max(0.0);

        let scale = damage * tool.multiplier(node.kind);
        let [wood, stone, metal, sulfur] = node.kind.yield_rates().map(|r| (r * scale) as u32);

        let destroyed = node.health <= 0.0;
        if destroyed {
            // Only an unclamped delay can overflow the clock
            node.respawn_at = Some(now.checked_add(self.respawn_delay).unwrap_or(now));
            debug!("Resource {} destroyed", resource_id);
        }

        Some(GatherYield {
            wood,
            stone,
            metal,
            sulfur,
            destroyed,
            health: node.health,
            max_health: node.max_health,
        })
    }

    /// Brings back every dead node whose deadline has passed
    pub fn respawn_due(&mut self, now: Instant) -> Vec<ResourceNode> {
        let mut respawned = Vec::new();
        for node in self.nodes.values_mut() {
            if matches!(node.respawn_at, Some(at) if at <= now) {
                node.health = node.max_health;
                node.respawn_at = None;
                respawned.push(node.clone());
            }
        }
        respawned
    }

    pub fn get(&self, resource_id: u32) -> Option<&ResourceNode> {
        self.nodes.get(&resource_id)
    }

    /// Every node, alive or dead, in id order
    pub fn snapshot(&self) -> Vec<ResourceData> {
        self.nodes.values().map(ResourceNode::to_wire).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(kind: ResourceType) -> ResourceManager {
        ResourceManager::with_nodes(
            vec![ResourceNode::new(1, kind, Vec3::default())],
            Duration::from_secs(120),
        )
    }

    #[test]
    fn test_layout_counts_and_determinism() {
        let a = ResourceManager::new(7, Duration::from_secs(120));
        let b = ResourceManager::new(7, Duration::from_secs(120));
        assert_eq!(a.len(), 49);
        assert_eq!(a.snapshot(), b.snapshot());

        let trees = a
            .snapshot()
            .iter()
            .filter(|r| r.kind == ResourceType::Tree as u8)
            .count();
        assert_eq!(trees, 20);

        for resource in a.snapshot() {
            assert!(resource.position.x.abs() <= WORLD_HALF_EXTENT);
            assert!(resource.position.z.abs() <= WORLD_HALF_EXTENT);
        }
    }

    #[test]
    fn test_tree_yield_with_hand() {
        let mut manager = single(ResourceType::Tree);
        let result = manager
            .gather(1, 20.0, ToolType::Hand, Instant::now())
            .unwrap();
        assert_eq!(result.wood, 20);
        assert_eq!(result.health, 80.0);
        assert!(!result.destroyed);
    }

    #[test]
    fn test_tool_bonus_applies_to_matching_nodes() {
        let mut trees = single(ResourceType::Tree);
        let result = trees
            .gather(1, 10.0, ToolType::Hatchet, Instant::now())
            .unwrap();
        assert_eq!(result.wood, 15);

        let mut rock = single(ResourceType::Stone);
        let result = rock
            .gather(1, 10.0, ToolType::Hatchet, Instant::now())
            .unwrap();
        assert_eq!(result.stone, 10);

        let result = rock
            .gather(1, 10.0, ToolType::Pickaxe, Instant::now())
            .unwrap();
        assert_eq!(result.stone, 15);
        assert_eq!(ToolType::from_wire(42), ToolType::Hand);
    }

    #[test]
    fn test_ore_yields_secondary_stone() {
        let mut manager = single(ResourceType::Metal);
        let result = manager
            .gather(1, 20.0, ToolType::Hand, Instant::now())
            .unwrap();
        assert_eq!(result.metal, 10);
        assert_eq!(result.stone, 5);
        assert_eq!(result.sulfur, 0);
    }

    #[test]
    fn test_damage_is_clamped_and_validated() {
        let mut manager = single(ResourceType::Stone);
        let now = Instant::now();

        let result = manager.gather(1, 500.0, ToolType::Hand, now).unwrap();
        assert_eq!(result.stone, 50);
        assert_eq!(result.health, 150.0);

        assert!(manager.gather(1, f32::NAN, ToolType::Hand, now).is_none());
        assert!(manager.gather(1, -5.0, ToolType::Hand, now).is_none());
        assert!(manager.gather(99, 5.0, ToolType::Hand, now).is_none());
        assert_eq!(manager.get(1).unwrap().health, 150.0);
    }

    #[test]
    fn test_destroy_and_respawn_cycle() {
        let mut manager = single(ResourceType::Tree);
        let now = Instant::now();

        manager.gather(1, 50.0, ToolType::Hand, now).unwrap();
        let last = manager.gather(1, 50.0, ToolType::Hand, now).unwrap();
        assert!(last.destroyed);
        assert!(!manager.get(1).unwrap().is_alive());

        // Dead nodes ignore further hits
        assert!(manager.gather(1, 10.0, ToolType::Hand, now).is_none());

        assert!(manager.respawn_due(now + Duration::from_secs(119)).is_empty());
        let respawned = manager.respawn_due(now + Duration::from_secs(120));
        assert_eq!(respawned.len(), 1);
        assert_eq!(respawned[0].health, 100.0);
        assert!(manager.get(1).unwrap().is_alive());

        assert!(manager.respawn_due(now + Duration::from_secs(500)).is_empty());
    }

    #[test]
    fn test_oversized_respawn_delay_is_clamped() {
        let mut manager = ResourceManager::with_nodes(
            vec![ResourceNode::new(1, ResourceType::Tree, Vec3::default())],
            Duration::MAX,
        );
        let now = Instant::now();

        manager.gather(1, 50.0, ToolType::Hand, now).unwrap();
        assert!(manager.gather(1, 50.0, ToolType::Hand, now).unwrap().destroyed);

        assert!(manager.respawn_due(now + Duration::from_secs(3600)).is_empty());
        assert_eq!(manager.respawn_due(now + MAX_RESPAWN_DELAY).len(), 1);
    }
}
