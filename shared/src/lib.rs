//! Types shared by the survival server and its clients: the binary wire
//! protocol, the item/recipe catalog and the small vector types both sides
//! agree on.

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod codec;
pub mod protocol;

pub use catalog::{Catalog, CatalogError, ItemDefinition, Recipe};
pub use codec::{CodecError, PacketReader, PacketWriter};
pub use protocol::{Frame, Packet, PacketType};

pub const DEFAULT_PORT: u16 = 7777;
pub const INVENTORY_SIZE: usize = 24;
pub const HOTBAR_SIZE: usize = 6;
pub const MAX_NAME_LEN: usize = 32;
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 1.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Look rotation: `x` is yaw, `y` is pitch
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}
