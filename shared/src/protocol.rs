//! Binary wire protocol shared by server and client
//!
//! Every message travels as a frame: a 1-byte type tag, a 4-byte
//! little-endian payload length and the payload itself. Payload layouts are
//! fixed per packet type. There is no version field: both peers must be
//! built from the same protocol definition.

use crate::codec::{CodecError, PacketReader, PacketWriter};
use crate::{Vec2, Vec3};

/// Size of the frame header (type tag + payload length)
pub const FRAME_HEADER_LEN: usize = 5;

/// Stable type tags for every message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    ConnectionRequest = 0,
    ConnectionAccept = 1,
    PlayerSpawn = 2,
    PlayerMovement = 3,
    PlayerDisconnect = 4,
    /// Reserved, no payload layout
    WorldState = 5,
    Heartbeat = 6,
    ClientReady = 7,
    StatsUpdate = 8,
    PlayerDeath = 9,
    PlayerRespawn = 10,
    /// Reserved, no payload layout
    TakeDamage = 11,
    /// Reserved, superseded by `ItemUse`
    ConsumeItem = 12,
    InventoryUpdate = 13,
    ItemUse = 14,
    ItemMove = 15,
    ItemDrop = 16,
    HotbarSelect = 17,
    ResourcesSync = 18,
    ResourceHit = 19,
    ResourceUpdate = 20,
    ResourceDestroyed = 21,
    ResourceRespawn = 22,
    GatherResult = 23,
    RecipesSync = 24,
    CraftRequest = 25,
    CraftStarted = 26,
    CraftComplete = 27,
    CraftCancel = 28,
    CraftQueueUpdate = 29,
}

impl TryFrom<u8> for PacketType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        use PacketType::*;
        let packet_type = match tag {
            0 => ConnectionRequest,
            1 => ConnectionAccept,
            2 => PlayerSpawn,
            3 => PlayerMovement,
            4 => PlayerDisconnect,
            5 => WorldState,
            6 => Heartbeat,
            7 => ClientReady,
            8 => StatsUpdate,
            9 => PlayerDeath,
            10 => PlayerRespawn,
            11 => TakeDamage,
            12 => ConsumeItem,
            13 => InventoryUpdate,
            14 => ItemUse,
            15 => ItemMove,
            16 => ItemDrop,
            17 => HotbarSelect,
            18 => ResourcesSync,
            19 => ResourceHit,
            20 => ResourceUpdate,
            21 => ResourceDestroyed,
            22 => ResourceRespawn,
            23 => GatherResult,
            24 => RecipesSync,
            25 => CraftRequest,
            26 => CraftStarted,
            27 => CraftComplete,
            28 => CraftCancel,
            29 => CraftQueueUpdate,
            other => return Err(CodecError::UnknownPacketType(other)),
        };
        Ok(packet_type)
    }
}

/// A frame split into its type tag and raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            tag: packet_type as u8,
            payload,
        }
    }

    /// Serializes as `[tag][len: u32 LE][payload]`
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        bytes.push(self.tag);
        bytes.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Splits a datagram into tag and payload
    ///
    /// Fails if the header is incomplete or the declared length runs past the
    /// available bytes. Trailing bytes beyond the declared length are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(CodecError::FrameTooShort { len: bytes.len() });
        }

        let declared = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        let available = bytes.len() - FRAME_HEADER_LEN;
        if declared > available {
            return Err(CodecError::TruncatedFrame {
                declared,
                available,
            });
        }

        Ok(Self {
            tag: bytes[0],
            payload: bytes[FRAME_HEADER_LEN..FRAME_HEADER_LEN + declared].to_vec(),
        })
    }

    pub fn packet_type(&self) -> Result<PacketType, CodecError> {
        PacketType::try_from(self.tag)
    }
}

/// One occupied inventory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySlotData {
    pub slot: i32,
    pub item_id: u32,
    pub quantity: u32,
}

/// Full state of one resource node, as sent in the world snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceData {
    pub id: u32,
    pub kind: u8,
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientData {
    pub item_id: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeData {
    pub id: u32,
    pub name: String,
    pub result_item_id: u32,
    pub result_quantity: u32,
    pub craft_time: f32,
    pub required_workbench: u32,
    pub ingredients: Vec<IngredientData>,
}

/// Progress of one queued craft
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CraftQueueItem {
    pub recipe_id: u32,
    pub progress: f32,
    pub remaining_secs: f32,
}

const INVENTORY_SLOT_LEN: usize = 12;
const RESOURCE_DATA_LEN: usize = 25;
const INGREDIENT_LEN: usize = 8;
const RECIPE_MIN_LEN: usize = 28;
const CRAFT_QUEUE_ITEM_LEN: usize = 12;

/// Every message the server and client exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // Connection lifecycle
    ConnectionRequest {
        player_name: String,
    },
    ConnectionAccept {
        player_id: u32,
        spawn: Vec3,
    },
    PlayerSpawn {
        player_id: u32,
        player_name: String,
        position: Vec3,
    },
    PlayerMovement {
        player_id: u32,
        position: Vec3,
        rotation: Vec2,
    },
    PlayerDisconnect {
        player_id: u32,
    },
    Heartbeat,
    ClientReady,

    // Survival stats
    StatsUpdate {
        player_id: u32,
        health: f32,
        hunger: f32,
        thirst: f32,
        temperature: f32,
    },
    PlayerDeath {
        player_id: u32,
        killer_name: String,
    },
    PlayerRespawn {
        player_id: u32,
        position: Vec3,
    },

    // Inventory
    InventoryUpdate {
        slots: Vec<InventorySlotData>,
    },
    ItemUse {
        slot: i32,
    },
    ItemMove {
        from_slot: i32,
        to_slot: i32,
    },
    ItemDrop {
        slot: i32,
        quantity: u32,
    },
    HotbarSelect {
        index: i32,
    },

    // Gathering
    ResourcesSync {
        resources: Vec<ResourceData>,
    },
    ResourceHit {
        resource_id: u32,
        damage: f32,
        tool_type: i32,
    },
    ResourceUpdate {
        resource_id: u32,
        health: f32,
        max_health: f32,
    },
    ResourceDestroyed {
        resource_id: u32,
    },
    ResourceRespawn {
        resource_id: u32,
        health: f32,
        max_health: f32,
    },
    GatherResult {
        wood: u32,
        stone: u32,
        metal: u32,
        sulfur: u32,
    },

    // Crafting
    RecipesSync {
        recipes: Vec<RecipeData>,
    },
    CraftRequest {
        recipe_id: u32,
    },
    CraftStarted {
        recipe_id: u32,
        duration: f32,
        success: bool,
        message: String,
    },
    CraftComplete {
        recipe_id: u32,
        result_item_id: u32,
        result_quantity: u32,
    },
    CraftCancel {
        queue_index: i32,
    },
    CraftQueueUpdate {
        entries: Vec<CraftQueueItem>,
    },
}

fn write_vec3(writer: &mut PacketWriter, v: Vec3) {
    writer.write_f32(v.x);
    writer.write_f32(v.y);
    writer.write_f32(v.z);
}

fn read_vec3(reader: &mut PacketReader<'_>) -> Result<Vec3, CodecError> {
    Ok(Vec3::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?))
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::ConnectionRequest { .. } => PacketType::ConnectionRequest,
            Packet::ConnectionAccept { .. } => PacketType::ConnectionAccept,
            Packet::PlayerSpawn { .. } => PacketType::PlayerSpawn,
            Packet::PlayerMovement { .. } => PacketType::PlayerMovement,
            Packet::PlayerDisconnect { .. } => PacketType::PlayerDisconnect,
            Packet::Heartbeat => PacketType::Heartbeat,
            Packet::ClientReady => PacketType::ClientReady,
            Packet::StatsUpdate { .. } => PacketType::StatsUpdate,
            Packet::PlayerDeath { .. } => PacketType::PlayerDeath,
            Packet::PlayerRespawn { .. } => PacketType::PlayerRespawn,
            Packet::InventoryUpdate { .. } => PacketType::InventoryUpdate,
            Packet::ItemUse { .. } => PacketType::ItemUse,
            Packet::ItemMove { .. } => PacketType::ItemMove,
            Packet::ItemDrop { .. } => PacketType::ItemDrop,
            Packet::HotbarSelect { .. } => PacketType::HotbarSelect,
            Packet::ResourcesSync { .. } => PacketType::ResourcesSync,
            Packet::ResourceHit { .. } => PacketType::ResourceHit,
            Packet::ResourceUpdate { .. } => PacketType::ResourceUpdate,
            Packet::ResourceDestroyed { .. } => PacketType::ResourceDestroyed,
            Packet::ResourceRespawn { .. } => PacketType::ResourceRespawn,
            Packet::GatherResult { .. } => PacketType::GatherResult,
            Packet::RecipesSync { .. } => PacketType::RecipesSync,
            Packet::CraftRequest { .. } => PacketType::CraftRequest,
            Packet::CraftStarted { .. } => PacketType::CraftStarted,
            Packet::CraftComplete { .. } => PacketType::CraftComplete,
            Packet::CraftCancel { .. } => PacketType::CraftCancel,
            Packet::CraftQueueUpdate { .. } => PacketType::CraftQueueUpdate,
        }
    }

    /// True for the traffic that is sent many times per second and should
    /// stay out of info-level logs
    pub fn is_high_frequency(&self) -> bool {
        matches!(
            self,
            Packet::PlayerMovement { .. }
                | Packet::Heartbeat
                | Packet::StatsUpdate { .. }
                | Packet::ResourceUpdate { .. }
        )
    }

    /// Serializes the payload only, without the frame header
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_capacity(32);

        match self {
            Packet::ConnectionRequest { player_name } => w.write_bytes(player_name.as_bytes()),
            Packet::ConnectionAccept { player_id, spawn } => {
                w.write_u32(*player_id);
                write_vec3(&mut w, *spawn);
            }
            Packet::PlayerSpawn {
                player_id,
                player_name,
                position,
            } => {
                w.write_u32(*player_id);
                w.write_str(player_name);
                write_vec3(&mut w, *position);
            }
            Packet::PlayerMovement {
                player_id,
                position,
                rotation,
            } => {
                w.write_u32(*player_id);
                write_vec3(&mut w, *position);
                w.write_f32(rotation.x);
                w.write_f32(rotation.y);
            }
            Packet::PlayerDisconnect { player_id } => w.write_u32(*player_id),
            Packet::Heartbeat | Packet::ClientReady => {}
            Packet::StatsUpdate {
                player_id,
                health,
                hunger,
                thirst,
                temperature,
            } => {
                w.write_u32(*player_id);
                w.write_f32(*health);
                w.write_f32(*hunger);
                w.write_f32(*thirst);
                w.write_f32(*temperature);
            }
            Packet::PlayerDeath {
                player_id,
                killer_name,
            } => {
                w.write_u32(*player_id);
                w.write_str(killer_name);
            }
            Packet::PlayerRespawn {
                player_id,
                position,
            } => {
                w.write_u32(*player_id);
                write_vec3(&mut w, *position);
            }
            Packet::InventoryUpdate { slots } => {
                w.write_count(slots.len());
                for slot in slots {
                    w.write_i32(slot.slot);
                    w.write_u32(slot.item_id);
                    w.write_u32(slot.quantity);
                }
            }
            Packet::ItemUse { slot } => w.write_i32(*slot),
            Packet::ItemMove { from_slot, to_slot } => {
                w.write_i32(*from_slot);
                w.write_i32(*to_slot);
            }
            Packet::ItemDrop { slot, quantity } => {
                w.write_i32(*slot);
                w.write_u32(*quantity);
            }
            Packet::HotbarSelect { index } => w.write_i32(*index),
            Packet::ResourcesSync { resources } => {
                w.write_count(resources.len());
                for res in resources {
                    w.write_u32(res.id);
                    w.write_u8(res.kind);
                    write_vec3(&mut w, res.position);
                    w.write_f32(res.health);
                    w.write_f32(res.max_health);
                }
            }
            Packet::ResourceHit {
                resource_id,
                damage,
                tool_type,
            } => {
                w.write_u32(*resource_id);
                w.write_f32(*damage);
                w.write_i32(*tool_type);
            }
            Packet::ResourceUpdate {
                resource_id,
                health,
                max_health,
            }
            | Packet::ResourceRespawn {
                resource_id,
                health,
                max_health,
            } => {
                w.write_u32(*resource_id);
                w.write_f32(*health);
                w.write_f32(*max_health);
            }
            Packet::ResourceDestroyed { resource_id } => w.write_u32(*resource_id),
            Packet::GatherResult {
                wood,
                stone,
                metal,
                sulfur,
            } => {
                w.write_u32(*wood);
                w.write_u32(*stone);
                w.write_u32(*metal);
                w.write_u32(*sulfur);
            }
            Packet::RecipesSync { recipes } => {
                w.write_count(recipes.len());
                for recipe in recipes {
                    w.write_u32(recipe.id);
                    w.write_str(&recipe.name);
                    w.write_u32(recipe.result_item_id);
                    w.write_u32(recipe.result_quantity);
                    w.write_f32(recipe.craft_time);
                    w.write_u32(recipe.required_workbench);
                    w.write_count(recipe.ingredients.len());
                    for ingredient in &recipe.ingredients {
                        w.write_u32(ingredient.item_id);
                        w.write_u32(ingredient.quantity);
                    }
                }
            }
            Packet::CraftRequest { recipe_id } => w.write_u32(*recipe_id),
            Packet::CraftStarted {
                recipe_id,
                duration,
                success,
                message,
            } => {
                w.write_u32(*recipe_id);
                w.write_f32(*duration);
                w.write_bool(*success);
                w.write_str(message);
            }
            Packet::CraftComplete {
                recipe_id,
                result_item_id,
                result_quantity,
            } => {
                w.write_u32(*recipe_id);
                w.write_u32(*result_item_id);
                w.write_u32(*result_quantity);
            }
            Packet::CraftCancel { queue_index } => w.write_i32(*queue_index),
            Packet::CraftQueueUpdate { entries } => {
                w.write_count(entries.len());
                for entry in entries {
                    w.write_u32(entry.recipe_id);
                    w.write_f32(entry.progress);
                    w.write_f32(entry.remaining_secs);
                }
            }
        }

        w.into_inner()
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(self.packet_type(), self.encode_payload())
    }

    /// Serializes to the full on-wire frame
    pub fn encode(&self) -> Vec<u8> {
        self.to_frame().encode()
    }

    /// Decodes a complete datagram
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_frame(&Frame::decode(bytes)?)
    }

    /// Parses the payload of an already split frame
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        let packet_type = frame.packet_type()?;
        let mut r = PacketReader::new(&frame.payload);

        let packet = match packet_type {
            PacketType::ConnectionRequest => Packet::ConnectionRequest {
                player_name: r.read_remaining_str()?,
            },
            PacketType::ConnectionAccept => Packet::ConnectionAccept {
                player_id: r.read_u32()?,
                spawn: read_vec3(&mut r)?,
            },
            PacketType::PlayerSpawn => Packet::PlayerSpawn {
                player_id: r.read_u32()?,
                player_name: r.read_str()?,
                position: read_vec3(&mut r)?,
            },
            PacketType::PlayerMovement => Packet::PlayerMovement {
                player_id: r.read_u32()?,
                position: read_vec3(&mut r)?,
                rotation: Vec2::new(r.read_f32()?, r.read_f32()?),
            },
            PacketType::PlayerDisconnect => Packet::PlayerDisconnect {
                player_id: r.read_u32()?,
            },
            PacketType::Heartbeat => Packet::Heartbeat,
            PacketType::ClientReady => Packet::ClientReady,
            PacketType::StatsUpdate => Packet::StatsUpdate {
                player_id: r.read_u32()?,
                health: r.read_f32()?,
                hunger: r.read_f32()?,
                thirst: r.read_f32()?,
                temperature: r.read_f32()?,
            },
            PacketType::PlayerDeath => Packet::PlayerDeath {
                player_id: r.read_u32()?,
                killer_name: r.read_str()?,
            },
            PacketType::PlayerRespawn => Packet::PlayerRespawn {
                player_id: r.read_u32()?,
                position: read_vec3(&mut r)?,
            },
            PacketType::InventoryUpdate => {
                let count = r.read_count(INVENTORY_SLOT_LEN)?;
                let mut slots = Vec::with_capacity(count);
                for _ in 0..count {
                    slots.push(InventorySlotData {
                        slot: r.read_i32()?,
                        item_id: r.read_u32()?,
                        quantity: r.read_u32()?,
                    });
                }
                Packet::InventoryUpdate { slots }
            }
            PacketType::ItemUse => Packet::ItemUse {
                slot: r.read_i32()?,
            },
            PacketType::ItemMove => Packet::ItemMove {
                from_slot: r.read_i32()?,
                to_slot: r.read_i32()?,
            },
            PacketType::ItemDrop => Packet::ItemDrop {
                slot: r.read_i32()?,
                quantity: r.read_u32()?,
            },
            PacketType::HotbarSelect => Packet::HotbarSelect {
                index: r.read_i32()?,
            },
            PacketType::ResourcesSync => {
                let count = r.read_count(RESOURCE_DATA_LEN)?;
                let mut resources = Vec::with_capacity(count);
                for _ in 0..count {
                    resources.push(ResourceData {
                        id: r.read_u32()?,
                        kind: r.read_u8()?,
                        position: read_vec3(&mut r)?,
                        health: r.read_f32()?,
                        max_health: r.read_f32()?,
                    });
                }
                Packet::ResourcesSync { resources }
            }
            PacketType::ResourceHit => Packet::ResourceHit {
                resource_id: r.read_u32()?,
                damage: r.read_f32()?,
                tool_type: r.read_i32()?,
            },
            PacketType::ResourceUpdate => Packet::ResourceUpdate {
                resource_id: r.read_u32()?,
                health: r.read_f32()?,
                max_health: r.read_f32()?,
            },
            PacketType::ResourceDestroyed => Packet::ResourceDestroyed {
                resource_id: r.read_u32()?,
            },
            PacketType::ResourceRespawn => Packet::ResourceRespawn {
                resource_id: r.read_u32()?,
                health: r.read_f32()?,
                max_health: r.read_f32()?,
            },
            PacketType::GatherResult => Packet::GatherResult {
                wood: r.read_u32()?,
                stone: r.read_u32()?,
                metal: r.read_u32()?,
                sulfur: r.read_u32()?,
            },
            PacketType::RecipesSync => {
                let count = r.read_count(RECIPE_MIN_LEN)?;
                let mut recipes = Vec::with_capacity(count);
                for _ in 0..count {
                    let id = r.read_u32()?;
                    let name = r.read_str()?;
                    let result_item_id = r.read_u32()?;
                    let result_quantity = r.read_u32()?;
                    let craft_time = r.read_f32()?;
                    let required_workbench = r.read_u32()?;
                    let ingredient_count = r.read_count(INGREDIENT_LEN)?;
                    let mut ingredients = Vec::with_capacity(ingredient_count);
                    for _ in 0..ingredient_count {
                        ingredients.push(IngredientData {
                            item_id: r.read_u32()?,
                            quantity: r.read_u32()?,
                        });
                    }
                    recipes.push(RecipeData {
                        id,
                        name,
                        result_item_id,
                        result_quantity,
                        craft_time,
                        required_workbench,
                        ingredients,
                    });
                }
                Packet::RecipesSync { recipes }
            }
            PacketType::CraftRequest => Packet::CraftRequest {
                recipe_id: r.read_u32()?,
            },
            PacketType::CraftStarted => Packet::CraftStarted {
                recipe_id: r.read_u32()?,
                duration: r.read_f32()?,
                success: r.read_bool()?,
                message: r.read_str()?,
            },
            PacketType::CraftComplete => Packet::CraftComplete {
                recipe_id: r.read_u32()?,
                result_item_id: r.read_u32()?,
                result_quantity: r.read_u32()?,
            },
            PacketType::CraftCancel => Packet::CraftCancel {
                queue_index: r.read_i32()?,
            },
            PacketType::CraftQueueUpdate => {
                let count = r.read_count(CRAFT_QUEUE_ITEM_LEN)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(CraftQueueItem {
                        recipe_id: r.read_u32()?,
                        progress: r.read_f32()?,
                        remaining_secs: r.read_f32()?,
                    });
                }
                Packet::CraftQueueUpdate { entries }
            }
            PacketType::WorldState | PacketType::TakeDamage | PacketType::ConsumeItem => {
                return Err(CodecError::UnsupportedPacket(frame.tag));
            }
        };

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_layout() {
        let bytes = Frame::new(PacketType::ItemUse, vec![3, 0, 0, 0]).encode();
        assert_eq!(bytes, vec![14, 4, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_frame_decode_rejects_short_input() {
        assert_eq!(
            Frame::decode(&[6, 0, 0, 0]),
            Err(CodecError::FrameTooShort { len: 4 })
        );
    }

    #[test]
    fn test_frame_decode_rejects_declared_length_past_end() {
        let bytes = [14, 8, 0, 0, 0, 1, 2, 3];
        assert_eq!(
            Frame::decode(&bytes),
            Err(CodecError::TruncatedFrame {
                declared: 8,
                available: 3
            })
        );
    }

    #[test]
    fn test_frame_decode_ignores_trailing_bytes() {
        let mut bytes = Packet::Heartbeat.encode();
        bytes.extend_from_slice(&[9, 9, 9]);
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.tag, PacketType::Heartbeat as u8);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_connection_request_payload_is_raw_name() {
        let packet = Packet::ConnectionRequest {
            player_name: "Ana".to_string(),
        };
        assert_eq!(packet.encode_payload(), b"Ana".to_vec());
        assert_eq!(Packet::decode(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn test_connection_accept_layout() {
        let packet = Packet::ConnectionAccept {
            player_id: 1,
            spawn: Vec3::new(0.0, 1.0, 0.0),
        };
        let payload = packet.encode_payload();
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[0..4], &1u32.to_le_bytes());
        assert_eq!(&payload[8..12], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_player_spawn_name_offsets() {
        let packet = Packet::PlayerSpawn {
            player_id: 7,
            player_name: "Bob".to_string(),
            position: Vec3::new(1.0, 2.0, 3.0),
        };
        let payload = packet.encode_payload();
        assert_eq!(payload.len(), 20 + 3);
        assert_eq!(&payload[4..8], &3u32.to_le_bytes());
        assert_eq!(&payload[8..11], b"Bob");
        assert_eq!(&payload[19..23], &3.0f32.to_le_bytes());
    }

    #[test]
    fn test_resources_sync_record_size() {
        let packet = Packet::ResourcesSync {
            resources: vec![ResourceData {
                id: 4,
                kind: 2,
                position: Vec3::new(1.0, 0.0, -1.0),
                health: 300.0,
                max_health: 300.0,
            }],
        };
        let payload = packet.encode_payload();
        assert_eq!(payload.len(), 4 + RESOURCE_DATA_LEN);
        assert_eq!(payload[8], 2);
        assert_eq!(Packet::decode(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn test_craft_started_layout() {
        let packet = Packet::CraftStarted {
            recipe_id: 3,
            duration: 5.0,
            success: false,
            message: "Missing Wood".to_string(),
        };
        let payload = packet.encode_payload();
        assert_eq!(payload[8], 0);
        assert_eq!(&payload[9..13], &12u32.to_le_bytes());
        assert_eq!(&payload[13..], b"Missing Wood");
    }

    #[test]
    fn test_recipes_sync_nested_lists_decode() {
        let packet = Packet::RecipesSync {
            recipes: vec![RecipeData {
                id: 1,
                name: "Stone Hatchet".to_string(),
                result_item_id: 200,
                result_quantity: 1,
                craft_time: 10.0,
                required_workbench: 0,
                ingredients: vec![
                    IngredientData {
                        item_id: 100,
                        quantity: 200,
                    },
                    IngredientData {
                        item_id: 101,
                        quantity: 100,
                    },
                ],
            }],
        };
        assert_eq!(Packet::decode(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn test_unknown_and_reserved_tags_fail() {
        let unknown = Frame {
            tag: 200,
            payload: Vec::new(),
        };
        assert_eq!(
            Packet::from_frame(&unknown),
            Err(CodecError::UnknownPacketType(200))
        );

        let reserved = Frame::new(PacketType::TakeDamage, vec![0; 8]);
        assert_eq!(
            Packet::from_frame(&reserved),
            Err(CodecError::UnsupportedPacket(11))
        );
    }

    #[test]
    fn test_short_payload_is_an_error_not_a_panic() {
        let frame = Frame::new(PacketType::ItemMove, vec![1, 0, 0, 0]);
        assert!(matches!(
            Packet::from_frame(&frame),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_every_tag_below_thirty_is_known() {
        for tag in 0u8..30 {
            assert!(PacketType::try_from(tag).is_ok(), "tag {} unknown", tag);
        }
        assert!(PacketType::try_from(30).is_err());
    }
}
