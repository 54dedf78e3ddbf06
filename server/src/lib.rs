//! # Survival Server Library
//!
//! Authoritative server for a multiplayer survival sandbox. The server owns
//! all game state: player vitals, inventories, crafting queues and the
//! resource nodes scattered around the world. Clients only send requests
//! and display what the server tells them.
//!
//! ## Module Organization
//!
//! ### Simulation state
//! - `stats`: health, hunger, thirst and temperature with per-tick decay
//! - `inventory`: 24-slot inventory with stacking, moving and consumption
//! - `crafting`: per-player queue of timed crafts
//! - `resources`: gatherable nodes with health pools and timed respawn
//! - `player`: the per-player aggregate tying the above together
//!
//! ### Connection handling
//! - `session`: peer address to player mapping and handshake state
//! - `game`: packet handlers and periodic sweeps over the shared world
//! - `network`: UDP socket, per-session workers and the outbound sender
//!
//! ## Concurrency
//!
//! Each peer gets its own worker task, so frames from one peer are handled
//! in arrival order while different peers proceed in parallel. The stats
//! tick, stats sync, resource sweep, timeout sweep and craft sweep each run
//! as independent tasks. The roster, resource table and session table are
//! separately locked, and no code path holds two of those locks at once.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use shared::Catalog;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:7777",
//!         ServerConfig::default(),
//!         Catalog::builtin(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crafting;
pub mod game;
pub mod inventory;
pub mod network;
pub mod player;
pub mod resources;
pub mod session;
pub mod stats;
