//! Server tuning knobs
//!
//! Every period, delay and limit the server uses lives here so tests can
//! shrink timings without touching gameplay code.

use std::time::Duration;

/// Periods, delays and limits for one server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of concurrent sessions
    pub max_clients: usize,
    /// Seed for the resource node layout
    pub world_seed: u64,

    /// How often vital stats decay/regenerate
    pub stats_tick: Duration,
    /// How often each player is sent their own stats
    pub stats_sync: Duration,
    /// How often destroyed resource nodes are checked for respawn
    pub resource_sweep: Duration,
    /// How often sessions are checked for missed heartbeats
    pub timeout_sweep: Duration,
    /// Silence after which a session is dropped
    pub heartbeat_timeout: Duration,
    /// How often crafting queues are checked for finished entries
    pub craft_sweep: Duration,
    /// Time a destroyed node stays dead
    pub resource_respawn_delay: Duration,

    /// Pause before the inventory snapshot once a client is ready
    pub sync_initial_delay: Duration,
    /// Pause between roster entries sent to a newly ready client
    pub sync_roster_delay: Duration,
    /// Pause between the later handshake stages
    pub sync_stage_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            world_seed: 12345,
            stats_tick: Duration::from_secs(1),
            stats_sync: Duration::from_secs(2),
            resource_sweep: Duration::from_secs(10),
            timeout_sweep: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(10),
            craft_sweep: Duration::from_millis(500),
            resource_respawn_delay: Duration::from_secs(120),
            sync_initial_delay: Duration::from_millis(150),
            sync_roster_delay: Duration::from_millis(50),
            sync_stage_delay: Duration::from_millis(300),
        }
    }
}

impl ServerConfig {
    /// Removes all handshake pacing delays
    pub fn without_sync_delays(mut self) -> Self {
        self.sync_initial_delay = Duration::ZERO;
        self.sync_roster_delay = Duration::ZERO;
        self.sync_stage_delay = Duration::ZERO;
        self
    }
}
