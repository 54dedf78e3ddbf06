//! Vital stats and their per-tick decay

use shared::catalog::ConsumableEffect;
use std::fmt;

pub const MAX_VITAL: f32 = 100.0;
pub const MIN_TEMPERATURE: f32 = -50.0;
pub const MAX_TEMPERATURE: f32 = 60.0;
pub const SAFE_TEMPERATURE_MIN: f32 = 0.0;
pub const SAFE_TEMPERATURE_MAX: f32 = 40.0;
pub const AMBIENT_TEMPERATURE: f32 = 20.0;

const HUNGER_DECAY: f32 = 0.1;
const THIRST_DECAY: f32 = 0.15;
const TEMPERATURE_DRIFT: f32 = 0.1;
const HEALTH_REGEN: f32 = 0.5;
const STARVATION_DAMAGE: f32 = 1.0;
const REGEN_THRESHOLD: f32 = 50.0;
const STARVING_THRESHOLD: f32 = 10.0;

/// What killed a player, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Wounds,
    Starvation,
    Dehydration,
    Exposure,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeathCause::Wounds => "wounds",
            DeathCause::Starvation => "starvation",
            DeathCause::Dehydration => "dehydration",
            DeathCause::Exposure => "exposure",
        };
        f.write_str(text)
    }
}

/// Health, hunger, thirst and body temperature of one player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub health: f32,
    pub hunger: f32,
    pub thirst: f32,
    pub temperature: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            health: MAX_VITAL,
            hunger: MAX_VITAL,
            thirst: MAX_VITAL,
            temperature: AMBIENT_TEMPERATURE,
        }
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances one stats tick. Dead players are frozen.
    pub fn update(&mut self) {
        if self.is_dead() {
            return;
        }

        self.hunger = (self.hunger - HUNGER_DECAY).max(0.0);
        self.thirst = (self.thirst - THIRST_DECAY).max(0.0);

        let offset = AMBIENT_TEMPERATURE - self.temperature;
        if offset.abs() <= TEMPERATURE_DRIFT {
            self.temperature = AMBIENT_TEMPERATURE;
        } else {
            self.temperature += TEMPERATURE_DRIFT * offset.signum();
        }

        if self.hunger < STARVING_THRESHOLD || self.thirst < STARVING_THRESHOLD {
            self.health = (self.health - STARVATION_DAMAGE).max(0.0);
        } else if self.hunger >= REGEN_THRESHOLD && self.thirst >= REGEN_THRESHOLD {
            self.health = (self.health + HEALTH_REGEN).min(MAX_VITAL);
        }
    }

    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount).clamp(0.0, MAX_VITAL);
    }

    pub fn eat(&mut self, amount: f32) {
        self.hunger = (self.hunger + amount).clamp(0.0, MAX_VITAL);
    }

    pub fn drink(&mut self, amount: f32) {
        self.thirst = (self.thirst + amount).clamp(0.0, MAX_VITAL);
    }

    pub fn set_temperature(&mut self, value: f32) {
        self.temperature = value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
    }

    /// True if at least one restore amount would raise a stat below its cap
    pub fn would_benefit(&self, effect: &ConsumableEffect) -> bool {
        (effect.health > 0.0 && self.health < MAX_VITAL)
            || (effect.hunger > 0.0 && self.hunger < MAX_VITAL)
            || (effect.thirst > 0.0 && self.thirst < MAX_VITAL)
    }

    pub fn apply(&mut self, effect: &ConsumableEffect) {
        if effect.health > 0.0 {
            self.heal(effect.health);
        }
        if effect.hunger > 0.0 {
            self.eat(effect.hunger);
        }
        if effect.thirst > 0.0 {
            self.drink(effect.thirst);
        }
    }

    pub fn death_cause(&self) -> Option<DeathCause> {
        if self.health <= 0.0 {
            Some(DeathCause::Wounds)
        } else if self.hunger <= 0.0 {
            Some(DeathCause::Starvation)
        } else if self.thirst <= 0.0 {
            Some(DeathCause::Dehydration)
        } else if !(SAFE_TEMPERATURE_MIN..=SAFE_TEMPERATURE_MAX).contains(&self.temperature) {
            Some(DeathCause::Exposure)
        } else {
            None
        }
    }

    pub fn is_dead(&self) -> bool {
        self.death_cause().is_some()
    }

    pub fn respawn(&mut self) {
        *self = Self::default();
    }
}
