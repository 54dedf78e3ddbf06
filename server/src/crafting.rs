//! Per-player crafting queue
//!
//! Ingredients are taken when a craft is queued, not when it finishes.
//! Entries finish strictly in queue order: an entry whose timer has run out
//! still waits for every entry in front of it.

use crate::inventory::{Inventory, InventoryError};
use log::warn;
use shared::catalog::Catalog;
use shared::protocol::CraftQueueItem;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const MAX_QUEUE_LEN: usize = 8;

/// Reasons a craft request or cancel is refused
///
/// The display text is what the requesting client is shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CraftError {
    #[error("Unknown recipe")]
    UnknownRecipe(u32),

    #[error("Not enough {name} ({held}/{needed})")]
    MissingIngredient {
        item_id: u32,
        name: String,
        needed: u32,
        held: u32,
    },

    #[error("Crafting queue is full")]
    QueueFull,

    #[error("Dead players cannot craft")]
    PlayerDead,

    #[error("No queued craft at index {0}")]
    InvalidQueueIndex(i32),
}

fn missing(catalog: &Catalog, item_id: u32, needed: u32, held: u32) -> CraftError {
    let name = catalog
        .lookup_item(item_id)
        .map(|item| item.name.clone())
        .unwrap_or_else(|| format!("item {}", item_id));
    CraftError::MissingIngredient {
        item_id,
        name,
        needed,
        held,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CraftEntry {
    pub recipe_id: u32,
    pub started_at: Instant,
    pub duration: Duration,
}

impl CraftEntry {
    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }

    /// Fraction complete, clamped to [0, 1]
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CraftQueue {
    entries: VecDeque<CraftEntry>,
}

impl CraftQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and queues a craft, consuming its ingredients
    ///
    /// Either every ingredient is taken and the entry is queued, or the
    /// inventory is left untouched and the reason is returned.
    pub fn start(
        &mut self,
        catalog: &Catalog,
        recipe_id: u32,
        inventory: &mut Inventory,
        now: Instant,
    ) -> Result<Duration, CraftError> {
        let recipe = catalog
            .lookup_recipe(recipe_id)
            .ok_or(CraftError::UnknownRecipe(recipe_id))?;

        if self.entries.len() >= MAX_QUEUE_LEN {
            return Err(CraftError::QueueFull);
        }

        let requirements = recipe.requirements();
        for (&item_id, &needed) in &requirements {
            let held = inventory.count_item(item_id);
            if held < needed {
                return Err(missing(catalog, item_id, needed, held));
            }
        }

        let mut taken = Vec::with_capacity(requirements.len());
        for (&item_id, &needed) in &requirements {
            if !inventory.remove_item(item_id, needed) {
                let held = inventory.count_item(item_id);
                for (refund_id, quantity) in taken {
                    if let Err(e) = inventory.add_item(catalog, refund_id, quantity) {
                        warn!("Craft rollback lost items: {}", e);
                    }
                }
                return Err(missing(catalog, item_id, needed, held));
            }
            taken.push((item_id, needed));
        }

        let duration = recipe.craft_duration();
        self.entries.push_back(CraftEntry {
            recipe_id,
            started_at: now,
            duration,
        });
        Ok(duration)
    }

    /// Removes the entry at `index` and refunds its ingredients
    ///
    /// A refund that does not fit in the inventory is logged and lost.
    pub fn cancel(
        &mut self,
        catalog: &Catalog,
        index: i32,
        inventory: &mut Inventory,
    ) -> Result<CraftEntry, CraftError> {
        let entry = usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.remove(i))
            .ok_or(CraftError::InvalidQueueIndex(index))?;

        if let Some(recipe) = catalog.lookup_recipe(entry.recipe_id) {
            for ingredient in &recipe.ingredients {
                match inventory.add_item(catalog, ingredient.item_id, ingredient.quantity) {
                    Ok(()) => {}
                    Err(InventoryError::Full { item_id, leftover }) => {
                        warn!(
                            "Craft refund overflow: {} of item {} lost",
                            leftover, item_id
                        );
                    }
                    Err(e) => warn!("Craft refund failed: {}", e),
                }
            }
        }

        Ok(entry)
    }

    /// Pops finished entries from the front of the queue
    pub fn take_completed(&mut self, now: Instant) -> Vec<CraftEntry> {
        let mut done = Vec::new();
        while let Some(front) = self.entries.front() {
            if !front.is_finished(now) {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                done.push(entry);
            }
        }
        done
    }

    pub fn snapshot(&self, now: Instant) -> Vec<CraftQueueItem> {
        self.entries
            .iter()
            .map(|entry| CraftQueueItem {
                recipe_id: entry.recipe_id,
                progress: entry.progress(now),
                remaining_secs: entry.remaining(now).as_secs_f32(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
