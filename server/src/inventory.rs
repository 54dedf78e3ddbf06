//! Fixed-size slot inventory with stacking rules
//!
//! Slots are explicit `Option<ItemStack>` values: an empty slot is `None`,
//! and a stack never exists with a quantity of zero. Every public operation
//! completes its change to the slot array before returning, so a caller
//! holding the owning player's lock never observes a half-applied move or
//! merge.

use log::{debug, warn};
use shared::catalog::{item_ids, Catalog, ItemDefinition};
use shared::protocol::InventorySlotData;
use shared::{HOTBAR_SIZE, INVENTORY_SIZE};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("item {0} is not in the catalog")]
    UnknownItem(u32),

    /// The part that did fit stays in the inventory
    #[error("inventory full: {leftover} of item {item_id} did not fit")]
    Full { item_id: u32, leftover: u32 },
}

/// A quantity of one item occupying one slot
#[derive(Debug, Clone)]
pub struct ItemStack {
    pub item_id: u32,
    pub quantity: u32,
    pub definition: Arc<ItemDefinition>,
}

impl ItemStack {
    fn new(definition: Arc<ItemDefinition>, quantity: u32) -> Self {
        Self {
            item_id: definition.id,
            quantity: quantity.min(definition.max_stack),
            definition,
        }
    }

    pub fn space(&self) -> u32 {
        self.definition.max_stack.saturating_sub(self.quantity)
    }

    /// Tops up the stack, returning what did not fit
    fn add(&mut self, amount: u32) -> u32 {
        let accepted = amount.min(self.space());
        self.quantity += accepted;
        amount - accepted
    }

    /// Takes up to `amount` from the stack, returning what was taken
    fn take(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.quantity);
        self.quantity -= taken;
        taken
    }
}

/// Converts a wire slot index into an array index
pub fn slot_index(slot: i32) -> Option<usize> {
    usize::try_from(slot).ok().filter(|&s| s < INVENTORY_SIZE)
}

#[derive(Debug, Clone)]
pub struct Inventory {
    slots: [Option<ItemStack>; INVENTORY_SIZE],
    selected_hotbar: usize,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            selected_hotbar: 0,
        }
    }

    /// An inventory holding the kit every new player receives
    pub fn with_starter_kit(catalog: &Catalog) -> Self {
        let mut inventory = Self::new();
        let kit = [
            (item_ids::APPLE, 5),
            (item_ids::WATER_BOTTLE, 3),
            (item_ids::BANDAGE, 10),
        ];
        for (item_id, quantity) in kit {
            if let Err(e) = inventory.add_item(catalog, item_id, quantity) {
                warn!("Starter kit incomplete: {}", e);
            }
        }
        inventory
    }

    /// Adds `quantity` units, topping up existing stacks before using
    /// empty slots
    ///
    /// Unknown ids change nothing. When the inventory fills up part way,
    /// the units already placed stay placed and `Full` reports the rest.
    pub fn add_item(
        &mut self,
        catalog: &Catalog,
        item_id: u32,
        quantity: u32,
    ) -> Result<(), InventoryError> {
        let definition = catalog
            .lookup_item(item_id)
            .ok_or(InventoryError::UnknownItem(item_id))?;

        let mut remaining = quantity;

        for stack in self.slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if stack.item_id == item_id {
                remaining = stack.add(remaining);
            }
        }

        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let stack = ItemStack::new(Arc::clone(definition), remaining);
                remaining -= stack.quantity;
                *slot = Some(stack);
            }
        }

        if remaining > 0 {
            return Err(InventoryError::Full {
                item_id,
                leftover: remaining,
            });
        }

        debug!("Added {}x {}", quantity, definition.name);
        Ok(())
    }

    /// Removes `quantity` units across stacks in slot order
    ///
    /// Returns false and changes nothing if fewer units are held.
    pub fn remove_item(&mut self, item_id: u32, quantity: u32) -> bool {
        if !self.has_item(item_id, quantity) {
            return false;
        }

        let mut remaining = quantity;
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if let Some(stack) = slot {
                if stack.item_id == item_id {
                    remaining -= stack.take(remaining);
                    if stack.quantity == 0 {
                        *slot = None;
                    }
                }
            }
        }
        true
    }

    /// Uses one unit of the consumable in `slot`
    ///
    /// Returns the consumed item's definition, or `None` if the slot is
    /// empty, out of range, or holds something that cannot be consumed.
    pub fn consume_item(&mut self, slot: usize) -> Option<Arc<ItemDefinition>> {
        let entry = self.slots.get_mut(slot)?;
        let stack = entry.as_mut()?;
        if !stack.definition.is_consumable() {
            return None;
        }

        let definition = Arc::clone(&stack.definition);
        stack.take(1);
        if stack.quantity == 0 {
            *entry = None;
        }
        Some(definition)
    }

    /// Moves, merges or swaps the stack at `from` onto `to`
    ///
    /// Returns false with no change if either index is out of range, they
    /// are equal, or `from` is empty.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= INVENTORY_SIZE || to >= INVENTORY_SIZE || from == to {
            return false;
        }
        let Some(source) = self.slots[from].take() else {
            return false;
        };

        match self.slots[to].as_mut() {
            None => self.slots[to] = Some(source),
            Some(dest) if dest.item_id == source.item_id => {
                let leftover = dest.add(source.quantity);
                if leftover > 0 {
                    self.slots[from] = Some(ItemStack {
                        quantity: leftover,
                        ..source
                    });
                }
            }
            Some(_) => {
                self.slots[from] = self.slots[to].replace(source);
            }
        }
        true
    }

    /// Discards up to `quantity` units from one slot, returning how many
    pub fn drop_from_slot(&mut self, slot: usize, quantity: u32) -> u32 {
        let Some(entry) = self.slots.get_mut(slot) else {
            return 0;
        };
        let Some(stack) = entry.as_mut() else {
            return 0;
        };

        let dropped = stack.take(quantity);
        if stack.quantity == 0 {
            *entry = None;
        }
        dropped
    }

    pub fn has_item(&self, item_id: u32, quantity: u32) -> bool {
        self.count_item(item_id) >= quantity
    }

    pub fn count_item(&self, item_id: u32) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|stack| stack.item_id == item_id)
            .map(|stack| stack.quantity)
            .sum()
    }

    pub fn slot(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(slot)?.as_ref()
    }

    /// Selects a hotbar slot; out-of-range indices are ignored
    pub fn select_hotbar(&mut self, index: i32) -> bool {
        match usize::try_from(index) {
            Ok(index) if index < HOTBAR_SIZE => {
                self.selected_hotbar = index;
                true
            }
            _ => false,
        }
    }

    pub fn selected_hotbar(&self) -> usize {
        self.selected_hotbar
    }

    pub fn selected_item(&self) -> Option<&ItemStack> {
        self.slot(self.selected_hotbar)
    }

    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Occupied slots in wire form
    pub fn snapshot(&self) -> Vec<InventorySlotData> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|stack| InventorySlotData {
                    slot: index as i32,
                    item_id: stack.item_id,
                    quantity: stack.quantity,
                })
            })
            .collect()
    }
}
