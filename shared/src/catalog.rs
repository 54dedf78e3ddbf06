//! Read-only item and recipe catalog
//!
//! Built once at startup (either the built-in table or a JSON file with the
//! same shape) and then shared by handle. Nothing mutates it afterwards.

use crate::protocol::{IngredientData, RecipeData};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Well-known item ids referenced by server logic
pub mod item_ids {
    pub const APPLE: u32 = 1;
    pub const COOKED_MEAT: u32 = 2;
    pub const CHOCOLATE_BAR: u32 = 3;
    pub const WATER_BOTTLE: u32 = 4;
    pub const SODA_CAN: u32 = 5;
    pub const BANDAGE: u32 = 6;
    pub const MEDICAL_SYRINGE: u32 = 7;
    pub const LARGE_MEDKIT: u32 = 8;
    pub const SURVIVAL_RATION: u32 = 9;
    pub const ENERGY_DRINK: u32 = 10;

    pub const WOOD: u32 = 100;
    pub const STONE: u32 = 101;
    pub const METAL_ORE: u32 = 102;
    pub const SULFUR_ORE: u32 = 103;

    pub const STONE_HATCHET: u32 = 200;
    pub const STONE_PICKAXE: u32 = 201;

    pub const CAMPFIRE: u32 = 300;
    pub const WOODEN_BOX: u32 = 301;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("item id {0} defined twice")]
    DuplicateItem(u32),

    #[error("recipe id {0} defined twice")]
    DuplicateRecipe(u32),

    #[error("item {0} has a max stack of zero")]
    ZeroMaxStack(u32),

    #[error("recipe {recipe} references unknown item {item}")]
    UnknownItem { recipe: u32, item: u32 },

    #[error("recipe {0} has a zero quantity")]
    ZeroQuantity(u32),

    #[error("recipe {recipe} lists item {item} more than once")]
    DuplicateIngredient { recipe: u32, item: u32 },

    #[error("recipe {0} has an invalid craft time")]
    InvalidCraftTime(u32),
}

/// Longest craft a catalog may declare: one in-game day
pub const MAX_CRAFT_TIME_SECS: f32 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Consumable,
    Resource,
    Tool,
    Building,
    Clothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumableCategory {
    Food,
    Water,
    Medicine,
    Hybrid,
}

/// Per-stat restore amounts applied when a consumable is used
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumableEffect {
    pub category: ConsumableCategory,
    #[serde(default)]
    pub health: f32,
    #[serde(default)]
    pub hunger: f32,
    #[serde(default)]
    pub thirst: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ItemKind,
    pub max_stack: u32,
    #[serde(default)]
    pub consumable: Option<ConsumableEffect>,
}

impl ItemDefinition {
    pub fn new(id: u32, name: &str, description: &str, kind: ItemKind, max_stack: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            kind,
            max_stack,
            consumable: None,
        }
    }

    pub fn with_effect(
        mut self,
        category: ConsumableCategory,
        health: f32,
        hunger: f32,
        thirst: f32,
    ) -> Self {
        self.consumable = Some(ConsumableEffect {
            category,
            health,
            hunger,
            thirst,
        });
        self
    }

    pub fn is_consumable(&self) -> bool {
        self.consumable.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item_id: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: u32,
    pub name: String,
    pub result_item_id: u32,
    pub result_quantity: u32,
    pub craft_time_secs: f32,
    /// Display tag for clients; no workbench entity exists server-side
    #[serde(default)]
    pub required_workbench: u32,
    pub ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Craft time clamped to `0..=MAX_CRAFT_TIME_SECS`; NaN counts as zero
    pub fn craft_duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.craft_time_secs.clamp(0.0, MAX_CRAFT_TIME_SECS))
            .unwrap_or_default()
    }

    /// Total quantity needed per item id, summing repeated entries
    pub fn requirements(&self) -> BTreeMap<u32, u32> {
        let mut totals = BTreeMap::new();
        for ingredient in &self.ingredients {
            let total: &mut u32 = totals.entry(ingredient.item_id).or_default();
            *total = total.saturating_add(ingredient.quantity);
        }
        totals
    }

    pub fn to_wire(&self) -> RecipeData {
        RecipeData {
            id: self.id,
            name: self.name.clone(),
            result_item_id: self.result_item_id,
            result_quantity: self.result_quantity,
            craft_time: self.craft_time_secs,
            required_workbench: self.required_workbench,
            ingredients: self
                .ingredients
                .iter()
                .map(|i| IngredientData {
                    item_id: i.item_id,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    items: Vec<ItemDefinition>,
    #[serde(default)]
    recipes: Vec<Recipe>,
}

/// Immutable id → definition lookup for items and recipes
#[derive(Debug, Clone)]
pub struct Catalog {
    items: BTreeMap<u32, Arc<ItemDefinition>>,
    recipes: BTreeMap<u32, Recipe>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids and dangling references
    pub fn new(items: Vec<ItemDefinition>, recipes: Vec<Recipe>) -> Result<Self, CatalogError> {
        let mut item_map = BTreeMap::new();
        for item in items {
            if item.max_stack == 0 {
                return Err(CatalogError::ZeroMaxStack(item.id));
            }
            let id = item.id;
            if item_map.insert(id, Arc::new(item)).is_some() {
                return Err(CatalogError::DuplicateItem(id));
            }
        }

        let mut recipe_map = BTreeMap::new();
        for recipe in recipes {
            let referenced = std::iter::once((recipe.result_item_id, recipe.result_quantity))
                .chain(recipe.ingredients.iter().map(|i| (i.item_id, i.quantity)));
            for (item, quantity) in referenced {
                if !item_map.contains_key(&item) {
                    return Err(CatalogError::UnknownItem {
                        recipe: recipe.id,
                        item,
                    });
                }
                if quantity == 0 {
                    return Err(CatalogError::ZeroQuantity(recipe.id));
                }
            }
            let mut seen = BTreeSet::new();
            for ingredient in &recipe.ingredients {
                if !seen.insert(ingredient.item_id) {
                    return Err(CatalogError::DuplicateIngredient {
                        recipe: recipe.id,
                        item: ingredient.item_id,
                    });
                }
            }
            if !(0.0..=MAX_CRAFT_TIME_SECS).contains(&recipe.craft_time_secs) {
                return Err(CatalogError::InvalidCraftTime(recipe.id));
            }

            let id = recipe.id;
            if recipe_map.insert(id, recipe).is_some() {
                return Err(CatalogError::DuplicateRecipe(id));
            }
        }

        Ok(Self {
            items: item_map,
            recipes: recipe_map,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.items, file.recipes)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The content table shipped with the server
    pub fn builtin() -> Self {
        let items = builtin_items()
            .into_iter()
            .map(|item| (item.id, Arc::new(item)))
            .collect();
        let recipes = builtin_recipes()
            .into_iter()
            .map(|recipe| (recipe.id, recipe))
            .collect();
        Self { items, recipes }
    }

    pub fn lookup_item(&self, id: u32) -> Option<&Arc<ItemDefinition>> {
        self.items.get(&id)
    }

    pub fn lookup_recipe(&self, id: u32) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Arc<ItemDefinition>> {
        self.items.values()
    }

    /// Recipes in ascending id order
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

fn builtin_items() -> Vec<ItemDefinition> {
    use item_ids::*;
    use ConsumableCategory::*;
    use ItemKind::*;

    vec![
        ItemDefinition::new(APPLE, "Apple", "A fresh apple.", Consumable, 10)
            .with_effect(Food, 0.0, 20.0, 5.0),
        ItemDefinition::new(COOKED_MEAT, "Cooked Meat", "Very nourishing.", Consumable, 20)
            .with_effect(Food, 0.0, 50.0, 0.0),
        ItemDefinition::new(CHOCOLATE_BAR, "Chocolate Bar", "Quick energy.", Consumable, 10)
            .with_effect(Food, 0.0, 30.0, 10.0),
        ItemDefinition::new(WATER_BOTTLE, "Water Bottle", "Quenches thirst.", Consumable, 5)
            .with_effect(Water, 0.0, 0.0, 50.0),
        ItemDefinition::new(SODA_CAN, "Soda Can", "Hydrates a little.", Consumable, 10)
            .with_effect(Water, 0.0, 10.0, 40.0),
        ItemDefinition::new(BANDAGE, "Bandage", "Restores 20 HP.", Consumable, 10)
            .with_effect(Medicine, 20.0, 0.0, 0.0),
        ItemDefinition::new(MEDICAL_SYRINGE, "Medical Syringe", "Restores 50 HP.", Consumable, 5)
            .with_effect(Medicine, 50.0, 0.0, 0.0),
        ItemDefinition::new(LARGE_MEDKIT, "Large Medkit", "Full heal.", Consumable, 3)
            .with_effect(Medicine, 100.0, 0.0, 0.0),
        ItemDefinition::new(SURVIVAL_RATION, "Survival Ration", "A bit of everything.", Consumable, 5)
            .with_effect(Hybrid, 10.0, 30.0, 30.0),
        ItemDefinition::new(ENERGY_DRINK, "Energy Drink", "Full boost.", Consumable, 5)
            .with_effect(Hybrid, 20.0, 40.0, 60.0),
        ItemDefinition::new(WOOD, "Wood", "Basic building material.", Resource, 1000),
        ItemDefinition::new(STONE, "Stone", "Sturdier than wood.", Resource, 1000),
        ItemDefinition::new(METAL_ORE, "Metal Ore", "Valuable ore.", Resource, 500),
        ItemDefinition::new(SULFUR_ORE, "Sulfur Ore", "Used for explosives.", Resource, 500),
        ItemDefinition::new(STONE_HATCHET, "Stone Hatchet", "Chops trees faster.", Tool, 1),
        ItemDefinition::new(STONE_PICKAXE, "Stone Pickaxe", "Mines rock faster.", Tool, 1),
        ItemDefinition::new(CAMPFIRE, "Campfire", "Keeps you warm.", Building, 5),
        ItemDefinition::new(WOODEN_BOX, "Wooden Box", "Small storage.", Building, 5),
    ]
}

fn builtin_recipes() -> Vec<Recipe> {
    use item_ids::*;

    let recipe = |id: u32, name: &str, result: u32, secs: f32, ingredients: &[(u32, u32)]| Recipe {
        id,
        name: name.to_string(),
        result_item_id: result,
        result_quantity: 1,
        craft_time_secs: secs,
        required_workbench: 0,
        ingredients: ingredients
            .iter()
            .map(|&(item_id, quantity)| Ingredient { item_id, quantity })
            .collect(),
    };

    vec![
        recipe(1, "Stone Hatchet", STONE_HATCHET, 10.0, &[(WOOD, 200), (STONE, 100)]),
        recipe(2, "Stone Pickaxe", STONE_PICKAXE, 10.0, &[(WOOD, 200), (STONE, 100)]),
        recipe(3, "Campfire", CAMPFIRE, 5.0, &[(WOOD, 100)]),
        recipe(4, "Wooden Box", WOODEN_BOX, 15.0, &[(WOOD, 300)]),
    ]
}
