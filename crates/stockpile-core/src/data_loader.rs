//! Data-driven registry loading from JSON.
//!
//! Feature-gated behind `data-loader`. Provides JSON deserialization into
//! [`RegistryBuilder`] for content defined in data files.

use crate::registry::{
    ItemTypeDef, RecipeDef, RecipeEntry, RegistryBuilder, RegistryError,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown item reference: {0}")]
    UnknownItemRef(String),
    #[error("unknown tile reference: {0}")]
    UnknownTileRef(String),
    #[error("unknown group reference: {0}")]
    UnknownGroupRef(String),
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

/// Top-level catalog data structure for JSON deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tiles: Vec<String>,
    #[serde(default)]
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
}

/// JSON representation of an item type.
#[derive(Debug, serde::Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    #[serde(default)]
    pub damage: u32,
    #[serde(default)]
    pub defense: u32,
    #[serde(default)]
    pub tool_power: u32,
    #[serde(default)]
    pub consumable: bool,
    /// References a tile by name.
    #[serde(default)]
    pub placeable: Option<String>,
    /// References a group by name.
    #[serde(default)]
    pub group: Option<String>,
}

fn default_max_stack() -> u32 {
    999
}

/// JSON representation of a recipe.
#[derive(Debug, serde::Deserialize)]
pub struct RecipeData {
    pub name: String,
    pub result: RecipeEntryData,
    #[serde(default)]
    pub ingredients: Vec<RecipeEntryData>,
    /// References tiles by name.
    #[serde(default)]
    pub tiles: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// JSON representation of a recipe result/ingredient slot.
#[derive(Debug, serde::Deserialize)]
pub struct RecipeEntryData {
    pub item: String, // references item by name
    pub quantity: u32,
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load a catalog from a JSON string.
pub fn load_catalog_json(json: &str) -> Result<RegistryBuilder, DataLoadError> {
    let data: CatalogData = serde_json::from_str(json)?;
    build_catalog(data)
}

/// Load a catalog from JSON bytes.
pub fn load_catalog_json_bytes(bytes: &[u8]) -> Result<RegistryBuilder, DataLoadError> {
    let data: CatalogData = serde_json::from_slice(bytes)?;
    build_catalog(data)
}

fn build_catalog(data: CatalogData) -> Result<RegistryBuilder, DataLoadError> {
    let mut builder = RegistryBuilder::new();

    for group in &data.groups {
        builder.register_group(group);
    }
    for tile in &data.tiles {
        builder.register_tile(tile);
    }

    for item in &data.items {
        let placeable = match &item.placeable {
            Some(name) => Some(
                builder
                    .tile_id(name)
                    .ok_or_else(|| DataLoadError::UnknownTileRef(name.clone()))?,
            ),
            None => None,
        };
        let group = match &item.group {
            Some(name) => Some(
                builder
                    .group_id(name)
                    .ok_or_else(|| DataLoadError::UnknownGroupRef(name.clone()))?,
            ),
            None => None,
        };
        builder.register_item(ItemTypeDef {
            name: item.name.clone(),
            max_stack: item.max_stack,
            damage: item.damage,
            defense: item.defense,
            tool_power: item.tool_power,
            consumable: item.consumable,
            placeable,
            group,
        });
    }

    for recipe in &data.recipes {
        let resolve_entry = |entry: &RecipeEntryData| -> Result<RecipeEntry, DataLoadError> {
            let item = builder
                .item_id(&entry.item)
                .ok_or_else(|| DataLoadError::UnknownItemRef(entry.item.clone()))?;
            Ok(RecipeEntry {
                item,
                quantity: entry.quantity,
            })
        };

        let result = resolve_entry(&recipe.result)?;
        let ingredients = recipe
            .ingredients
            .iter()
            .map(resolve_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let tiles = recipe
            .tiles
            .iter()
            .map(|name| {
                builder
                    .tile_id(name)
                    .ok_or_else(|| DataLoadError::UnknownTileRef(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let group = match &recipe.group {
            Some(name) => Some(
                builder
                    .group_id(name)
                    .ok_or_else(|| DataLoadError::UnknownGroupRef(name.clone()))?,
            ),
            None => None,
        };

        builder.register_recipe(RecipeDef {
            name: recipe.name.clone(),
            result,
            ingredients,
            tiles,
            group,
            enabled: recipe.enabled,
        });
    }

    Ok(builder)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_empty_json() {
        let json = r#"{"items": [], "recipes": []}"#;
        let builder = load_catalog_json(json).unwrap();
        let reg = builder.build().unwrap();
        assert_eq!(reg.item_count(), 1); // just the placeholder
        assert_eq!(reg.recipe_count(), 0);
    }

    #[test]
    fn load_full_catalog() {
        let json = r#"{
            "groups": ["thorium"],
            "tiles": ["anvil"],
            "items": [
                {"name": "iron_bar"},
                {"name": "chain", "max_stack": 999},
                {"name": "thorium_bar", "group": "thorium"}
            ],
            "recipes": [
                {
                    "name": "chain",
                    "result": {"item": "chain", "quantity": 10},
                    "ingredients": [{"item": "iron_bar", "quantity": 1}],
                    "tiles": ["anvil"]
                }
            ]
        }"#;
        let builder = load_catalog_json(json).unwrap();
        let reg = builder.build().unwrap();
        assert_eq!(reg.recipe_count(), 1);
        assert_eq!(reg.group_count(), 1);
        let recipe = reg.get_recipe(reg.recipe_id("chain").unwrap()).unwrap();
        assert_eq!(recipe.result.quantity, 10);
        assert_eq!(recipe.tiles.len(), 1);
        assert!(recipe.enabled);
        let thorium = reg.get_item(reg.item_id("thorium_bar").unwrap()).unwrap();
        assert_eq!(thorium.group, reg.group_id("thorium"));
    }

    #[test]
    fn load_disabled_recipe() {
        let json = r#"{
            "items": [{"name": "x"}],
            "recipes": [{"name": "off", "result": {"item": "x", "quantity": 1}, "enabled": false}]
        }"#;
        let reg = load_catalog_json(json).unwrap().build().unwrap();
        assert!(!reg.get_recipe(reg.recipe_id("off").unwrap()).unwrap().enabled);
    }

    #[test]
    fn load_placeable_item_resolves_tile() {
        let json = r#"{
            "tiles": ["work_bench"],
            "items": [{"name": "work_bench_item", "placeable": "work_bench"}]
        }"#;
        let reg = load_catalog_json(json).unwrap().build().unwrap();
        let item = reg.get_item(reg.item_id("work_bench_item").unwrap()).unwrap();
        assert_eq!(item.placeable, reg.tile_id("work_bench"));
    }

    #[test]
    fn load_unknown_item_fails() {
        let json = r#"{
            "items": [{"name": "ore"}],
            "recipes": [{"name": "bad", "result": {"item": "nonexistent", "quantity": 1}}]
        }"#;
        assert!(matches!(
            load_catalog_json(json),
            Err(DataLoadError::UnknownItemRef(_))
        ));
    }

    #[test]
    fn load_unknown_tile_fails() {
        let json = r#"{
            "items": [{"name": "x"}],
            "recipes": [{"name": "bad", "result": {"item": "x", "quantity": 1}, "tiles": ["missing"]}]
        }"#;
        assert!(matches!(
            load_catalog_json(json),
            Err(DataLoadError::UnknownTileRef(_))
        ));
    }

    #[test]
    fn load_unknown_group_fails() {
        let json = r#"{"items": [{"name": "x", "group": "missing"}]}"#;
        assert!(matches!(
            load_catalog_json(json),
            Err(DataLoadError::UnknownGroupRef(_))
        ));
    }

    #[test]
    fn load_invalid_json_fails() {
        assert!(matches!(
            load_catalog_json("not valid json {{{"),
            Err(DataLoadError::JsonParse(_))
        ));
    }
}
