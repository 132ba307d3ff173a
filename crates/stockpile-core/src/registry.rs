use crate::id::{GroupId, ItemTypeId, RecipeId, TileId};
use std::collections::HashMap;

/// An item type definition in the registry.
///
/// The flag fields drive the filter-category predicates; `group` names the
/// content group that contributed the item (None = vanilla).
#[derive(Debug, Clone)]
pub struct ItemTypeDef {
    pub name: String,
    pub max_stack: u32,
    pub damage: u32,
    pub defense: u32,
    pub tool_power: u32,
    pub consumable: bool,
    pub placeable: Option<TileId>,
    pub group: Option<GroupId>,
}

impl ItemTypeDef {
    /// A plain material item with default flags.
    pub fn material(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_stack: 999,
            damage: 0,
            defense: 0,
            tool_power: 0,
            consumable: false,
            placeable: None,
            group: None,
        }
    }
}

/// One ingredient or result slot of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeEntry {
    pub item: ItemTypeId,
    pub quantity: u32,
}

/// A recipe definition. Immutable once the registry is built; discarded and
/// re-registered wholesale on content reload.
#[derive(Debug, Clone)]
pub struct RecipeDef {
    pub name: String,
    pub result: RecipeEntry,
    pub ingredients: Vec<RecipeEntry>,
    pub tiles: Vec<TileId>,
    pub group: Option<GroupId>,
    pub enabled: bool,
}

/// A named content group definition.
#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: String,
}

/// A named crafting-station tile definition.
#[derive(Debug, Clone)]
pub struct TileDef {
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemTypeId),
    #[error("invalid tile reference: {0:?}")]
    InvalidTileRef(TileId),
    #[error("invalid group reference: {0:?}")]
    InvalidGroupRef(GroupId),
}

/// Builder for constructing an immutable [`Registry`].
///
/// Registration order is meaningful: it fixes the id space and the ordering
/// every derived index preserves. Item id 0 is pre-registered as the
/// placeholder and never appears in usage indices.
#[derive(Debug)]
pub struct RegistryBuilder {
    groups: Vec<GroupDef>,
    group_name_to_id: HashMap<String, GroupId>,
    tiles: Vec<TileDef>,
    tile_name_to_id: HashMap<String, TileId>,
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            groups: Vec::new(),
            group_name_to_id: HashMap::new(),
            tiles: Vec::new(),
            tile_name_to_id: HashMap::new(),
            items: Vec::new(),
            item_name_to_id: HashMap::new(),
            recipes: Vec::new(),
            recipe_name_to_id: HashMap::new(),
        };
        // Reserved placeholder occupies item id 0.
        builder.register_item(ItemTypeDef {
            max_stack: 0,
            ..ItemTypeDef::material("air")
        });
        builder
    }

    pub fn register_group(&mut self, name: &str) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(GroupDef {
            name: name.to_string(),
        });
        self.group_name_to_id.insert(name.to_string(), id);
        id
    }

    pub fn register_tile(&mut self, name: &str) -> TileId {
        let id = TileId(self.tiles.len() as u32);
        self.tiles.push(TileDef {
            name: name.to_string(),
        });
        self.tile_name_to_id.insert(name.to_string(), id);
        id
    }

    pub fn register_item(&mut self, def: ItemTypeDef) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.item_name_to_id.insert(def.name.clone(), id);
        self.items.push(def);
        id
    }

    pub fn register_recipe(&mut self, def: RecipeDef) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipe_name_to_id.insert(def.name.clone(), id);
        self.recipes.push(def);
        id
    }

    /// Mutate an existing recipe by name (e.g. to disable it) before the
    /// registry is frozen.
    pub fn mutate_recipe<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut RecipeDef),
    {
        let id = self
            .recipe_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.recipes[id.0 as usize]);
        Ok(())
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.group_name_to_id.get(name).copied()
    }

    pub fn tile_id(&self, name: &str) -> Option<TileId> {
        self.tile_name_to_id.get(name).copied()
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    /// Finalize and build the immutable registry. Validates every item,
    /// tile, and group reference.
    pub fn build(self) -> Result<Registry, RegistryError> {
        for item in &self.items {
            if let Some(tile) = item.placeable {
                if tile.0 as usize >= self.tiles.len() {
                    return Err(RegistryError::InvalidTileRef(tile));
                }
            }
            if let Some(group) = item.group {
                if group.0 as usize >= self.groups.len() {
                    return Err(RegistryError::InvalidGroupRef(group));
                }
            }
        }
        for recipe in &self.recipes {
            for entry in std::iter::once(&recipe.result).chain(recipe.ingredients.iter()) {
                if entry.item.0 as usize >= self.items.len() {
                    return Err(RegistryError::InvalidItemRef(entry.item));
                }
            }
            for &tile in &recipe.tiles {
                if tile.0 as usize >= self.tiles.len() {
                    return Err(RegistryError::InvalidTileRef(tile));
                }
            }
            if let Some(group) = recipe.group {
                if group.0 as usize >= self.groups.len() {
                    return Err(RegistryError::InvalidGroupRef(group));
                }
            }
        }

        Ok(Registry {
            groups: self.groups,
            group_name_to_id: self.group_name_to_id,
            tiles: self.tiles,
            tile_name_to_id: self.tile_name_to_id,
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
        })
    }
}

/// Immutable content registry. Frozen after `build()`. Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    groups: Vec<GroupDef>,
    group_name_to_id: HashMap<String, GroupId>,
    tiles: Vec<TileDef>,
    tile_name_to_id: HashMap<String, TileId>,
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl Registry {
    pub fn get_group(&self, id: GroupId) -> Option<&GroupDef> {
        self.groups.get(id.0 as usize)
    }

    pub fn get_tile(&self, id: TileId) -> Option<&TileDef> {
        self.tiles.get(id.0 as usize)
    }

    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemTypeDef> {
        self.items.get(id.0 as usize)
    }

    pub fn get_recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.group_name_to_id.get(name).copied()
    }

    pub fn tile_id(&self, name: &str) -> Option<TileId> {
        self.tile_name_to_id.get(name).copied()
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// Iterate all recipes in registration order, with their ids.
    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &RecipeDef)> {
        self.recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (RecipeId(i as u32), r))
    }

    /// Iterate all item types in registration order, including the
    /// placeholder at id 0.
    pub fn items(&self) -> impl Iterator<Item = (ItemTypeId, &ItemTypeDef)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, d)| (ItemTypeId(i as u32), d))
    }

    /// Per-item stack cap, falling back to 1 for unknown types.
    pub fn max_stack(&self, id: ItemTypeId) -> u32 {
        self.get_item(id).map(|d| d.max_stack).unwrap_or(1)
    }
}
