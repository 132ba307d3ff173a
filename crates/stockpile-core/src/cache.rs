//! Derived lookup structures over the recipe catalog.
//!
//! The cache is an explicitly owned context value: build it once per
//! content load from the frozen [`Registry`], query it read-only, and on
//! content reload throw it away and build a fresh one. It is never patched
//! incrementally.

use crate::filter::FilterCategory;
use crate::id::{GroupId, ItemTypeId, RecipeId, TileId};
use crate::registry::Registry;
use std::collections::HashMap;

/// Immutable multi-key indices over the enabled recipes of a [`Registry`].
///
/// All sequences preserve recipe registration order. The ingredient and
/// tile indices hold **one entry per slot occurrence**: a recipe listing
/// the same ingredient type in two slots appears twice under that type.
/// Consumers that need distinct recipes dedupe at query time.
#[derive(Debug, Default)]
pub struct IndexCache {
    enabled: Vec<RecipeId>,
    by_result: HashMap<ItemTypeId, Vec<RecipeId>>,
    by_ingredient: HashMap<ItemTypeId, Vec<RecipeId>>,
    by_tile: HashMap<TileId, Vec<RecipeId>>,
    by_filter: HashMap<FilterCategory, Vec<RecipeId>>,
    by_group: HashMap<GroupId, Vec<RecipeId>>,
    ungrouped: Vec<RecipeId>,
    group_order: Vec<GroupId>,
    index_by_group: HashMap<GroupId, usize>,
    by_item_usage: HashMap<ItemTypeId, Vec<RecipeId>>,
}

impl IndexCache {
    /// Build every index in one pass over the catalog (plus the O(I * R)
    /// usage scan). Single-threaded; run once per load event.
    pub fn build(registry: &Registry) -> IndexCache {
        let mut cache = IndexCache::default();

        for (id, recipe) in registry.recipes() {
            if !recipe.enabled {
                continue;
            }
            cache.enabled.push(id);

            cache
                .by_result
                .entry(recipe.result.item)
                .or_default()
                .push(id);

            // One append per slot occurrence; repetition is intentional.
            for entry in &recipe.ingredients {
                cache.by_ingredient.entry(entry.item).or_default().push(id);
            }
            for &tile in &recipe.tiles {
                cache.by_tile.entry(tile).or_default().push(id);
            }

            match recipe.group {
                Some(group) => cache.by_group.entry(group).or_default().push(id),
                None => cache.ungrouped.push(id),
            }
        }

        for category in FilterCategory::precomputed() {
            let matches: Vec<RecipeId> = cache
                .enabled
                .iter()
                .copied()
                .filter(|&id| {
                    let recipe = registry.get_recipe(id).expect("enabled id from registry");
                    registry
                        .get_item(recipe.result.item)
                        .is_some_and(|item| category.matches(item))
                })
                .collect();
            cache.by_filter.insert(category, matches);
        }

        // Owners are every group that contributed a recipe or at least one
        // catalog item, indexed in first-seen (registration) order.
        for group_index in 0..registry.group_count() {
            let group = GroupId(group_index as u32);
            let owns_recipe = cache.by_group.contains_key(&group);
            let owns_item = registry.items().any(|(_, def)| def.group == Some(group));
            if owns_recipe || owns_item {
                cache.index_by_group.insert(group, cache.group_order.len());
                cache.group_order.push(group);
            }
        }

        for (item_id, _) in registry.items() {
            if item_id.is_placeholder() {
                continue;
            }
            let usage: Vec<RecipeId> = cache
                .enabled
                .iter()
                .copied()
                .filter(|&id| {
                    let recipe = registry.get_recipe(id).expect("enabled id from registry");
                    recipe.result.item == item_id
                        || recipe.ingredients.iter().any(|e| e.item == item_id)
                })
                .collect();
            cache.by_item_usage.insert(item_id, usage);
        }

        cache
    }

    /// Enabled recipes in registration order.
    pub fn enabled_recipes(&self) -> &[RecipeId] {
        &self.enabled
    }

    /// Recipes producing the given result type, in registration order.
    pub fn recipes_by_result(&self, item: ItemTypeId) -> &[RecipeId] {
        self.by_result.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Recipes with an ingredient slot of the given type. One entry per
    /// slot occurrence; duplicates are preserved.
    pub fn recipes_with_ingredient(&self, item: ItemTypeId) -> &[RecipeId] {
        self.by_ingredient
            .get(&item)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Recipes requiring the given station tile. One entry per occurrence.
    pub fn recipes_with_tile(&self, tile: TileId) -> &[RecipeId] {
        self.by_tile.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Precomputed filter partition. Empty for [`FilterCategory::Recent`],
    /// which is history-based and resolved by the caller.
    pub fn recipes_by_filter(&self, category: FilterCategory) -> &[RecipeId] {
        self.by_filter
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Recipes owned by the given group.
    pub fn recipes_by_group(&self, group: GroupId) -> &[RecipeId] {
        self.by_group.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Recipes with no owning group ("vanilla").
    pub fn ungrouped_recipes(&self) -> &[RecipeId] {
        &self.ungrouped
    }

    /// Groups owning at least one recipe or contributing at least one
    /// catalog item, in stable first-seen order.
    pub fn all_groups(&self) -> &[GroupId] {
        &self.group_order
    }

    /// Stable 0-based index of a contributing group.
    pub fn group_index(&self, group: GroupId) -> Option<usize> {
        self.index_by_group.get(&group).copied()
    }

    /// Recipes where the item is the result or any ingredient. Defined for
    /// every non-placeholder item type in the catalog.
    pub fn recipes_using_item(&self, item: ItemTypeId) -> &[RecipeId] {
        self.by_item_usage
            .get(&item)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
