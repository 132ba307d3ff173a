//! Storage entities and the directory the host arbitrates over.
//!
//! A **heart** aggregates the inventories of its linked storage **units**
//! into one combined view; a crafting **station** holds one item per slot.
//! The [`EntityDirectory`] keys every entity by id and by position and owns
//! the aggregate primitives (`try_deposit` / `try_withdraw` / `has_item`).
//! Partial fulfillment is expressed by returning less than requested, never
//! as an error.

use crate::id::{EntityId, ItemTypeId, Position};
use crate::item::ItemStack;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed slot count of a crafting station.
pub const STATION_SLOTS: usize = 10;

// ---------------------------------------------------------------------------
// StorageUnit
// ---------------------------------------------------------------------------

/// One storage unit: a bounded number of item stacks. Serialized whole as
/// the blob payload of the entity-sync messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnit {
    /// Maximum number of stacks this unit can hold.
    pub capacity: usize,
    /// Deactivated units are skipped by deposits but still readable.
    pub inactive: bool,
    stacks: Vec<ItemStack>,
}

impl StorageUnit {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inactive: false,
            stacks: Vec::new(),
        }
    }

    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }

    pub fn has_item(&self, item_type: ItemTypeId) -> bool {
        self.stacks.iter().any(|s| s.item_type == item_type)
    }

    /// Total count of the given type across all stacks.
    pub fn total_of(&self, item_type: ItemTypeId) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.item_type == item_type)
            .map(|s| s.stack)
            .sum()
    }

    /// Whether a deposit of `item` could merge into an existing stack here.
    pub fn has_merge_target(&self, item: &ItemStack, max_stack: u32) -> bool {
        self.stacks
            .iter()
            .any(|s| s.can_merge(item) && s.stack < max_stack)
    }

    /// Deposit into this unit. Merges into compatible stacks first, then
    /// opens new slots while capacity allows. Returns the leftover.
    #[must_use = "the leftover stack indicates items that did not fit"]
    pub fn deposit(&mut self, item: ItemStack, max_stack: u32) -> ItemStack {
        self.deposit_inner(item, max_stack, true)
    }

    /// Deposit that only merges into existing compatible stacks, never
    /// opening a new slot. Used for the heart's first placement pass.
    #[must_use = "the leftover stack indicates items that did not fit"]
    pub fn deposit_merge_only(&mut self, item: ItemStack, max_stack: u32) -> ItemStack {
        self.deposit_inner(item, max_stack, false)
    }

    fn deposit_inner(&mut self, item: ItemStack, max_stack: u32, open_slots: bool) -> ItemStack {
        if self.inactive || item.is_empty() {
            return item;
        }
        let mut remaining = item.stack;

        for stack in self.stacks.iter_mut() {
            if remaining == 0 {
                break;
            }
            if stack.can_merge(&item) && stack.stack < max_stack {
                let accepted = remaining.min(max_stack - stack.stack);
                stack.stack += accepted;
                remaining -= accepted;
            }
        }

        if open_slots {
            while remaining > 0 && self.stacks.len() < self.capacity {
                let accepted = remaining.min(max_stack);
                self.stacks.push(item.with_stack(accepted));
                remaining -= accepted;
            }
        }

        item.with_stack(remaining)
    }

    /// Withdraw up to `want.stack` items matching `want`'s type and extra
    /// blob. With `keep_one_if_favorite`, favorited stacks always retain
    /// one item. Returns the count actually taken.
    #[must_use = "returns the count actually withdrawn, which may be less than requested"]
    pub fn withdraw(&mut self, want: &ItemStack, keep_one_if_favorite: bool) -> u32 {
        let mut taken = 0;
        for stack in self.stacks.iter_mut() {
            if taken == want.stack {
                break;
            }
            if stack.item_type != want.item_type || stack.extra != want.extra {
                continue;
            }
            let mut available = stack.stack;
            if keep_one_if_favorite && stack.favorite {
                available = available.saturating_sub(1);
            }
            let take = available.min(want.stack - taken);
            stack.stack -= take;
            taken += take;
        }
        self.stacks.retain(|s| s.stack > 0);
        taken
    }
}

// ---------------------------------------------------------------------------
// StorageHeart
// ---------------------------------------------------------------------------

/// The authoritative aggregator of one storage network. Holds the linked
/// unit ids and the compaction progress marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageHeart {
    pub unit_ids: Vec<EntityId>,
    pub compact_stage: u8,
}

impl StorageHeart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_unit(&mut self, unit: EntityId) {
        if !self.unit_ids.contains(&unit) {
            self.unit_ids.push(unit);
        }
    }

    pub fn unlink_unit(&mut self, unit: EntityId) {
        self.unit_ids.retain(|&id| id != unit);
    }

    /// Restart compaction from the beginning; called whenever unit contents
    /// change out from under the compactor.
    pub fn reset_compact_stage(&mut self) {
        self.compact_stage = 0;
    }
}

// ---------------------------------------------------------------------------
// CraftingStation
// ---------------------------------------------------------------------------

/// A crafting-station entity: a fixed row of single-item slots. A station
/// never holds two stacks of the same item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftingStation {
    slots: Vec<ItemStack>,
}

impl Default for CraftingStation {
    fn default() -> Self {
        Self::new()
    }
}

impl CraftingStation {
    pub fn new() -> Self {
        Self {
            slots: vec![ItemStack::EMPTY; STATION_SLOTS],
        }
    }

    pub fn slots(&self) -> &[ItemStack] {
        &self.slots
    }

    /// Place an item into the first empty slot. Duplicate types and full
    /// stations reject the whole stack.
    #[must_use = "the leftover stack indicates items that did not fit"]
    pub fn deposit(&mut self, item: ItemStack) -> ItemStack {
        if item.is_empty() {
            return item;
        }
        if self.slots.iter().any(|s| s.item_type == item.item_type) {
            return item;
        }
        match self.slots.iter_mut().find(|s| s.is_empty()) {
            Some(slot) => {
                *slot = item;
                ItemStack::EMPTY
            }
            None => item,
        }
    }

    /// Take whatever is in the given slot. Out-of-range or empty slots
    /// yield the placeholder stack.
    #[must_use = "the withdrawn stack is the only copy of the slot contents"]
    pub fn withdraw(&mut self, slot: usize) -> ItemStack {
        match self.slots.get_mut(slot) {
            Some(s) => std::mem::replace(s, ItemStack::EMPTY),
            None => ItemStack::EMPTY,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityDirectory
// ---------------------------------------------------------------------------

/// A storage entity of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageEntity {
    Heart(StorageHeart),
    Unit(StorageUnit),
    Station(CraftingStation),
}

/// Directory of storage entities, keyed by id and by position.
///
/// Ids are assigned monotonically by the authoritative host and are
/// wire-stable; participant replicas insert under the host's ids.
#[derive(Debug, Default)]
pub struct EntityDirectory {
    by_id: HashMap<EntityId, (Position, StorageEntity)>,
    by_position: HashMap<Position, EntityId>,
    next_id: u32,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity, assigning the next id.
    pub fn insert(&mut self, position: Position, entity: StorageEntity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.insert_with_id(id, position, entity);
        id
    }

    /// Insert (or replace) an entity under a known id. Used when applying
    /// a sync from the authoritative side.
    pub fn insert_with_id(&mut self, id: EntityId, position: Position, entity: StorageEntity) {
        if let Some((old_pos, _)) = self.by_id.get(&id) {
            self.by_position.remove(old_pos);
        }
        self.by_position.insert(position, id);
        self.by_id.insert(id, (position, entity));
        self.next_id = self.next_id.max(id.0 + 1);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<StorageEntity> {
        let (position, entity) = self.by_id.remove(&id)?;
        self.by_position.remove(&position);
        Some(entity)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&StorageEntity> {
        self.by_id.get(&id).map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut StorageEntity> {
        self.by_id.get_mut(&id).map(|(_, e)| e)
    }

    /// Iterate every entity with its id, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &StorageEntity)> {
        self.by_id.iter().map(|(&id, (_, e))| (id, e))
    }

    /// Ids of every heart that links the given unit.
    pub fn hearts_linking(&self, unit: EntityId) -> Vec<EntityId> {
        self.entities()
            .filter_map(|(id, entity)| match entity {
                StorageEntity::Heart(h) if h.unit_ids.contains(&unit) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        self.by_id.get(&id).map(|(p, _)| *p)
    }

    pub fn id_at(&self, position: Position) -> Option<EntityId> {
        self.by_position.get(&position).copied()
    }

    pub fn heart(&self, id: EntityId) -> Option<&StorageHeart> {
        match self.get(id) {
            Some(StorageEntity::Heart(h)) => Some(h),
            _ => None,
        }
    }

    pub fn heart_mut(&mut self, id: EntityId) -> Option<&mut StorageHeart> {
        match self.get_mut(id) {
            Some(StorageEntity::Heart(h)) => Some(h),
            _ => None,
        }
    }

    pub fn unit(&self, id: EntityId) -> Option<&StorageUnit> {
        match self.get(id) {
            Some(StorageEntity::Unit(u)) => Some(u),
            _ => None,
        }
    }

    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut StorageUnit> {
        match self.get_mut(id) {
            Some(StorageEntity::Unit(u)) => Some(u),
            _ => None,
        }
    }

    pub fn station_mut(&mut self, id: EntityId) -> Option<&mut CraftingStation> {
        match self.get_mut(id) {
            Some(StorageEntity::Station(s)) => Some(s),
            _ => None,
        }
    }

    // -- Aggregate inventory primitives (heart-scoped) --

    /// Deposit into the heart's combined inventory. Two placement passes:
    /// first into units that can merge the item into an existing stack,
    /// then into any active unit with free slots. Returns the leftover and
    /// the ids of every unit whose contents changed, or `None` when the id
    /// does not name a heart (a stale reference, silently droppable).
    pub fn try_deposit(
        &mut self,
        heart: EntityId,
        item: ItemStack,
        registry: &Registry,
    ) -> Option<(ItemStack, Vec<EntityId>)> {
        let unit_ids = self.heart(heart)?.unit_ids.clone();
        let max_stack = registry.max_stack(item.item_type);
        let mut touched = Vec::new();
        let mut remaining = item;

        for pass in 0..2 {
            for &unit_id in &unit_ids {
                if remaining.is_empty() {
                    break;
                }
                let Some(unit) = self.unit_mut(unit_id) else {
                    continue;
                };
                if unit.inactive {
                    continue;
                }
                let before = remaining.stack;
                remaining = if pass == 0 {
                    unit.deposit_merge_only(remaining, max_stack)
                } else {
                    unit.deposit(remaining, max_stack)
                };
                if remaining.stack != before && !touched.contains(&unit_id) {
                    touched.push(unit_id);
                }
            }
        }

        Some((remaining, touched))
    }

    /// Withdraw up to `want.stack` matching items from the heart's combined
    /// inventory. Returns the stack actually taken (possibly empty) and the
    /// touched unit ids, or `None` for a stale reference.
    pub fn try_withdraw(
        &mut self,
        heart: EntityId,
        want: &ItemStack,
        keep_one_if_favorite: bool,
    ) -> Option<(ItemStack, Vec<EntityId>)> {
        let unit_ids = self.heart(heart)?.unit_ids.clone();
        let mut touched = Vec::new();
        let mut taken = 0;

        for &unit_id in &unit_ids {
            if taken == want.stack {
                break;
            }
            let Some(unit) = self.unit_mut(unit_id) else {
                continue;
            };
            let got = unit.withdraw(&want.with_stack(want.stack - taken), keep_one_if_favorite);
            if got > 0 {
                taken += got;
                touched.push(unit_id);
            }
        }

        Some((want.with_stack(taken), touched))
    }

    /// Whether the heart's combined inventory holds any of the given type.
    /// Stale references report `false`.
    pub fn has_item(&self, heart: EntityId, item_type: ItemTypeId) -> bool {
        let Some(heart) = self.heart(heart) else {
            return false;
        };
        heart
            .unit_ids
            .iter()
            .filter_map(|&id| self.unit(id))
            .any(|unit| unit.has_item(item_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ItemTypeDef, RegistryBuilder};

    fn registry_with(names: &[&str]) -> (Registry, Vec<ItemTypeId>) {
        let mut b = RegistryBuilder::new();
        let ids = names
            .iter()
            .map(|n| b.register_item(ItemTypeDef::material(n)))
            .collect();
        (b.build().unwrap(), ids)
    }

    /// Heart with two 4-slot units, returning (directory, heart, units).
    fn network() -> (EntityDirectory, EntityId, Vec<EntityId>) {
        let mut dir = EntityDirectory::new();
        let heart = dir.insert(Position::new(0, 0), StorageEntity::Heart(StorageHeart::new()));
        let mut units = Vec::new();
        for i in 0..2 {
            let unit = dir.insert(
                Position::new(i + 1, 0),
                StorageEntity::Unit(StorageUnit::new(4)),
            );
            dir.heart_mut(heart).unwrap().link_unit(unit);
            units.push(unit);
        }
        (dir, heart, units)
    }

    #[test]
    fn unit_deposit_and_withdraw() {
        let mut unit = StorageUnit::new(4);
        let iron = ItemTypeId(1);
        let leftover = unit.deposit(ItemStack::new(iron, 50), 999);
        assert!(leftover.is_empty());
        assert_eq!(unit.total_of(iron), 50);

        let taken = unit.withdraw(&ItemStack::new(iron, 30), false);
        assert_eq!(taken, 30);
        assert_eq!(unit.total_of(iron), 20);
    }

    #[test]
    fn unit_deposit_splits_across_slots_at_max_stack() {
        let mut unit = StorageUnit::new(4);
        let leftover = unit.deposit(ItemStack::new(ItemTypeId(1), 250), 100);
        assert!(leftover.is_empty());
        assert_eq!(unit.stacks().len(), 3);
        assert_eq!(unit.stacks()[2].stack, 50);
    }

    #[test]
    fn unit_deposit_overflow_returned() {
        let mut unit = StorageUnit::new(1);
        let leftover = unit.deposit(ItemStack::new(ItemTypeId(1), 150), 100);
        assert_eq!(leftover.stack, 50);
    }

    #[test]
    fn inactive_unit_rejects_deposit() {
        let mut unit = StorageUnit::new(4);
        unit.inactive = true;
        let leftover = unit.deposit(ItemStack::new(ItemTypeId(1), 10), 999);
        assert_eq!(leftover.stack, 10);
    }

    #[test]
    fn withdraw_keeps_one_of_favorited_stack() {
        let mut unit = StorageUnit::new(4);
        let mut item = ItemStack::new(ItemTypeId(1), 5);
        item.favorite = true;
        let _ = unit.deposit(item, 999);

        let taken = unit.withdraw(&ItemStack::new(ItemTypeId(1), 5), true);
        assert_eq!(taken, 4);
        assert_eq!(unit.total_of(ItemTypeId(1)), 1);
    }

    #[test]
    fn withdraw_ignores_mismatched_extra_blob() {
        let mut unit = StorageUnit::new(4);
        let mut modded = ItemStack::new(ItemTypeId(1), 5);
        modded.extra = vec![9];
        let _ = unit.deposit(modded, 999);

        let taken = unit.withdraw(&ItemStack::new(ItemTypeId(1), 5), false);
        assert_eq!(taken, 0);
    }

    #[test]
    fn withdraw_removes_drained_stacks() {
        let mut unit = StorageUnit::new(4);
        let _ = unit.deposit(ItemStack::new(ItemTypeId(1), 5), 999);
        let taken = unit.withdraw(&ItemStack::new(ItemTypeId(1), 10), false);
        assert_eq!(taken, 5);
        assert!(unit.stacks().is_empty());
    }

    #[test]
    fn station_deposit_rejects_duplicate_type() {
        let mut station = CraftingStation::new();
        assert!(station.deposit(ItemStack::new(ItemTypeId(1), 1)).is_empty());
        let rejected = station.deposit(ItemStack::new(ItemTypeId(1), 1));
        assert_eq!(rejected.stack, 1);
    }

    #[test]
    fn station_full_rejects_whole_stack() {
        let mut station = CraftingStation::new();
        for i in 0..STATION_SLOTS {
            assert!(
                station
                    .deposit(ItemStack::new(ItemTypeId(i as u32 + 1), 1))
                    .is_empty()
            );
        }
        let rejected = station.deposit(ItemStack::new(ItemTypeId(99), 1));
        assert_eq!(rejected.stack, 1);
    }

    #[test]
    fn station_withdraw_by_slot() {
        let mut station = CraftingStation::new();
        let _ = station.deposit(ItemStack::new(ItemTypeId(7), 1));
        let got = station.withdraw(0);
        assert_eq!(got.item_type, ItemTypeId(7));
        assert!(station.withdraw(0).is_empty());
        assert!(station.withdraw(999).is_empty());
    }

    #[test]
    fn directory_keys_by_id_and_position() {
        let mut dir = EntityDirectory::new();
        let pos = Position::new(10, -3);
        let id = dir.insert(pos, StorageEntity::Unit(StorageUnit::new(4)));
        assert_eq!(dir.id_at(pos), Some(id));
        assert_eq!(dir.position_of(id), Some(pos));
        dir.remove(id);
        assert_eq!(dir.id_at(pos), None);
        assert!(!dir.contains(id));
    }

    #[test]
    fn insert_with_id_replaces_and_advances_counter() {
        let mut dir = EntityDirectory::new();
        dir.insert_with_id(
            EntityId(10),
            Position::new(0, 0),
            StorageEntity::Unit(StorageUnit::new(4)),
        );
        // A stale position index must not linger after a move.
        dir.insert_with_id(
            EntityId(10),
            Position::new(5, 5),
            StorageEntity::Unit(StorageUnit::new(4)),
        );
        assert_eq!(dir.id_at(Position::new(0, 0)), None);
        assert_eq!(dir.id_at(Position::new(5, 5)), Some(EntityId(10)));

        let fresh = dir.insert(Position::new(1, 1), StorageEntity::Unit(StorageUnit::new(4)));
        assert!(fresh.0 > 10);
    }

    #[test]
    fn heart_deposit_prefers_units_with_matching_stacks() {
        let (mut dir, heart, units) = network();
        let (reg, ids) = registry_with(&["iron"]);
        let iron = ids[0];

        // Seed the second unit with an existing iron stack.
        let _ = dir.unit_mut(units[1]).unwrap().deposit(ItemStack::new(iron, 5), 999);

        let (leftover, touched) = dir
            .try_deposit(heart, ItemStack::new(iron, 10), &reg)
            .unwrap();
        assert!(leftover.is_empty());
        // Merge pass hits unit 1 first even though unit 0 precedes it.
        assert_eq!(touched, vec![units[1]]);
        assert_eq!(dir.unit(units[1]).unwrap().total_of(iron), 15);
        assert_eq!(dir.unit(units[0]).unwrap().total_of(iron), 0);
    }

    #[test]
    fn heart_deposit_skips_inactive_units() {
        let (mut dir, heart, units) = network();
        let (reg, ids) = registry_with(&["iron"]);
        dir.unit_mut(units[0]).unwrap().inactive = true;

        let (leftover, touched) = dir
            .try_deposit(heart, ItemStack::new(ids[0], 10), &reg)
            .unwrap();
        assert!(leftover.is_empty());
        assert_eq!(touched, vec![units[1]]);
    }

    #[test]
    fn heart_withdraw_spans_units() {
        let (mut dir, heart, units) = network();
        let (_, ids) = registry_with(&["iron"]);
        let iron = ids[0];
        let _ = dir.unit_mut(units[0]).unwrap().deposit(ItemStack::new(iron, 3), 999);
        let _ = dir.unit_mut(units[1]).unwrap().deposit(ItemStack::new(iron, 4), 999);

        let (got, touched) = dir
            .try_withdraw(heart, &ItemStack::new(iron, 6), false)
            .unwrap();
        assert_eq!(got.stack, 6);
        assert_eq!(touched, units);
        assert_eq!(dir.unit(units[1]).unwrap().total_of(iron), 1);
    }

    #[test]
    fn heart_withdraw_partial_fulfillment() {
        let (mut dir, heart, units) = network();
        let (_, ids) = registry_with(&["iron"]);
        let _ = dir.unit_mut(units[0]).unwrap().deposit(ItemStack::new(ids[0], 2), 999);

        let (got, _) = dir
            .try_withdraw(heart, &ItemStack::new(ids[0], 100), false)
            .unwrap();
        assert_eq!(got.stack, 2);
    }

    #[test]
    fn stale_heart_reference_yields_none() {
        let (mut dir, _, units) = network();
        let (reg, ids) = registry_with(&["iron"]);
        // A unit id is the wrong entity kind; an unknown id is missing.
        assert!(
            dir.try_deposit(units[0], ItemStack::new(ids[0], 1), &reg)
                .is_none()
        );
        assert!(
            dir.try_withdraw(EntityId(999), &ItemStack::new(ids[0], 1), false)
                .is_none()
        );
        assert!(!dir.has_item(EntityId(999), ids[0]));
    }

    #[test]
    fn has_item_scans_linked_units() {
        let (mut dir, heart, units) = network();
        let (_, ids) = registry_with(&["iron"]);
        assert!(!dir.has_item(heart, ids[0]));
        let _ = dir.unit_mut(units[1]).unwrap().deposit(ItemStack::new(ids[0], 1), 999);
        assert!(dir.has_item(heart, ids[0]));
    }
}
