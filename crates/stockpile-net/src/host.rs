//! The authoritative side of the storage protocol.
//!
//! All storage mutation flows through [`Host::handle_packet`]: participants
//! send requests, the host arbitrates them against its [`EntityDirectory`],
//! and results go back as unicast replies plus broadcast invalidations.
//! Requests naming entities that no longer exist are answered by dropping
//! them; the requester's view is repaired by the refresh broadcasts that
//! follow every committed mutation.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use stockpile_core::cache::IndexCache;
use stockpile_core::id::{ClientId, EntityId, ItemTypeId, Position};
use stockpile_core::item::ItemStack;
use stockpile_core::registry::Registry;
use stockpile_core::storage::{EntityDirectory, StorageEntity, StorageUnit};

use crate::message::{Message, StationOp, StationResult, StorageOp, StorageResult};
use crate::queue::UpdateQueue;
use crate::transport::Transport;
use crate::wire::WireError;

/// A request the host cannot answer from storage state alone and hands up
/// to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A participant asked for a reachability recomputation from `origin`.
    NetworkSearch { client: ClientId, origin: Position },
    /// A participant asked for world data around `coords`.
    SectionCheck { client: ClientId, coords: Position },
}

/// The authoritative protocol endpoint.
///
/// Owns the entity directory and the content context (registry plus index
/// cache). Single-threaded by construction: one packet is handled to
/// completion before the next.
pub struct Host {
    directory: EntityDirectory,
    registry: Arc<Registry>,
    cache: Arc<IndexCache>,
    update_queue: UpdateQueue,
    events: Vec<HostEvent>,
}

impl Host {
    pub fn new(registry: Arc<Registry>) -> Self {
        let cache = Arc::new(IndexCache::build(&registry));
        Self {
            directory: EntityDirectory::new(),
            registry,
            cache,
            update_queue: UpdateQueue::new(),
            events: Vec::new(),
        }
    }

    /// Swap in a new content catalog. The old cache is dropped wholesale
    /// and rebuilt from the new registry.
    pub fn reload_content(&mut self, registry: Arc<Registry>) {
        self.cache = Arc::new(IndexCache::build(&registry));
        self.registry = registry;
    }

    pub fn directory(&self) -> &EntityDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut EntityDirectory {
        &mut self.directory
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    /// Drain the application-level events raised while handling packets.
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Packet dispatch
    // -----------------------------------------------------------------------

    /// Decode and handle one inbound packet from `sender`.
    ///
    /// Wire errors are fatal for the sender's stream and propagate; stale
    /// entity references are not errors and are dropped after logging.
    pub fn handle_packet(
        &mut self,
        sender: ClientId,
        bytes: &[u8],
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        let message = Message::decode(bytes)?;
        trace!(client = sender.0, opcode = message.opcode(), "rx");
        match message {
            Message::SearchAndRefreshNetwork { origin } => {
                self.events.push(HostEvent::NetworkSearch {
                    client: sender,
                    origin,
                });
            }
            Message::ClientStorageOperation { target, op } => {
                self.handle_storage_operation(sender, target, op, transport)?;
            }
            Message::ClientSendEntityUpdate { id, blob } => {
                self.handle_entity_update(sender, id, blob, transport)?;
            }
            Message::ClientSendDeactivate { id, inactive } => {
                self.handle_deactivate(id, inactive, transport)?;
            }
            Message::ClientStationOperation { target, op } => {
                self.handle_station_operation(sender, target, op, transport)?;
            }
            Message::ResetCompactStage { entity } => match self.directory.heart_mut(entity) {
                Some(heart) => heart.reset_compact_stage(),
                None => warn!(entity = entity.0, "compact-stage reset for unknown heart"),
            },
            Message::CraftRequest {
                heart,
                to_withdraw,
                expected_results,
            } => {
                self.handle_craft(sender, heart, to_withdraw, expected_results, transport)?;
            }
            Message::SectionRequest { coords } => {
                self.events.push(HostEvent::SectionCheck {
                    client: sender,
                    coords,
                });
            }
            Message::SyncStorageUnit { position } => {
                self.handle_sync_request(sender, position, transport)?;
            }
            Message::ForceCraftingGUIRefresh { heart_position } => {
                // Pure relay; the host holds no crafting-view state.
                let packet = Message::ForceCraftingGUIRefresh { heart_position }.encode()?;
                transport.broadcast_except(sender, &packet);
            }
            // Participant-bound traffic arriving here is decoded whole and
            // discarded, keeping the stream aligned.
            other @ (Message::ServerStorageResult { .. }
            | Message::ServerStationResult { .. }
            | Message::RefreshNetworkItems { .. }
            | Message::CraftResult { .. }
            | Message::SyncStorageUnitToClient { .. }) => {
                debug!(opcode = other.opcode(), "ignoring participant-bound message");
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Storage operations
    // -----------------------------------------------------------------------

    fn handle_storage_operation(
        &mut self,
        sender: ClientId,
        target: EntityId,
        op: StorageOp,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        if self.directory.heart(target).is_none() {
            warn!(target = target.0, "storage operation on stale heart");
            return Ok(());
        }

        let result = match op {
            StorageOp::Deposit(item) => {
                let (leftover, touched) = self
                    .directory
                    .try_deposit(target, item, &self.registry)
                    .unwrap_or((ItemStack::EMPTY, Vec::new()));
                self.note_mutation(target, &touched, transport)?;
                StorageResult::Deposit(leftover)
            }
            StorageOp::Withdraw { keep_favorite, item } => {
                let (taken, touched) = self
                    .directory
                    .try_withdraw(target, &item, keep_favorite)
                    .unwrap_or((ItemStack::EMPTY, Vec::new()));
                self.note_mutation(target, &touched, transport)?;
                StorageResult::Withdraw(taken)
            }
            StorageOp::WithdrawToInventory { keep_favorite, item } => {
                let (taken, touched) = self
                    .directory
                    .try_withdraw(target, &item, keep_favorite)
                    .unwrap_or((ItemStack::EMPTY, Vec::new()));
                self.note_mutation(target, &touched, transport)?;
                StorageResult::WithdrawToInventory(taken)
            }
            StorageOp::DepositAll(items) => {
                // One coalesced update pass for the whole batch; each entry
                // is still deposited independently.
                self.update_queue.start_queueing();
                let mut leftovers = Vec::with_capacity(items.len());
                let mut all_touched = Vec::new();
                for item in items {
                    let (leftover, touched) = self
                        .directory
                        .try_deposit(target, item, &self.registry)
                        .unwrap_or((ItemStack::EMPTY, Vec::new()));
                    all_touched.extend(touched);
                    leftovers.push(leftover);
                }
                self.note_mutation(target, &all_touched, transport)?;
                StorageResult::DepositAll(leftovers)
            }
        };

        // The reply always goes out, even for an empty result; the
        // requester's in-flight stack is hostage to it.
        let reply = Message::ServerStorageResult { result }.encode()?;
        transport.unicast(sender, &reply);
        let refresh = Message::RefreshNetworkItems { entity: target }.encode()?;
        transport.broadcast(&refresh);
        Ok(())
    }

    /// Record touched units after a committed mutation: reset the heart's
    /// compaction, then emit (or queue) a sync broadcast per unit.
    fn note_mutation(
        &mut self,
        heart: EntityId,
        touched: &[EntityId],
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        if touched.is_empty() {
            if self.update_queue.is_queueing() {
                self.update_queue.drain(|_| {});
            }
            return Ok(());
        }
        if let Some(heart) = self.directory.heart_mut(heart) {
            heart.reset_compact_stage();
        }

        let mut due = Vec::new();
        for &unit in touched {
            self.update_queue.request_update(unit, |id| due.push(id));
        }
        self.update_queue.drain(|id| due.push(id));
        for unit in due {
            self.broadcast_unit_sync(unit, transport)?;
        }
        Ok(())
    }

    fn broadcast_unit_sync(
        &self,
        unit: EntityId,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        let Some(state) = self.directory.unit(unit) else {
            return Ok(());
        };
        let blob = encode_unit(state)?;
        let packet = Message::SyncStorageUnitToClient { id: unit, blob }.encode()?;
        transport.broadcast(&packet);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entity sync
    // -----------------------------------------------------------------------

    fn handle_entity_update(
        &mut self,
        sender: ClientId,
        id: EntityId,
        blob: Vec<u8>,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        let Some(position) = self.directory.position_of(id) else {
            warn!(id = id.0, "entity update for unknown unit");
            return Ok(());
        };
        let unit = decode_unit(&blob)?;
        self.directory
            .insert_with_id(id, position, StorageEntity::Unit(unit));
        for heart in self.directory.hearts_linking(id) {
            if let Some(heart) = self.directory.heart_mut(heart) {
                heart.reset_compact_stage();
            }
        }

        // Everyone but the author gets the authoritative copy.
        let packet = Message::SyncStorageUnitToClient { id, blob }.encode()?;
        transport.broadcast_except(sender, &packet);
        Ok(())
    }

    fn handle_deactivate(
        &mut self,
        id: EntityId,
        inactive: bool,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        let Some(unit) = self.directory.unit_mut(id) else {
            warn!(id = id.0, "deactivate for unknown unit");
            return Ok(());
        };
        unit.inactive = inactive;
        for heart in self.directory.hearts_linking(id) {
            if let Some(heart) = self.directory.heart_mut(heart) {
                heart.reset_compact_stage();
            }
        }
        self.broadcast_unit_sync(id, transport)
    }

    fn handle_sync_request(
        &mut self,
        sender: ClientId,
        position: Position,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        let unit = self
            .directory
            .id_at(position)
            .and_then(|id| self.directory.unit(id).map(|u| (id, u)));
        let Some((id, state)) = unit else {
            warn!(x = position.x, y = position.y, "sync request for unknown unit");
            return Ok(());
        };
        let blob = encode_unit(state)?;
        let packet = Message::SyncStorageUnitToClient { id, blob }.encode()?;
        transport.unicast(sender, &packet);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Station operations
    // -----------------------------------------------------------------------

    fn handle_station_operation(
        &mut self,
        sender: ClientId,
        target: EntityId,
        op: StationOp,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        let Some(station) = self.directory.station_mut(target) else {
            warn!(target = target.0, "station operation on stale station");
            return Ok(());
        };
        let result = match op {
            StationOp::Deposit(item) => StationResult::Deposit(station.deposit(item)),
            StationOp::Withdraw { slot } => {
                StationResult::Withdraw(station.withdraw(slot as usize))
            }
            StationOp::WithdrawToInventory { slot } => {
                StationResult::WithdrawToInventory(station.withdraw(slot as usize))
            }
        };
        let reply = Message::ServerStationResult { result }.encode()?;
        transport.unicast(sender, &reply);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crafting
    // -----------------------------------------------------------------------

    /// Resolve a craft transaction: pull the requested ingredients out of
    /// the network, produce as many whole recipe batches as the pulled pool
    /// covers, return everything unconsumed, and report what was made.
    fn handle_craft(
        &mut self,
        sender: ClientId,
        heart: EntityId,
        to_withdraw: Vec<ItemStack>,
        expected_results: Vec<ItemStack>,
        transport: &mut impl Transport,
    ) -> Result<(), WireError> {
        if self.directory.heart(heart).is_none() {
            warn!(heart = heart.0, "craft request on stale heart");
            return Ok(());
        }
        self.update_queue.start_queueing();
        let mut touched = Vec::new();

        // Pull phase. Partial availability shrinks the pool, never aborts.
        let mut pool: Vec<ItemStack> = Vec::new();
        for want in &to_withdraw {
            if let Some((taken, units)) = self.directory.try_withdraw(heart, want, false) {
                touched.extend(units);
                if !taken.is_empty() {
                    pool.push(taken);
                }
            }
        }

        // Resolve phase: whole batches only, first producer in catalog
        // order that the pool can feed.
        let mut crafted: Vec<ItemStack> = Vec::new();
        for expected in &expected_results {
            if expected.is_empty() {
                continue;
            }
            for &recipe_id in self.cache.recipes_by_result(expected.item_type) {
                let Some(recipe) = self.registry.get_recipe(recipe_id) else {
                    continue;
                };
                let per_batch = recipe.result.quantity.max(1);
                let wanted = expected.stack.div_ceil(per_batch);
                let coverable = recipe
                    .ingredients
                    .iter()
                    .map(|entry| pool_available(&pool, entry.item) / entry.quantity.max(1))
                    .min()
                    .unwrap_or(wanted);
                let batches = wanted.min(coverable);
                if batches == 0 {
                    continue;
                }
                // Ingredient-free recipes leave `batches` bounded only by
                // the request, so the products can reach u32::MAX.
                for entry in &recipe.ingredients {
                    pool_consume(&mut pool, entry.item, entry.quantity.saturating_mul(batches));
                }
                crafted.push(expected.with_stack(per_batch.saturating_mul(batches)));
                break;
            }
        }

        // Return phase: unconsumed pool items go back into the network.
        for item in pool {
            if item.is_empty() {
                continue;
            }
            if let Some((leftover, units)) = self.directory.try_deposit(heart, item, &self.registry)
            {
                touched.extend(units);
                if !leftover.is_empty() {
                    warn!(
                        item = leftover.item_type.0,
                        stack = leftover.stack,
                        "craft returns overflowed the network"
                    );
                }
            }
        }

        self.note_mutation(heart, &touched, transport)?;

        if !crafted.is_empty() {
            let reply = Message::CraftResult { items: crafted }.encode()?;
            transport.unicast(sender, &reply);
        }
        let refresh = Message::RefreshNetworkItems { entity: heart }.encode()?;
        transport.broadcast(&refresh);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit blobs
// ---------------------------------------------------------------------------

/// Serialize a unit's full state for the entity-sync blob payload.
pub fn encode_unit(unit: &StorageUnit) -> Result<Vec<u8>, WireError> {
    bitcode::serialize(unit).map_err(|e| WireError::EntityEncode(e.to_string()))
}

/// Inverse of [`encode_unit`].
pub fn decode_unit(blob: &[u8]) -> Result<StorageUnit, WireError> {
    bitcode::deserialize(blob).map_err(|e| WireError::EntityDecode(e.to_string()))
}

fn pool_available(pool: &[ItemStack], item_type: ItemTypeId) -> u32 {
    pool.iter()
        .filter(|s| s.item_type == item_type)
        .fold(0u32, |total, s| total.saturating_add(s.stack))
}

fn pool_consume(pool: &mut [ItemStack], item_type: ItemTypeId, mut amount: u32) {
    for stack in pool.iter_mut() {
        if amount == 0 {
            break;
        }
        if stack.item_type != item_type {
            continue;
        }
        let take = stack.stack.min(amount);
        stack.stack -= take;
        amount -= take;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
