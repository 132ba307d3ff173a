//! The non-authoritative side of the storage protocol.
//!
//! A participant never mutates storage directly. It builds request packets
//! for the host, applies the authoritative broadcasts it receives to its
//! local replica, and surfaces the rest as [`ParticipantEvent`]s for the
//! embedding application (return an item to the player, repaint a view).

use tracing::{debug, trace, warn};

use stockpile_core::id::{EntityId, Position};
use stockpile_core::item::ItemStack;
use stockpile_core::storage::{EntityDirectory, StorageEntity};

use crate::host::decode_unit;
use crate::message::{Message, StationOp, StationResult, StorageOp, StorageResult};
use crate::wire::WireError;

/// Something the embedding application must act on after a packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ParticipantEvent {
    /// An item came back from the host: a deposit leftover or a withdrawal.
    /// `to_player_inventory` distinguishes direct-to-inventory flows from
    /// ones that land on the cursor.
    ItemReturned {
        item: ItemStack,
        to_player_inventory: bool,
    },
    /// A crafted item to hand to the player.
    CraftedItem(ItemStack),
    /// Cached views of this heart's combined inventory are stale.
    StorageRefresh(EntityId),
    /// The open crafting view must repaint.
    CraftViewRefresh,
    /// A unit's replica state was replaced by an authoritative sync.
    UnitSynced(EntityId),
}

/// Replica-side protocol endpoint.
#[derive(Debug, Default)]
pub struct Participant {
    directory: EntityDirectory,
    /// Position of the heart whose crafting view is open, if any.
    current_heart: Option<Position>,
    crafting_open: bool,
    events: Vec<ParticipantEvent>,
}

impl Participant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> &EntityDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut EntityDirectory {
        &mut self.directory
    }

    /// Track which heart's crafting view is open, for GUI-refresh scoping.
    pub fn set_crafting_view(&mut self, heart: Option<Position>) {
        self.crafting_open = heart.is_some();
        self.current_heart = heart;
    }

    pub fn take_events(&mut self) -> Vec<ParticipantEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Request constructors
    // -----------------------------------------------------------------------

    pub fn request_network_search(&self, origin: Position) -> Result<Vec<u8>, WireError> {
        Message::SearchAndRefreshNetwork { origin }.encode()
    }

    pub fn request_deposit(
        &self,
        heart: EntityId,
        item: ItemStack,
    ) -> Result<Vec<u8>, WireError> {
        Message::ClientStorageOperation {
            target: heart,
            op: StorageOp::Deposit(item),
        }
        .encode()
    }

    pub fn request_withdraw(
        &self,
        heart: EntityId,
        item: ItemStack,
        keep_favorite: bool,
        to_player_inventory: bool,
    ) -> Result<Vec<u8>, WireError> {
        let op = if to_player_inventory {
            StorageOp::WithdrawToInventory { keep_favorite, item }
        } else {
            StorageOp::Withdraw { keep_favorite, item }
        };
        Message::ClientStorageOperation { target: heart, op }.encode()
    }

    pub fn request_deposit_all(
        &self,
        heart: EntityId,
        items: Vec<ItemStack>,
    ) -> Result<Vec<u8>, WireError> {
        Message::ClientStorageOperation {
            target: heart,
            op: StorageOp::DepositAll(items),
        }
        .encode()
    }

    pub fn request_station_deposit(
        &self,
        station: EntityId,
        item: ItemStack,
    ) -> Result<Vec<u8>, WireError> {
        Message::ClientStationOperation {
            target: station,
            op: StationOp::Deposit(item),
        }
        .encode()
    }

    pub fn request_station_withdraw(
        &self,
        station: EntityId,
        slot: u8,
        to_player_inventory: bool,
    ) -> Result<Vec<u8>, WireError> {
        let op = if to_player_inventory {
            StationOp::WithdrawToInventory { slot }
        } else {
            StationOp::Withdraw { slot }
        };
        Message::ClientStationOperation { target: station, op }.encode()
    }

    pub fn request_craft(
        &self,
        heart: EntityId,
        to_withdraw: Vec<ItemStack>,
        expected_results: Vec<ItemStack>,
    ) -> Result<Vec<u8>, WireError> {
        Message::CraftRequest {
            heart,
            to_withdraw,
            expected_results,
        }
        .encode()
    }

    pub fn request_reset_compact_stage(&self, heart: EntityId) -> Result<Vec<u8>, WireError> {
        Message::ResetCompactStage { entity: heart }.encode()
    }

    pub fn request_section(&self, coords: Position) -> Result<Vec<u8>, WireError> {
        Message::SectionRequest { coords }.encode()
    }

    pub fn request_unit_sync(&self, position: Position) -> Result<Vec<u8>, WireError> {
        Message::SyncStorageUnit { position }.encode()
    }

    /// Push this replica's copy of a unit to the host after a local edit.
    pub fn push_unit_update(&self, id: EntityId) -> Result<Vec<u8>, WireError> {
        let Some(unit) = self.directory.unit(id) else {
            return Err(WireError::EntityEncode(format!("no unit with id {}", id.0)));
        };
        let blob = crate::host::encode_unit(unit)?;
        Message::ClientSendEntityUpdate { id, blob }.encode()
    }

    pub fn push_deactivate(&self, id: EntityId, inactive: bool) -> Result<Vec<u8>, WireError> {
        Message::ClientSendDeactivate { id, inactive }.encode()
    }

    pub fn notify_crafting_gui_refresh(
        &self,
        heart_position: Position,
    ) -> Result<Vec<u8>, WireError> {
        Message::ForceCraftingGUIRefresh { heart_position }.encode()
    }

    // -----------------------------------------------------------------------
    // Inbound handling
    // -----------------------------------------------------------------------

    /// Decode and apply one packet from the host.
    pub fn handle_packet(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let message = Message::decode(bytes)?;
        trace!(opcode = message.opcode(), "rx");
        match message {
            Message::ServerStorageResult { result } => self.apply_storage_result(result),
            Message::ServerStationResult { result } => self.apply_station_result(result),
            Message::RefreshNetworkItems { entity } => {
                self.events.push(ParticipantEvent::StorageRefresh(entity));
            }
            Message::CraftResult { items } => {
                for item in items {
                    if !item.is_empty() {
                        self.events.push(ParticipantEvent::CraftedItem(item));
                    }
                }
            }
            Message::SyncStorageUnitToClient { id, blob } => {
                self.apply_unit_sync(id, &blob)?;
            }
            Message::ForceCraftingGUIRefresh { heart_position } => {
                // Only relevant when this player is looking at that heart.
                if self.crafting_open && self.current_heart == Some(heart_position) {
                    self.events.push(ParticipantEvent::CraftViewRefresh);
                }
            }
            // Host-bound traffic arriving here is decoded whole and
            // discarded, keeping the stream aligned.
            other => {
                debug!(opcode = other.opcode(), "ignoring host-bound message");
            }
        }
        Ok(())
    }

    fn apply_storage_result(&mut self, result: StorageResult) {
        match result {
            StorageResult::Deposit(leftover) => {
                if !leftover.is_empty() {
                    self.events.push(ParticipantEvent::ItemReturned {
                        item: leftover,
                        to_player_inventory: false,
                    });
                }
            }
            StorageResult::Withdraw(taken) => {
                if !taken.is_empty() {
                    self.events.push(ParticipantEvent::ItemReturned {
                        item: taken,
                        to_player_inventory: false,
                    });
                }
            }
            StorageResult::WithdrawToInventory(taken) => {
                if !taken.is_empty() {
                    self.events.push(ParticipantEvent::ItemReturned {
                        item: taken,
                        to_player_inventory: true,
                    });
                }
            }
            StorageResult::DepositAll(leftovers) => {
                for leftover in leftovers {
                    if !leftover.is_empty() {
                        self.events.push(ParticipantEvent::ItemReturned {
                            item: leftover,
                            to_player_inventory: true,
                        });
                    }
                }
            }
        }
    }

    fn apply_station_result(&mut self, result: StationResult) {
        let to_player_inventory = matches!(result, StationResult::WithdrawToInventory(_));
        let item = result.item().clone();
        if !item.is_empty() {
            self.events.push(ParticipantEvent::ItemReturned {
                item,
                to_player_inventory,
            });
        }
    }

    fn apply_unit_sync(&mut self, id: EntityId, blob: &[u8]) -> Result<(), WireError> {
        let Some(position) = self.directory.position_of(id) else {
            warn!(id = id.0, "unit sync for unknown replica entity");
            return Ok(());
        };
        let unit = decode_unit(blob)?;
        self.directory
            .insert_with_id(id, position, StorageEntity::Unit(unit));
        self.events.push(ParticipantEvent::UnitSynced(id));
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::encode_unit;
    use stockpile_core::id::ItemTypeId;
    use stockpile_core::storage::StorageUnit;

    fn replica_with_unit() -> (Participant, EntityId) {
        let mut participant = Participant::new();
        let id = participant
            .directory_mut()
            .insert(Position::new(2, 0), StorageEntity::Unit(StorageUnit::new(4)));
        (participant, id)
    }

    fn apply(participant: &mut Participant, message: Message) {
        participant.handle_packet(&message.encode().unwrap()).unwrap();
    }

    #[test]
    fn deposit_leftover_returns_to_cursor() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::ServerStorageResult {
                result: StorageResult::Deposit(ItemStack::new(ItemTypeId(1), 3)),
            },
        );
        assert_eq!(
            participant.take_events(),
            vec![ParticipantEvent::ItemReturned {
                item: ItemStack::new(ItemTypeId(1), 3),
                to_player_inventory: false,
            }]
        );
    }

    #[test]
    fn empty_results_raise_no_events() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::ServerStorageResult {
                result: StorageResult::Deposit(ItemStack::EMPTY),
            },
        );
        apply(
            &mut participant,
            Message::ServerStorageResult {
                result: StorageResult::Withdraw(ItemStack::EMPTY),
            },
        );
        assert!(participant.take_events().is_empty());
    }

    #[test]
    fn withdraw_to_inventory_flag_is_carried() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::ServerStorageResult {
                result: StorageResult::WithdrawToInventory(ItemStack::new(ItemTypeId(2), 1)),
            },
        );
        assert_eq!(
            participant.take_events(),
            vec![ParticipantEvent::ItemReturned {
                item: ItemStack::new(ItemTypeId(2), 1),
                to_player_inventory: true,
            }]
        );
    }

    #[test]
    fn deposit_all_leftovers_return_to_inventory() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::ServerStorageResult {
                result: StorageResult::DepositAll(vec![
                    ItemStack::EMPTY,
                    ItemStack::new(ItemTypeId(3), 2),
                ]),
            },
        );
        let events = participant.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ParticipantEvent::ItemReturned {
                to_player_inventory: true,
                ..
            }
        ));
    }

    #[test]
    fn craft_result_yields_one_event_per_item() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::CraftResult {
                items: vec![
                    ItemStack::new(ItemTypeId(5), 6),
                    ItemStack::EMPTY,
                    ItemStack::new(ItemTypeId(6), 1),
                ],
            },
        );
        assert_eq!(
            participant.take_events(),
            vec![
                ParticipantEvent::CraftedItem(ItemStack::new(ItemTypeId(5), 6)),
                ParticipantEvent::CraftedItem(ItemStack::new(ItemTypeId(6), 1)),
            ]
        );
    }

    #[test]
    fn unit_sync_replaces_replica_state() {
        let (mut participant, id) = replica_with_unit();
        let mut authoritative = StorageUnit::new(4);
        let _ = authoritative.deposit(ItemStack::new(ItemTypeId(1), 9), 999);
        apply(
            &mut participant,
            Message::SyncStorageUnitToClient {
                id,
                blob: encode_unit(&authoritative).unwrap(),
            },
        );
        assert_eq!(
            participant.directory().unit(id).unwrap().total_of(ItemTypeId(1)),
            9
        );
        assert_eq!(
            participant.take_events(),
            vec![ParticipantEvent::UnitSynced(id)]
        );
    }

    #[test]
    fn unit_sync_for_unknown_entity_is_dropped() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::SyncStorageUnitToClient {
                id: EntityId(42),
                blob: encode_unit(&StorageUnit::new(4)).unwrap(),
            },
        );
        assert!(participant.take_events().is_empty());
    }

    #[test]
    fn gui_refresh_scoped_to_open_view() {
        let mut participant = Participant::new();
        let here = Position::new(5, 5);
        let elsewhere = Position::new(6, 6);

        // Closed view: ignored.
        apply(
            &mut participant,
            Message::ForceCraftingGUIRefresh { heart_position: here },
        );
        assert!(participant.take_events().is_empty());

        // Open on a different heart: ignored.
        participant.set_crafting_view(Some(here));
        apply(
            &mut participant,
            Message::ForceCraftingGUIRefresh {
                heart_position: elsewhere,
            },
        );
        assert!(participant.take_events().is_empty());

        // Open on the named heart: repaint.
        apply(
            &mut participant,
            Message::ForceCraftingGUIRefresh { heart_position: here },
        );
        assert_eq!(
            participant.take_events(),
            vec![ParticipantEvent::CraftViewRefresh]
        );
    }

    #[test]
    fn refresh_broadcast_surfaces_entity() {
        let mut participant = Participant::new();
        apply(
            &mut participant,
            Message::RefreshNetworkItems {
                entity: EntityId(3),
            },
        );
        assert_eq!(
            participant.take_events(),
            vec![ParticipantEvent::StorageRefresh(EntityId(3))]
        );
    }

    #[test]
    fn host_bound_messages_are_inert() {
        let (mut participant, id) = replica_with_unit();
        apply(
            &mut participant,
            Message::ClientSendDeactivate { id, inactive: true },
        );
        apply(
            &mut participant,
            Message::SearchAndRefreshNetwork {
                origin: Position::new(0, 0),
            },
        );
        // The replica is untouched.
        assert!(!participant.directory().unit(id).unwrap().inactive);
        assert!(participant.take_events().is_empty());
    }

    #[test]
    fn push_unit_update_round_trips_replica_state() {
        let (mut participant, id) = replica_with_unit();
        let _ = participant
            .directory_mut()
            .unit_mut(id)
            .unwrap()
            .deposit(ItemStack::new(ItemTypeId(8), 4), 999);

        let packet = participant.push_unit_update(id).unwrap();
        match Message::decode(&packet).unwrap() {
            Message::ClientSendEntityUpdate { id: got, blob } => {
                assert_eq!(got, id);
                assert_eq!(decode_unit(&blob).unwrap().total_of(ItemTypeId(8)), 4);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn push_unit_update_for_unknown_unit_fails() {
        let participant = Participant::new();
        assert!(matches!(
            participant.push_unit_update(EntityId(9)),
            Err(WireError::EntityEncode(_))
        ));
    }
}
