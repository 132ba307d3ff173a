//! The closed message set of the storage network protocol.
//!
//! Each message is tagged with a stable one-byte opcode (the ordinals are
//! part of the wire contract and must not be reordered). Decoding is
//! exhaustive: an opcode outside the known set is a fatal
//! [`WireError::UnknownOpcode`], and every variant's payload is fully
//! materialized before dispatch, so an inert receiver can never leave a
//! partially-consumed payload behind.

use crate::wire::{WireError, WireReader, WireWriter};
use stockpile_core::id::{EntityId, Position};
use stockpile_core::item::ItemStack;

// ---------------------------------------------------------------------------
// Operation payloads
// ---------------------------------------------------------------------------

/// A participant-requested storage operation against a heart.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOp {
    Deposit(ItemStack),
    Withdraw { keep_favorite: bool, item: ItemStack },
    WithdrawToInventory { keep_favorite: bool, item: ItemStack },
    /// Each entry is processed independently; u8 count prefix on the wire.
    DepositAll(Vec<ItemStack>),
}

impl StorageOp {
    fn discriminant(&self) -> u8 {
        match self {
            Self::Deposit(_) => 0,
            Self::Withdraw { .. } => 1,
            Self::WithdrawToInventory { .. } => 2,
            Self::DepositAll(_) => 3,
        }
    }
}

/// The host's reply to a [`StorageOp`]: leftover for deposits, the
/// actually-available stack for withdrawals.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageResult {
    Deposit(ItemStack),
    Withdraw(ItemStack),
    WithdrawToInventory(ItemStack),
    DepositAll(Vec<ItemStack>),
}

impl StorageResult {
    fn discriminant(&self) -> u8 {
        match self {
            Self::Deposit(_) => 0,
            Self::Withdraw(_) => 1,
            Self::WithdrawToInventory(_) => 2,
            Self::DepositAll(_) => 3,
        }
    }
}

/// A single-slot operation against a crafting station.
#[derive(Debug, Clone, PartialEq)]
pub enum StationOp {
    Deposit(ItemStack),
    Withdraw { slot: u8 },
    WithdrawToInventory { slot: u8 },
}

impl StationOp {
    fn discriminant(&self) -> u8 {
        match self {
            Self::Deposit(_) => 0,
            Self::Withdraw { .. } => 1,
            Self::WithdrawToInventory { .. } => 2,
        }
    }
}

/// The host's reply to a [`StationOp`].
#[derive(Debug, Clone, PartialEq)]
pub enum StationResult {
    Deposit(ItemStack),
    Withdraw(ItemStack),
    WithdrawToInventory(ItemStack),
}

impl StationResult {
    fn discriminant(&self) -> u8 {
        match self {
            Self::Deposit(_) => 0,
            Self::Withdraw(_) => 1,
            Self::WithdrawToInventory(_) => 2,
        }
    }

    pub fn item(&self) -> &ItemStack {
        match self {
            Self::Deposit(item) | Self::Withdraw(item) | Self::WithdrawToInventory(item) => item,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One protocol message. Constructed, serialized, sent, and consumed
/// exactly once; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// 0 -- participant asks the host to recompute reachable storage from
    /// a spatial origin.
    SearchAndRefreshNetwork { origin: Position },
    /// 1 -- storage operation request, arbitrated by the host.
    ClientStorageOperation { target: EntityId, op: StorageOp },
    /// 2 -- unicast reply to the requester of a storage operation.
    ServerStorageResult { result: StorageResult },
    /// 3 -- broadcast telling participants to invalidate cached views of
    /// the named heart's combined inventory.
    RefreshNetworkItems { entity: EntityId },
    /// 4 -- participant pushes a full storage-unit state to the host.
    ClientSendEntityUpdate { id: EntityId, blob: Vec<u8> },
    /// 5 -- participant toggles a unit's inactive flag.
    ClientSendDeactivate { id: EntityId, inactive: bool },
    /// 6 -- station operation request.
    ClientStationOperation { target: EntityId, op: StationOp },
    /// 7 -- unicast reply to the requester of a station operation.
    ServerStationResult { result: StationResult },
    /// 8 -- restart the heart's compaction cycle.
    ResetCompactStage { entity: EntityId },
    /// 9 -- multi-item crafting transaction request.
    CraftRequest {
        heart: EntityId,
        to_withdraw: Vec<ItemStack>,
        expected_results: Vec<ItemStack>,
    },
    /// 10 -- items actually produced by a craft; sent only when non-empty.
    CraftResult { items: Vec<ItemStack> },
    /// 11 -- participant asks the host to deliver world data around coords.
    SectionRequest { coords: Position },
    /// 12 -- authoritative storage-unit state pushed to a participant.
    SyncStorageUnitToClient { id: EntityId, blob: Vec<u8> },
    /// 13 -- participant asks the host for the unit at a position.
    SyncStorageUnit { position: Position },
    /// 14 -- relay: refresh any crafting view open on the same heart.
    ForceCraftingGUIRefresh { heart_position: Position },
}

impl Message {
    /// The stable wire opcode of this variant.
    pub fn opcode(&self) -> u8 {
        match self {
            Self::SearchAndRefreshNetwork { .. } => 0,
            Self::ClientStorageOperation { .. } => 1,
            Self::ServerStorageResult { .. } => 2,
            Self::RefreshNetworkItems { .. } => 3,
            Self::ClientSendEntityUpdate { .. } => 4,
            Self::ClientSendDeactivate { .. } => 5,
            Self::ClientStationOperation { .. } => 6,
            Self::ServerStationResult { .. } => 7,
            Self::ResetCompactStage { .. } => 8,
            Self::CraftRequest { .. } => 9,
            Self::CraftResult { .. } => 10,
            Self::SectionRequest { .. } => 11,
            Self::SyncStorageUnitToClient { .. } => 12,
            Self::SyncStorageUnit { .. } => 13,
            Self::ForceCraftingGUIRefresh { .. } => 14,
        }
    }

    /// Encode this message into a transport packet.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = WireWriter::new();
        w.write_u8(self.opcode());
        match self {
            Self::SearchAndRefreshNetwork { origin } => write_position(&mut w, *origin),
            Self::ClientStorageOperation { target, op } => {
                w.write_u32(target.0);
                w.write_u8(op.discriminant());
                match op {
                    StorageOp::Deposit(item) => w.write_item(item)?,
                    StorageOp::Withdraw { keep_favorite, item }
                    | StorageOp::WithdrawToInventory { keep_favorite, item } => {
                        w.write_bool(*keep_favorite);
                        w.write_item(item)?;
                    }
                    StorageOp::DepositAll(items) => write_item_batch(&mut w, items)?,
                }
            }
            Self::ServerStorageResult { result } => {
                w.write_u8(result.discriminant());
                match result {
                    StorageResult::Deposit(item)
                    | StorageResult::Withdraw(item)
                    | StorageResult::WithdrawToInventory(item) => w.write_item(item)?,
                    StorageResult::DepositAll(items) => write_item_batch(&mut w, items)?,
                }
            }
            Self::RefreshNetworkItems { entity } => w.write_u32(entity.0),
            Self::ClientSendEntityUpdate { id, blob } => {
                w.write_u32(id.0);
                w.write_blob(blob)?;
            }
            Self::ClientSendDeactivate { id, inactive } => {
                w.write_u32(id.0);
                w.write_bool(*inactive);
            }
            Self::ClientStationOperation { target, op } => {
                w.write_u32(target.0);
                w.write_u8(op.discriminant());
                match op {
                    StationOp::Deposit(item) => w.write_item(item)?,
                    StationOp::Withdraw { slot } | StationOp::WithdrawToInventory { slot } => {
                        w.write_u8(*slot)
                    }
                }
            }
            Self::ServerStationResult { result } => {
                w.write_u8(result.discriminant());
                w.write_item(result.item())?;
            }
            Self::ResetCompactStage { entity } => w.write_u32(entity.0),
            Self::CraftRequest {
                heart,
                to_withdraw,
                expected_results,
            } => {
                w.write_u32(heart.0);
                write_item_list(&mut w, to_withdraw)?;
                write_item_list(&mut w, expected_results)?;
            }
            Self::CraftResult { items } => write_item_list(&mut w, items)?,
            Self::SectionRequest { coords } => write_position(&mut w, *coords),
            Self::SyncStorageUnitToClient { id, blob } => {
                w.write_u32(id.0);
                w.write_blob(blob)?;
            }
            Self::SyncStorageUnit { position } => write_position(&mut w, *position),
            Self::ForceCraftingGUIRefresh { heart_position } => {
                write_position(&mut w, *heart_position)
            }
        }
        Ok(w.finish())
    }

    /// Decode one packet. The opcode dispatch is exhaustive over the closed
    /// set; anything else is a fatal protocol error. The whole payload must
    /// be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Message, WireError> {
        let mut r = WireReader::new(bytes);
        let opcode = r.read_u8()?;
        let message = match opcode {
            0 => Message::SearchAndRefreshNetwork {
                origin: read_position(&mut r)?,
            },
            1 => {
                let target = EntityId(r.read_u32()?);
                let op = match r.read_u8()? {
                    0 => StorageOp::Deposit(r.read_item()?),
                    1 => StorageOp::Withdraw {
                        keep_favorite: r.read_bool()?,
                        item: r.read_item()?,
                    },
                    2 => StorageOp::WithdrawToInventory {
                        keep_favorite: r.read_bool()?,
                        item: r.read_item()?,
                    },
                    3 => StorageOp::DepositAll(read_item_batch(&mut r)?),
                    other => return Err(WireError::UnknownOperation(other)),
                };
                Message::ClientStorageOperation { target, op }
            }
            2 => {
                let result = match r.read_u8()? {
                    0 => StorageResult::Deposit(r.read_item()?),
                    1 => StorageResult::Withdraw(r.read_item()?),
                    2 => StorageResult::WithdrawToInventory(r.read_item()?),
                    3 => StorageResult::DepositAll(read_item_batch(&mut r)?),
                    other => return Err(WireError::UnknownOperation(other)),
                };
                Message::ServerStorageResult { result }
            }
            3 => Message::RefreshNetworkItems {
                entity: EntityId(r.read_u32()?),
            },
            4 => Message::ClientSendEntityUpdate {
                id: EntityId(r.read_u32()?),
                blob: r.read_blob()?,
            },
            5 => Message::ClientSendDeactivate {
                id: EntityId(r.read_u32()?),
                inactive: r.read_bool()?,
            },
            6 => {
                let target = EntityId(r.read_u32()?);
                let op = match r.read_u8()? {
                    0 => StationOp::Deposit(r.read_item()?),
                    1 => StationOp::Withdraw { slot: r.read_u8()? },
                    2 => StationOp::WithdrawToInventory { slot: r.read_u8()? },
                    other => return Err(WireError::UnknownOperation(other)),
                };
                Message::ClientStationOperation { target, op }
            }
            7 => {
                let discriminant = r.read_u8()?;
                let item = r.read_item()?;
                let result = match discriminant {
                    0 => StationResult::Deposit(item),
                    1 => StationResult::Withdraw(item),
                    2 => StationResult::WithdrawToInventory(item),
                    other => return Err(WireError::UnknownOperation(other)),
                };
                Message::ServerStationResult { result }
            }
            8 => Message::ResetCompactStage {
                entity: EntityId(r.read_u32()?),
            },
            9 => {
                let heart = EntityId(r.read_u32()?);
                let to_withdraw = read_item_list(&mut r)?;
                let expected_results = read_item_list(&mut r)?;
                Message::CraftRequest {
                    heart,
                    to_withdraw,
                    expected_results,
                }
            }
            10 => Message::CraftResult {
                items: read_item_list(&mut r)?,
            },
            11 => Message::SectionRequest {
                coords: read_position(&mut r)?,
            },
            12 => Message::SyncStorageUnitToClient {
                id: EntityId(r.read_u32()?),
                blob: r.read_blob()?,
            },
            13 => Message::SyncStorageUnit {
                position: read_position(&mut r)?,
            },
            14 => Message::ForceCraftingGUIRefresh {
                heart_position: read_position(&mut r)?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        };
        r.finish()?;
        Ok(message)
    }
}

fn write_position(w: &mut WireWriter, position: Position) {
    w.write_i16(position.x);
    w.write_i16(position.y);
}

fn read_position(r: &mut WireReader<'_>) -> Result<Position, WireError> {
    Ok(Position {
        x: r.read_i16()?,
        y: r.read_i16()?,
    })
}

/// u8-count-prefixed item batch (DepositAll lists).
fn write_item_batch(w: &mut WireWriter, items: &[ItemStack]) -> Result<(), WireError> {
    if items.len() > crate::wire::MAX_BATCH_LEN {
        return Err(WireError::BatchTooLarge(items.len()));
    }
    w.write_u8(items.len() as u8);
    for item in items {
        w.write_item(item)?;
    }
    Ok(())
}

fn read_item_batch(r: &mut WireReader<'_>) -> Result<Vec<ItemStack>, WireError> {
    let count = r.read_u8()? as usize;
    let mut items = Vec::new();
    for _ in 0..count {
        items.push(r.read_item()?);
    }
    Ok(items)
}

/// u32-count-prefixed item list (craft ingredient/result lists).
fn write_item_list(w: &mut WireWriter, items: &[ItemStack]) -> Result<(), WireError> {
    w.write_u32(items.len() as u32);
    for item in items {
        w.write_item(item)?;
    }
    Ok(())
}

fn read_item_list(r: &mut WireReader<'_>) -> Result<Vec<ItemStack>, WireError> {
    let count = r.read_u32()? as usize;
    let mut items = Vec::new();
    for _ in 0..count {
        items.push(r.read_item()?);
    }
    Ok(items)
}

// ===========================================================================
// Tests
// ===========================================================================
