//! Stockpile Core -- content registry and storage model for the shared
//! storage network.
//!
//! This crate provides everything the protocol layer arbitrates over:
//!
//! - [`registry::Registry`] -- Immutable catalog of groups, tiles, items,
//!   and recipes (frozen at content load).
//! - [`cache::IndexCache`] -- Derived lookup structures over the recipe
//!   catalog (by result, by ingredient slot, by tile, by filter category,
//!   by owning group, by item usage). Rebuilt wholesale on every content
//!   (re)load, never patched in place.
//! - [`item::ItemStack`] -- The shared item record carried on the wire.
//! - [`storage::EntityDirectory`] -- Storage hearts, units, and crafting
//!   stations keyed by id and by position, with the aggregate inventory
//!   primitives (`try_deposit` / `try_withdraw` / `has_item`).
//!
//! The authoritative host in `stockpile-net` consumes these types; nothing
//! here depends on the protocol.

pub mod cache;
#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod filter;
pub mod id;
pub mod item;
pub mod registry;
pub mod storage;
