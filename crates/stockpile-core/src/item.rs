use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};

/// A stack of items as carried on the wire and held in storage slots.
///
/// `extra` is an opaque per-stack blob (modded data, prefixes, etc.).
/// It is round-tripped bit-exact and participates in merge compatibility:
/// stacks with different blobs never merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    pub stack: u32,
    pub favorite: bool,
    #[serde(default)]
    pub extra: Vec<u8>,
}

impl ItemStack {
    /// The placeholder stack: what an empty slot or fully-consumed result
    /// decodes to.
    pub const EMPTY: ItemStack = ItemStack {
        item_type: ItemTypeId::PLACEHOLDER,
        stack: 0,
        favorite: false,
        extra: Vec::new(),
    };

    pub fn new(item_type: ItemTypeId, stack: u32) -> Self {
        Self {
            item_type,
            stack,
            favorite: false,
            extra: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack == 0 || self.item_type.is_placeholder()
    }

    /// Whether `other` can merge into this stack. Type, favorite flag, and
    /// extra blob must all match.
    pub fn can_merge(&self, other: &ItemStack) -> bool {
        self.item_type == other.item_type
            && self.favorite == other.favorite
            && self.extra == other.extra
    }

    /// A copy of this stack with a different count.
    pub fn with_stack(&self, stack: u32) -> ItemStack {
        ItemStack {
            stack,
            ..self.clone()
        }
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self::EMPTY
    }
}
