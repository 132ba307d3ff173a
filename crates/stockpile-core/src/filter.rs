use crate::registry::ItemTypeDef;
use serde::{Deserialize, Serialize};

/// A named predicate over result items, used to partition the recipe
/// catalog for lookup and search.
///
/// `Recent` is history-based (per participant, per session) and therefore
/// the one category the index cache never precomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterCategory {
    All,
    Weapons,
    Tools,
    Armor,
    Consumables,
    Placeables,
    Misc,
    Recent,
}

impl FilterCategory {
    /// Every category, in stable display order.
    pub fn all() -> &'static [FilterCategory] {
        &[
            Self::All,
            Self::Weapons,
            Self::Tools,
            Self::Armor,
            Self::Consumables,
            Self::Placeables,
            Self::Misc,
            Self::Recent,
        ]
    }

    /// The categories the index cache precomputes: everything except the
    /// history-based one.
    pub fn precomputed() -> impl Iterator<Item = FilterCategory> {
        Self::all()
            .iter()
            .copied()
            .filter(|c| !matches!(c, Self::Recent))
    }

    /// Evaluate this category's predicate against an item definition.
    pub fn matches(self, item: &ItemTypeDef) -> bool {
        match self {
            Self::All => true,
            Self::Weapons => item.damage > 0 && item.tool_power == 0,
            Self::Tools => item.tool_power > 0,
            Self::Armor => item.defense > 0,
            Self::Consumables => item.consumable,
            Self::Placeables => item.placeable.is_some(),
            Self::Misc => {
                item.damage == 0
                    && item.tool_power == 0
                    && item.defense == 0
                    && !item.consumable
                    && item.placeable.is_none()
            }
            // Membership depends on per-session craft history, not on the
            // item definition.
            Self::Recent => false,
        }
    }
}
