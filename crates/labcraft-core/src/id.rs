use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a station, storage container or delivery point in the
    /// authority's entity registry.
    pub struct EntityId;
}

/// Identifies an item type in the catalog. `ItemId(0)` is the empty sentinel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ItemId(pub u16);

impl ItemId {
    /// The "nothing here" value stored in empty slots and empty hands.
    pub const EMPTY: ItemId = ItemId(0);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

/// Identifies a recipe in the catalog. Ordered by definition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// A connected player, as identified by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);
