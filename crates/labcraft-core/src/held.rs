use crate::id::ItemId;
use serde::{Deserialize, Serialize};

/// A participant's single-item hand.
///
/// There is no swap primitive: anything swap-like is composed by the
/// authority from `clear`/`set` pairs inside a single intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldItem {
    item: ItemId,
}

impl HeldItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_holding(&self) -> bool {
        !self.item.is_empty()
    }

    pub fn get(&self) -> ItemId {
        self.item
    }

    /// Overwrite unconditionally. Check [`is_holding`](Self::is_holding)
    /// first or the current item is lost.
    pub fn set(&mut self, item: ItemId) {
        self.item = item;
    }

    /// Empty the hand, returning what it held.
    pub fn clear(&mut self) -> ItemId {
        std::mem::take(&mut self.item)
    }
}
