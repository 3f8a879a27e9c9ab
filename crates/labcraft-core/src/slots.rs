//! Fixed-capacity slot inventories shared by stations and storage containers.
//!
//! A slot holds at most one item id; [`ItemId::EMPTY`] marks a free slot.
//! Reads fail closed: an out-of-range index reads as empty rather than
//! erroring. Writes report whether anything changed so the owner can emit
//! exactly one change event per modified slot.

use crate::id::ItemId;
use serde::{Deserialize, Serialize};

/// Number of input (and output) slots on a production station.
pub const STATION_SLOT_COUNT: usize = 5;

/// Number of slots on a storage container (3x3 rack).
pub const STORAGE_SLOT_COUNT: usize = 9;

/// An ordered, fixed-length array of item ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInventory {
    slots: Vec<ItemId>,
}

impl SlotInventory {
    /// Create an inventory of `count` empty slots.
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![ItemId::EMPTY; count],
        }
    }

    /// Build an inventory from existing contents (e.g. replicated data).
    /// Callers that need a specific size follow up with [`ensure_count`](Self::ensure_count).
    pub fn from_slots(slots: Vec<ItemId>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Item in the given slot, or [`ItemId::EMPTY`] when out of range.
    pub fn get(&self, index: usize) -> ItemId {
        self.slots.get(index).copied().unwrap_or(ItemId::EMPTY)
    }

    /// Overwrite a slot. Returns `true` when the stored value changed;
    /// out-of-range writes are ignored and return `false`.
    pub fn set(&mut self, index: usize, item: ItemId) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if *slot != item => {
                *slot = item;
                true
            }
            _ => false,
        }
    }

    pub fn has_empty_slot(&self) -> bool {
        self.first_empty_slot().is_some()
    }

    pub fn first_empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_empty())
    }

    /// First slot that holds an item.
    pub fn first_occupied_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.is_empty())
    }

    /// Whether every slot is empty.
    pub fn is_clear(&self) -> bool {
        self.slots.iter().all(|s| s.is_empty())
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Pad with empty slots or truncate so exactly `count` slots exist.
    pub fn ensure_count(&mut self, count: usize) {
        self.slots.resize(count, ItemId::EMPTY);
    }

    /// Empty every slot. Returns the indices that changed, in order.
    pub fn clear(&mut self) -> Vec<usize> {
        let mut changed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_empty() {
                *slot = ItemId::EMPTY;
                changed.push(index);
            }
        }
        changed
    }

    /// Seed the inventory with initial contents, but only when it is
    /// currently clear. Returns the indices that changed.
    pub fn seed_if_clear(&mut self, contents: &[ItemId]) -> Vec<usize> {
        if !self.is_clear() {
            return Vec::new();
        }
        let mut changed = Vec::new();
        for (index, &item) in contents.iter().enumerate().take(self.slots.len()) {
            if self.set(index, item) {
                changed.push(index);
            }
        }
        changed
    }

    /// Read-only view of every slot.
    pub fn as_slice(&self) -> &[ItemId] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.slots.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flask() -> ItemId {
        ItemId(1)
    }
    fn salt() -> ItemId {
        ItemId(2)
    }

    #[test]
    fn new_inventory_is_all_empty() {
        let inv = SlotInventory::new(STATION_SLOT_COUNT);
        assert_eq!(inv.len(), 5);
        assert!(inv.is_clear());
        assert_eq!(inv.first_empty_slot(), Some(0));
    }

    #[test]
    fn get_out_of_range_fails_closed() {
        let mut inv = SlotInventory::new(3);
        inv.set(2, flask());
        assert_eq!(inv.get(2), flask());
        assert_eq!(inv.get(3), ItemId::EMPTY);
        assert_eq!(inv.get(usize::MAX), ItemId::EMPTY);
    }

    #[test]
    fn set_reports_change() {
        let mut inv = SlotInventory::new(3);
        assert!(inv.set(0, flask()));
        assert!(!inv.set(0, flask()));
        assert!(!inv.set(7, salt()));
        assert_eq!(inv.occupied(), 1);
    }

    #[test]
    fn first_empty_skips_occupied() {
        let mut inv = SlotInventory::new(3);
        inv.set(0, flask());
        inv.set(1, salt());
        assert_eq!(inv.first_empty_slot(), Some(2));
        inv.set(2, salt());
        assert!(!inv.has_empty_slot());
        assert_eq!(inv.first_empty_slot(), None);
    }

    #[test]
    fn ensure_count_pads_and_truncates() {
        let mut inv = SlotInventory::from_slots(vec![flask(), salt()]);
        inv.ensure_count(STORAGE_SLOT_COUNT);
        assert_eq!(inv.len(), 9);
        assert_eq!(inv.get(1), salt());
        assert_eq!(inv.get(8), ItemId::EMPTY);

        inv.ensure_count(1);
        assert_eq!(inv.as_slice(), &[flask()]);
    }

    #[test]
    fn clear_returns_changed_indices() {
        let mut inv = SlotInventory::new(5);
        inv.set(1, flask());
        inv.set(4, salt());
        assert_eq!(inv.clear(), vec![1, 4]);
        assert!(inv.is_clear());
        assert!(inv.clear().is_empty());
    }

    #[test]
    fn seed_only_applies_to_clear_inventory() {
        let mut inv = SlotInventory::new(3);
        assert_eq!(inv.seed_if_clear(&[flask(), ItemId::EMPTY, salt(), flask()]), vec![0, 2]);
        assert_eq!(inv.as_slice(), &[flask(), ItemId::EMPTY, salt()]);

        // Already has contents: untouched.
        assert!(inv.seed_if_clear(&[salt(), salt(), salt()]).is_empty());
        assert_eq!(inv.get(0), flask());
    }
}
