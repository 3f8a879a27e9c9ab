use crate::event::{ChangeSet, InventoryKind};
use crate::id::ItemId;
use crate::intent::Rejection;
use crate::slots::{STORAGE_SLOT_COUNT, SlotInventory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Taking from a slot leaves the item in place.
    pub infinite_supply: bool,
    pub initial_contents: Vec<ItemId>,
}

/// A shelf of slots participants take from and deposit into. No state machine.
#[derive(Debug, Clone)]
pub struct StorageContainer {
    config: StorageConfig,
    slots: SlotInventory,
}

impl StorageContainer {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            slots: SlotInventory::new(STORAGE_SLOT_COUNT),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn slots(&self) -> &SlotInventory {
        &self.slots
    }

    pub fn is_infinite(&self) -> bool {
        self.config.infinite_supply
    }

    /// Size the slots and seed initial contents if empty.
    pub fn activate(&mut self, changes: &mut ChangeSet) {
        self.slots.ensure_count(STORAGE_SLOT_COUNT);
        for index in self.slots.seed_if_clear(&self.config.initial_contents) {
            changes.slot(InventoryKind::Storage, index, self.slots.get(index));
        }
    }

    pub fn reset(&mut self, changes: &mut ChangeSet) {
        for index in self.slots.clear() {
            changes.slot(InventoryKind::Storage, index, ItemId::EMPTY);
        }
        self.activate(changes);
    }

    pub fn take_from_slot(
        &mut self,
        index: usize,
        changes: &mut ChangeSet,
    ) -> Result<ItemId, Rejection> {
        if index >= self.slots.len() {
            return Err(Rejection::SlotOutOfRange(index));
        }
        let item = self.slots.get(index);
        if item.is_empty() {
            return Err(Rejection::SlotEmpty(index));
        }
        if !self.config.infinite_supply && self.slots.set(index, ItemId::EMPTY) {
            changes.slot(InventoryKind::Storage, index, ItemId::EMPTY);
        }
        Ok(item)
    }

    pub fn deposit(&mut self, item: ItemId, changes: &mut ChangeSet) -> Result<(), Rejection> {
        if self.config.infinite_supply {
            return Err(Rejection::InfiniteSupply);
        }
        let index = self.slots.first_empty_slot().ok_or(Rejection::NoEmptySlot)?;
        if self.slots.set(index, item) {
            changes.slot(InventoryKind::Storage, index, item);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntityId;

    const FLASK: ItemId = ItemId(1);
    const SALT: ItemId = ItemId(2);

    fn changes() -> ChangeSet {
        ChangeSet::new(EntityId::default())
    }

    #[test]
    fn deposit_fills_first_empty_slot() {
        let mut shelf = StorageContainer::new(StorageConfig::default());
        let mut cs = changes();
        shelf.deposit(FLASK, &mut cs).unwrap();
        shelf.deposit(SALT, &mut cs).unwrap();
        shelf.take_from_slot(0, &mut cs).unwrap();
        shelf.deposit(SALT, &mut cs).unwrap();
        assert_eq!(shelf.slots().get(0), SALT);
        assert_eq!(shelf.slots().get(1), SALT);
        assert_eq!(cs.events().len(), 4);
    }

    #[test]
    fn take_empties_the_slot() {
        let mut shelf = StorageContainer::new(StorageConfig {
            initial_contents: vec![FLASK],
            ..StorageConfig::default()
        });
        let mut cs = changes();
        shelf.activate(&mut cs);
        assert_eq!(shelf.take_from_slot(0, &mut cs), Ok(FLASK));
        assert_eq!(shelf.take_from_slot(0, &mut cs), Err(Rejection::SlotEmpty(0)));
        assert_eq!(
            shelf.take_from_slot(STORAGE_SLOT_COUNT, &mut cs),
            Err(Rejection::SlotOutOfRange(STORAGE_SLOT_COUNT))
        );
    }

    #[test]
    fn infinite_supply_never_empties() {
        let mut shelf = StorageContainer::new(StorageConfig {
            infinite_supply: true,
            initial_contents: vec![FLASK],
        });
        let mut cs = changes();
        shelf.activate(&mut cs);

        let mut cs = changes();
        for _ in 0..3 {
            assert_eq!(shelf.take_from_slot(0, &mut cs), Ok(FLASK));
        }
        assert!(cs.is_empty());
        assert_eq!(shelf.deposit(SALT, &mut cs), Err(Rejection::InfiniteSupply));
    }

    #[test]
    fn full_shelf_rejects_deposit() {
        let mut shelf = StorageContainer::new(StorageConfig::default());
        let mut cs = changes();
        for _ in 0..STORAGE_SLOT_COUNT {
            shelf.deposit(SALT, &mut cs).unwrap();
        }
        assert_eq!(shelf.deposit(SALT, &mut cs), Err(Rejection::NoEmptySlot));
    }

    #[test]
    fn reset_restores_initial_contents() {
        let mut shelf = StorageContainer::new(StorageConfig {
            initial_contents: vec![FLASK, SALT],
            ..StorageConfig::default()
        });
        let mut cs = changes();
        shelf.activate(&mut cs);
        shelf.take_from_slot(0, &mut cs).unwrap();
        shelf.deposit(SALT, &mut cs).unwrap();
        shelf.deposit(SALT, &mut cs).unwrap();

        shelf.reset(&mut cs);
        assert_eq!(&shelf.slots().as_slice()[..3], &[FLASK, SALT, ItemId::EMPTY]);
    }
}
