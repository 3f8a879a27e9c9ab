//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::authority::Authority;
use crate::delivery::DeliveryConfig;
use crate::fixed::{Fixed64, Seconds};
use crate::id::{EntityId, ItemId, ParticipantId};
use crate::intent::Intent;
use crate::registry::{Catalog, CatalogBuilder};
use crate::station::StationConfig;
use crate::storage::StorageConfig;
use std::sync::Arc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn secs(v: f64) -> Seconds {
    Fixed64::from_num(v)
}

// ===========================================================================
// Catalog
// ===========================================================================

/// acid + base -> salt in 2 s; salt + water -> brine x2 in 1 s.
pub fn lab_catalog() -> Arc<Catalog> {
    let mut b = CatalogBuilder::new();
    let acid = b.register_item("acid", "Hydrochloric Acid");
    let base = b.register_item("base", "Sodium Hydroxide");
    let salt = b.register_item("salt", "Table Salt");
    let water = b.register_item("water", "Water");
    let brine = b.register_item("brine", "Brine");
    b.register_recipe("neutralize", vec![acid, base], salt, 1, secs(2.0));
    b.register_recipe("dissolve", vec![salt, water], brine, 2, secs(1.0));
    match b.build() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => panic!("lab catalog is invalid: {e}"),
    }
}

// ===========================================================================
// Lab fixture
// ===========================================================================

/// A small session: one station (3 s grace period), one shelf stocked with
/// `[acid, base, acid, base, water]`, one delivery counter taking salt and
/// brine, and participants 1 and 2. Setup events are already flushed.
pub struct Lab {
    pub authority: Authority,
    pub station: EntityId,
    pub shelf: EntityId,
    pub counter: EntityId,
    pub acid: ItemId,
    pub base: ItemId,
    pub salt: ItemId,
    pub water: ItemId,
    pub brine: ItemId,
    /// State hash right after setup.
    pub fresh_hash: u64,
}

pub fn lab() -> Lab {
    let catalog = lab_catalog();
    let id = |name: &str| catalog.item_id(name).unwrap_or(ItemId::EMPTY);
    let (acid, base, salt, water, brine) =
        (id("acid"), id("base"), id("salt"), id("water"), id("brine"));
    let recipes = catalog.recipes().map(|(recipe, _)| recipe).collect();

    let mut authority = Authority::new(catalog.clone());
    let station = authority.add_station(StationConfig {
        recipes,
        completion_grace_period: Some(secs(3.0)),
        ..StationConfig::default()
    });
    let shelf = authority.add_storage(StorageConfig {
        infinite_supply: false,
        initial_contents: vec![acid, base, acid, base, water],
    });
    let counter = authority.add_delivery(DeliveryConfig {
        accepted: vec![salt, brine],
    });
    authority.add_participant(ParticipantId(1));
    authority.add_participant(ParticipantId(2));
    authority.flush();
    let fresh_hash = authority.state_hash();

    Lab {
        authority,
        station,
        shelf,
        counter,
        acid,
        base,
        salt,
        water,
        brine,
        fresh_hash,
    }
}

impl Lab {
    /// Carry acid and base (shelf slots 0 and 1) into the station, which
    /// auto-starts the neutralize recipe. Panics if any step is rejected.
    pub fn fill_station(&mut self, who: ParticipantId) {
        for index in 0..2 {
            let steps = [
                Intent::TakeFromSlot {
                    entity: self.shelf,
                    index,
                },
                Intent::DepositHeld {
                    entity: self.station,
                },
            ];
            for intent in &steps {
                if let Err(e) = self.authority.apply(who, intent) {
                    panic!("fill_station: {intent:?} rejected: {e}");
                }
            }
        }
    }
}
