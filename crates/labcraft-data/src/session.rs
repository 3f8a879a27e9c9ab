//! Session building: resolve a [`SessionData`] into a live [`Authority`].
//!
//! Resolution order matters. Items come first so recipes and entities can
//! refer to them, then recipes, then the catalog is frozen and entities are
//! placed in declaration order (stations, storage, deliveries).

use crate::loader::{
    DataLoadError, check_duplicate, deserialize_file, require_data_file, resolve_name,
};
use crate::schema::{DeliveryData, SessionData, StationData, StorageData};
use labcraft_core::authority::Authority;
use labcraft_core::delivery::DeliveryConfig;
use labcraft_core::fixed::{Fixed64, Seconds};
use labcraft_core::goal::GoalConfig;
use labcraft_core::id::{EntityId, ItemId, RecipeId};
use labcraft_core::registry::{Catalog, CatalogBuilder};
use labcraft_core::slots::{STATION_SLOT_COUNT, STORAGE_SLOT_COUNT};
use labcraft_core::station::StationConfig;
use labcraft_core::storage::StorageConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the session file inside a session directory.
pub const SESSION_FILE: &str = "session";

/// A loaded session: the authority plus the name tables needed to address
/// its entities from scripts and tooling.
#[derive(Debug)]
pub struct Session {
    pub authority: Authority,
    pub tick_rate: u32,
    pub source: PathBuf,
    entities: HashMap<String, EntityId>,
}

impl Session {
    /// Look up an entity by the name it was declared with.
    pub fn entity(&self, name: &str) -> Option<EntityId> {
        self.entities.get(name).copied()
    }

    /// Reverse lookup, for log output.
    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.entities
            .iter()
            .find(|(_, e)| **e == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Length of one authority step.
    pub fn step_duration(&self) -> Seconds {
        Fixed64::ONE / Fixed64::from_num(self.tick_rate)
    }
}

/// Find the session file in `dir`, read it and build the session.
pub fn load_session(dir: &Path) -> Result<Session, DataLoadError> {
    let file = require_data_file(dir, SESSION_FILE)?;
    let data: SessionData = deserialize_file(&file)?;
    build_session(data, &file)
}

/// Resolve names and build an authority. `file` is used for error reports.
///
/// Setup events (initial slot contents) are flushed, so the returned
/// authority has nothing pending and its first snapshot is the baseline.
pub fn build_session(data: SessionData, file: &Path) -> Result<Session, DataLoadError> {
    if data.simulation.tick_rate == 0 {
        return Err(invalid(file, "simulation", "tick_rate", "must be at least 1"));
    }

    let catalog = Arc::new(build_catalog(&data, file)?);
    let mut authority =
        Authority::new(Arc::clone(&catalog)).with_intent_history(data.simulation.intent_history);
    let mut entities: HashMap<String, EntityId> = HashMap::new();

    for station in &data.stations {
        check_duplicate(&entities, &station.name, file)?;
        let config = station_config(station, &catalog, file)?;
        entities.insert(station.name.clone(), authority.add_station(config));
    }
    for storage in &data.storage {
        check_duplicate(&entities, &storage.name, file)?;
        let config = storage_config(storage, &catalog, file)?;
        entities.insert(storage.name.clone(), authority.add_storage(config));
    }
    for delivery in &data.deliveries {
        check_duplicate(&entities, &delivery.name, file)?;
        let config = delivery_config(delivery, &catalog, file)?;
        entities.insert(delivery.name.clone(), authority.add_delivery(config));
    }
    if let Some(goal) = &data.goal {
        let time_limit = goal
            .time_limit
            .map(|limit| seconds(limit, "goal", "time_limit", file))
            .transpose()?;
        authority.set_goal(GoalConfig {
            target: goal.target,
            time_limit,
        });
    }
    authority.flush();

    info!(
        file = %file.display(),
        items = catalog.item_count(),
        recipes = catalog.recipe_count(),
        entities = entities.len(),
        "session loaded"
    );

    Ok(Session {
        authority,
        tick_rate: data.simulation.tick_rate,
        source: file.to_path_buf(),
        entities,
    })
}

// ===========================================================================
// Catalog
// ===========================================================================

fn build_catalog(data: &SessionData, file: &Path) -> Result<Catalog, DataLoadError> {
    let mut builder = CatalogBuilder::new();
    let mut items: HashMap<String, ItemId> = HashMap::new();
    for item in &data.items {
        check_duplicate(&items, &item.name, file)?;
        items.insert(item.name.clone(), builder.register_item(&item.name, &item.display_name));
    }

    let mut recipes: HashMap<String, RecipeId> = HashMap::new();
    for recipe in &data.recipes {
        check_duplicate(&recipes, &recipe.name, file)?;
        let ingredients = recipe
            .ingredients
            .iter()
            .map(|name| resolve_name(&items, name, file, "item").copied())
            .collect::<Result<Vec<_>, _>>()?;
        let output = *resolve_name(&items, &recipe.output, file, "item")?;
        let duration = seconds(recipe.duration, &recipe.name, "duration", file)?;
        let id = builder.register_recipe(
            &recipe.name,
            ingredients,
            output,
            recipe.quantity,
            duration,
        );
        recipes.insert(recipe.name.clone(), id);
        debug!(recipe = %recipe.name, ?id, "recipe registered");
    }

    builder.build().map_err(|source| DataLoadError::Catalog {
        file: file.to_path_buf(),
        source,
    })
}

// ===========================================================================
// Entities
// ===========================================================================

fn station_config(
    data: &StationData,
    catalog: &Catalog,
    file: &Path,
) -> Result<StationConfig, DataLoadError> {
    let recipes = data
        .recipes
        .iter()
        .map(|name| {
            catalog
                .recipe_id(name)
                .ok_or_else(|| unresolved(file, name, "recipe"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let completion_grace_period = data
        .grace_period
        .map(|g| seconds(g, &data.name, "grace_period", file))
        .transpose()?;
    Ok(StationConfig {
        recipes,
        completion_grace_period,
        auto_start: data.auto_start,
        initial_contents: contents(
            &data.initial_contents,
            STATION_SLOT_COUNT,
            &data.name,
            catalog,
            file,
        )?,
    })
}

fn storage_config(
    data: &StorageData,
    catalog: &Catalog,
    file: &Path,
) -> Result<StorageConfig, DataLoadError> {
    Ok(StorageConfig {
        infinite_supply: data.infinite_supply,
        initial_contents: contents(
            &data.initial_contents,
            STORAGE_SLOT_COUNT,
            &data.name,
            catalog,
            file,
        )?,
    })
}

fn delivery_config(
    data: &DeliveryData,
    catalog: &Catalog,
    file: &Path,
) -> Result<DeliveryConfig, DataLoadError> {
    let accepted = data
        .accepts
        .iter()
        .map(|name| item(name, catalog, file))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DeliveryConfig { accepted })
}

/// Resolve initial slot contents. `""` leaves a slot empty.
fn contents(
    names: &[String],
    capacity: usize,
    entity: &str,
    catalog: &Catalog,
    file: &Path,
) -> Result<Vec<ItemId>, DataLoadError> {
    if names.len() > capacity {
        return Err(invalid(
            file,
            entity,
            "initial_contents",
            &format!("{} items for {capacity} slots", names.len()),
        ));
    }
    names
        .iter()
        .map(|name| {
            if name.is_empty() {
                Ok(ItemId::EMPTY)
            } else {
                item(name, catalog, file)
            }
        })
        .collect()
}

// ===========================================================================
// Helpers
// ===========================================================================

fn item(name: &str, catalog: &Catalog, file: &Path) -> Result<ItemId, DataLoadError> {
    catalog
        .item_id(name)
        .ok_or_else(|| unresolved(file, name, "item"))
}

fn seconds(
    value: f64,
    name: &str,
    field: &'static str,
    file: &Path,
) -> Result<Seconds, DataLoadError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            file,
            name,
            field,
            &format!("{value} is not a positive number of seconds"),
        ));
    }
    Fixed64::checked_from_num(value)
        .ok_or_else(|| invalid(file, name, field, &format!("{value} seconds is out of range")))
}

fn unresolved(file: &Path, name: &str, expected_kind: &'static str) -> DataLoadError {
    DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    }
}

fn invalid(file: &Path, name: &str, field: &'static str, detail: &str) -> DataLoadError {
    DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        name: name.to_string(),
        field,
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Format, deserialize_str};
    use crate::schema::ItemData;
    use labcraft_core::registry::CatalogError;
    use labcraft_core::station::WorkState;

    const LAB: &str = r#"
        (
            simulation: (tick_rate: 10),
            items: [
                (name: "acid", display_name: "Hydrochloric Acid"),
                (name: "base"),
                (name: "salt"),
            ],
            recipes: [
                (name: "neutralize", ingredients: ["acid", "base"], output: "salt", duration: 2.0),
            ],
            stations: [
                (name: "bench", recipes: ["neutralize"], grace_period: Some(3.0)),
            ],
            storage: [
                (name: "shelf", initial_contents: ["acid", "", "base"]),
            ],
            deliveries: [
                (name: "counter", accepts: ["salt"]),
            ],
        )
    "#;

    fn parse(src: &str) -> SessionData {
        deserialize_str(src, Format::Ron, Path::new("session.ron")).unwrap()
    }

    fn build(src: &str) -> Result<Session, DataLoadError> {
        build_session(parse(src), Path::new("session.ron"))
    }

    #[test]
    fn builds_entities_by_name() {
        let session = build(LAB).unwrap();
        let bench = session.entity("bench").unwrap();
        let shelf = session.entity("shelf").unwrap();
        assert!(session.entity("counter").is_some());
        assert_eq!(session.entity_name(bench), Some("bench"));
        assert_eq!(session.tick_rate, 10);
        let step = labcraft_core::fixed::fixed64_to_f64(session.step_duration());
        assert!((step - 0.1).abs() < 1e-6);

        let station = session.authority.station(bench).unwrap();
        assert_eq!(station.state(), WorkState::Idle);
        assert_eq!(station.config().completion_grace_period, Some(Fixed64::from_num(3)));

        let catalog = session.authority.catalog();
        let slots = session.authority.storage(shelf).unwrap().slots();
        assert_eq!(slots.get(0), catalog.item_id("acid").unwrap());
        assert_eq!(slots.get(1), ItemId::EMPTY);
        assert_eq!(slots.get(2), catalog.item_id("base").unwrap());
        assert_eq!(catalog.display_name(slots.get(0)), Some("Hydrochloric Acid"));
    }

    #[test]
    fn setup_events_are_flushed() {
        let mut session = build(LAB).unwrap();
        assert!(session.authority.flush().is_empty());
    }

    #[test]
    fn unknown_item_in_recipe() {
        let src = LAB.replace(r#"output: "salt""#, r#"output: "sugar""#);
        match build(&src) {
            Err(DataLoadError::UnresolvedRef { name, expected_kind, .. }) => {
                assert_eq!(name, "sugar");
                assert_eq!(expected_kind, "item");
            }
            other => panic!("expected unresolved item, got {other:?}"),
        }
    }

    #[test]
    fn unknown_recipe_on_station() {
        let src = LAB.replace(r#"recipes: ["neutralize"]"#, r#"recipes: ["distill"]"#);
        assert!(matches!(
            build(&src),
            Err(DataLoadError::UnresolvedRef { expected_kind: "recipe", .. })
        ));
    }

    #[test]
    fn duplicate_entity_names_across_kinds() {
        let src = LAB.replace(r#"(name: "counter""#, r#"(name: "shelf""#);
        assert!(matches!(build(&src), Err(DataLoadError::DuplicateName { .. })));
    }

    #[test]
    fn too_many_initial_contents() {
        let src = LAB.replace(
            r#"initial_contents: ["acid", "", "base"]"#,
            r#"initial_contents: ["acid", "acid", "acid", "acid", "acid", "acid", "acid", "acid", "acid", "acid"]"#,
        );
        assert!(matches!(
            build(&src),
            Err(DataLoadError::InvalidValue { field: "initial_contents", .. })
        ));
    }

    #[test]
    fn bad_durations() {
        for bad in ["0.0", "-1.0"] {
            let src = LAB.replace("duration: 2.0", &format!("duration: {bad}"));
            assert!(
                matches!(build(&src), Err(DataLoadError::InvalidValue { field: "duration", .. })),
                "duration {bad} accepted"
            );
        }
        let src = LAB.replace("Some(3.0)", "Some(-3.0)");
        assert!(matches!(
            build(&src),
            Err(DataLoadError::InvalidValue { field: "grace_period", .. })
        ));
    }

    #[test]
    fn zero_tick_rate() {
        let src = LAB.replace("tick_rate: 10", "tick_rate: 0");
        assert!(matches!(
            build(&src),
            Err(DataLoadError::InvalidValue { field: "tick_rate", .. })
        ));
    }

    #[test]
    fn goal_is_started() {
        let src = LAB.replace(
            "deliveries: [",
            "goal: Some((target: 2, time_limit: Some(90.0))),\n            deliveries: [",
        );
        let session = build(&src).unwrap();
        let goal = session.authority.goal().unwrap();
        assert_eq!(goal.config().target, 2);
        assert_eq!(goal.config().time_limit, Some(Fixed64::from_num(90)));
        assert!(goal.is_active());

        assert!(build(LAB).unwrap().authority.goal().is_none());
    }

    #[test]
    fn bad_time_limit() {
        let src = LAB.replace(
            "deliveries: [",
            "goal: Some((target: 2, time_limit: Some(0.0))),\n            deliveries: [",
        );
        assert!(matches!(
            build(&src),
            Err(DataLoadError::InvalidValue { field: "time_limit", .. })
        ));
    }

    #[test]
    fn too_many_items_is_a_catalog_error() {
        let mut data = parse(LAB);
        data.recipes.clear();
        data.stations.clear();
        data.storage.clear();
        data.deliveries.clear();
        data.items = (0..=u16::MAX as usize)
            .map(|i| ItemData {
                name: format!("item{i}"),
                display_name: String::new(),
            })
            .collect();
        assert!(matches!(
            build_session(data, Path::new("session.ron")),
            Err(DataLoadError::Catalog {
                source: CatalogError::TooManyItems { .. },
                ..
            })
        ));
    }

    #[test]
    fn catalog_errors_are_wrapped() {
        let src = LAB.replace(r#"ingredients: ["acid", "base"]"#, r#"ingredients: ["acid", "acid"]"#);
        assert!(matches!(build(&src), Err(DataLoadError::Catalog { .. })));
    }
}
