//! Serde structs for the on-disk session format.
//!
//! Everything refers to other things by name. The session builder resolves
//! names to ids and turns these into core configuration types.

use serde::Deserialize;

/// A whole session file.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub simulation: SimulationData,
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
    #[serde(default)]
    pub stations: Vec<StationData>,
    #[serde(default)]
    pub storage: Vec<StorageData>,
    #[serde(default)]
    pub deliveries: Vec<DeliveryData>,
    /// Delivery target and time limit. Without one the session never ends.
    #[serde(default)]
    pub goal: Option<GoalData>,
}

// ===========================================================================
// Simulation settings
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationData {
    /// Authority steps per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Number of applied intents kept for replay and debugging.
    #[serde(default)]
    pub intent_history: usize,
}

fn default_tick_rate() -> u32 {
    30
}

impl Default for SimulationData {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            intent_history: 0,
        }
    }
}

/// `time_limit` is in seconds; leave it out for an untimed target.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalData {
    pub target: u32,
    #[serde(default)]
    pub time_limit: Option<f64>,
}

// ===========================================================================
// Catalog
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// A recipe definition. `duration` is in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    pub ingredients: Vec<String>,
    pub output: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub duration: f64,
}

fn default_quantity() -> u32 {
    1
}

// ===========================================================================
// Entities
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StationData {
    pub name: String,
    pub recipes: Vec<String>,
    /// Seconds a finished product may sit uncollected before it spoils.
    #[serde(default)]
    pub grace_period: Option<f64>,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default)]
    pub initial_contents: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageData {
    pub name: String,
    #[serde(default)]
    pub infinite_supply: bool,
    #[serde(default)]
    pub initial_contents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryData {
    pub name: String,
    /// Accepted item names. Empty accepts anything.
    #[serde(default)]
    pub accepts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_data_from_ron() {
        let ron = r#"
            (
                name: "neutralize",
                ingredients: ["acid", "base"],
                output: "salt",
                duration: 2.5,
            )
        "#;
        let recipe: RecipeData = ron::from_str(ron).unwrap();
        assert_eq!(recipe.ingredients, vec!["acid", "base"]);
        assert_eq!(recipe.quantity, 1);
        assert!((recipe.duration - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn station_defaults() {
        let station: StationData =
            ron::from_str(r#"(name: "bench", recipes: ["neutralize"])"#).unwrap();
        assert!(station.auto_start);
        assert!(station.grace_period.is_none());
        assert!(station.initial_contents.is_empty());
    }

    #[test]
    fn minimal_session_from_toml() {
        let toml = r#"
            [[items]]
            name = "acid"

            [[storage]]
            name = "shelf"
            infinite_supply = true
            initial_contents = ["acid"]
        "#;
        let session: SessionData = toml::from_str(toml).unwrap();
        assert_eq!(session.simulation.tick_rate, 30);
        assert_eq!(session.items.len(), 1);
        assert!(session.storage[0].infinite_supply);
        assert!(session.recipes.is_empty());
    }

    #[test]
    fn goal_is_optional() {
        let session: SessionData = ron::from_str(r#"(items: [])"#).unwrap();
        assert!(session.goal.is_none());

        let session: SessionData =
            toml::from_str("items = []\n[goal]\ntarget = 4\n").unwrap();
        let goal = session.goal.unwrap();
        assert_eq!(goal.target, 4);
        assert!(goal.time_limit.is_none());
    }

    #[test]
    fn delivery_from_json() {
        let json = r#"{"name": "counter", "accepts": ["salt", "brine"]}"#;
        let delivery: DeliveryData = serde_json::from_str(json).unwrap();
        assert_eq!(delivery.accepts.len(), 2);
    }
}
