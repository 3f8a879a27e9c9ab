//! The same session written in each supported format loads to the same
//! authority state.

use std::fs;
use std::path::{Path, PathBuf};

use labcraft_data::{DataLoadError, load_session};

const RON: &str = r#"
(
    simulation: (tick_rate: 20),
    items: [(name: "acid"), (name: "base"), (name: "salt")],
    recipes: [(name: "neutralize", ingredients: ["acid", "base"], output: "salt", duration: 1.5)],
    stations: [(name: "bench", recipes: ["neutralize"], grace_period: Some(2.0))],
    storage: [(name: "shelf", infinite_supply: true, initial_contents: ["acid", "base"])],
    deliveries: [(name: "counter", accepts: ["salt"])],
    goal: Some((target: 3, time_limit: Some(45.0))),
)
"#;

const TOML: &str = r#"
[simulation]
tick_rate = 20

[[items]]
name = "acid"

[[items]]
name = "base"

[[items]]
name = "salt"

[[recipes]]
name = "neutralize"
ingredients = ["acid", "base"]
output = "salt"
duration = 1.5

[[stations]]
name = "bench"
recipes = ["neutralize"]
grace_period = 2.0

[[storage]]
name = "shelf"
infinite_supply = true
initial_contents = ["acid", "base"]

[[deliveries]]
name = "counter"
accepts = ["salt"]

[goal]
target = 3
time_limit = 45.0
"#;

const JSON: &str = r#"
{
    "simulation": {"tick_rate": 20},
    "items": [{"name": "acid"}, {"name": "base"}, {"name": "salt"}],
    "recipes": [
        {"name": "neutralize", "ingredients": ["acid", "base"], "output": "salt", "duration": 1.5}
    ],
    "stations": [{"name": "bench", "recipes": ["neutralize"], "grace_period": 2.0}],
    "storage": [{"name": "shelf", "infinite_supply": true, "initial_contents": ["acid", "base"]}],
    "deliveries": [{"name": "counter", "accepts": ["salt"]}],
    "goal": {"target": 3, "time_limit": 45.0}
}
"#;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "labcraft_formats_test_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn every_format_builds_the_same_session() {
    let mut hashes = Vec::new();
    for (ext, body) in [("ron", RON), ("toml", TOML), ("json", JSON)] {
        let dir = make_test_dir(ext);
        fs::write(dir.join(format!("session.{ext}")), body).unwrap();

        let session = load_session(&dir).unwrap();
        assert_eq!(session.tick_rate, 20, "{ext}");
        let bench = session.entity("bench").unwrap();
        let station = session.authority.station(bench).unwrap();
        assert!(station.config().completion_grace_period.is_some(), "{ext}");
        let shelf = session.entity("shelf").unwrap();
        assert!(session.authority.storage(shelf).unwrap().is_infinite(), "{ext}");
        let goal = session.authority.goal().map(|g| g.view());
        assert_eq!(goal.map(|g| (g.target, g.active)), Some((3, true)), "{ext}");
        hashes.push(session.authority.state_hash());

        cleanup(&dir);
    }
    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn missing_session_file() {
    let dir = make_test_dir("missing");
    assert!(matches!(
        load_session(&dir),
        Err(DataLoadError::MissingRequired { .. })
    ));
    cleanup(&dir);
}

#[test]
fn two_formats_side_by_side_conflict() {
    let dir = make_test_dir("conflict");
    fs::write(dir.join("session.ron"), RON).unwrap();
    fs::write(dir.join("session.json"), JSON).unwrap();
    assert!(matches!(
        load_session(&dir),
        Err(DataLoadError::ConflictingFormats { .. })
    ));
    cleanup(&dir);
}

#[test]
fn parse_errors_name_the_file() {
    let dir = make_test_dir("parse");
    let path = dir.join("session.toml");
    fs::write(&path, "[[items]\nname = ").unwrap();
    match load_session(&dir) {
        Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
        other => panic!("expected a parse error, got {other:?}"),
    }
    cleanup(&dir);
}
