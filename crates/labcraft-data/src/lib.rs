//! Data-driven session configuration for labcraft.
//!
//! A session directory holds one `session` file in RON, TOML or JSON. It
//! declares the item list, the recipe catalog, the station / storage /
//! delivery layout and simulation settings. [`load_session`] reads it,
//! resolves every name to an id and returns a ready [`Session`].

pub mod loader;
pub mod schema;
pub mod session;

pub use loader::DataLoadError;
pub use session::{Session, build_session, load_session};
