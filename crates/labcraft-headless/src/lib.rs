//! Headless authority runner.
//!
//! Loads a session directory, plays a timed intent script against the
//! authority and ships every event batch through the wire codec to observer
//! mirrors, failing as soon as any observer diverges.

pub mod runner;
pub mod script;
