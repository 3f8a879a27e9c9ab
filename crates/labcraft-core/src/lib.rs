//! Labcraft Core -- the authoritative model for multiplayer crafting sessions.
//!
//! One [`authority::Authority`] owns every slot inventory, participant hand
//! and production station. Participants send intents; the authority
//! validates each against current state, applies it atomically or drops it
//! silently, and publishes one change event per modified field. Observers
//! keep read-only [`mirror::Mirror`]s that converge by applying those events
//! in sequence order.
//!
//! # Authority Step
//!
//! Each call to [`authority::Authority::step`] runs:
//!
//! 1. **Tick** -- advance the tick counter.
//! 2. **Intents** -- apply queued intents in arrival order.
//! 3. **Time** -- advance session time (skipped while paused, with 4 and 5).
//! 4. **Stations** -- accrue progress, complete work, spoil uncollected output.
//! 5. **Goal** -- run the session clock; time-up closes delivery points.
//! 6. **Deliver** -- hand buffered change events to subscribers.
//!
//! # Key Types
//!
//! - [`slots::SlotInventory`] -- fixed-length item-id array, `0` = empty.
//! - [`held::HeldItem`] -- a participant's single-item hand.
//! - [`registry::Catalog`] -- immutable items and recipes (frozen at startup).
//! - [`recipe::best_match`] -- greedy slot matching with first-defined tie-break.
//! - [`station::ProductionStation`] -- Idle / Working / Completed / Failed.
//! - [`goal::SessionGoal`] -- delivery target and time limit.
//! - [`event::EventBus`] -- sequenced, buffered change notification.
//! - [`wire`] -- versioned bitcode framing for snapshots, batches and intents.

pub mod authority;
pub mod delivery;
pub mod event;
pub mod fixed;
pub mod goal;
pub mod held;
pub mod id;
pub mod intent;
pub mod mirror;
pub mod recipe;
pub mod registry;
pub mod sim;
pub mod slots;
pub mod snapshot;
pub mod station;
pub mod storage;
pub mod validation;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
