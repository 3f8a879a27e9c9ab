//! Production stations: input/output slot pairs driven by a work-state machine.
//!
//! ```text
//!            deposit (auto start) / start_work
//!   Idle ───────────────────────────────────────▶ Working
//!    ▲  ▲                                         │   │
//!    │  └──────────────── cancel ─────────────────┘   │ progress reaches 1
//!    │                                                ▼
//!    ├──── last collect_output ──────────────── Completed
//!    │                                                │ grace period elapsed
//!    └──── last collect_remaining / take ─────── Failed ◀┘
//! ```
//!
//! Every method validates its guards before touching any field, records one
//! change per modified field into the caller's [`ChangeSet`], and returns a
//! [`Rejection`] without side effects when a guard fails. Held items are not
//! owned here: the authority checks the requester's hand before calling in
//! and stores whatever item comes back.

use crate::event::{ChangeSet, InventoryKind};
use crate::fixed::{Fixed64, Seconds, checked_div_64, clamp01};
use crate::id::{ItemId, RecipeId};
use crate::intent::Rejection;
use crate::recipe::{Recipe, best_match};
use crate::registry::Catalog;
use crate::slots::{STATION_SLOT_COUNT, SlotInventory};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Static per-station settings, fixed for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Recipes this station may run. Order is irrelevant; ties are broken by
    /// catalog order.
    pub recipes: Vec<RecipeId>,
    /// Time a completed product stays collectable before spoiling.
    /// `None` means it never spoils.
    pub completion_grace_period: Option<Seconds>,
    /// Try to start work after every successful deposit.
    pub auto_start: bool,
    /// Ingredients placed in the input slots at activation and reset.
    pub initial_contents: Vec<ItemId>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            recipes: Vec::new(),
            completion_grace_period: None,
            auto_start: true,
            initial_contents: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Work state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkState {
    #[default]
    Idle,
    Working,
    Completed,
    Failed,
}

impl WorkState {
    /// Deposits are accepted in these states only.
    pub fn accepts_deposits(self) -> bool {
        matches!(self, WorkState::Idle | WorkState::Failed)
    }
}

// ---------------------------------------------------------------------------
// ProductionStation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProductionStation {
    config: StationConfig,
    input: SlotInventory,
    output: SlotInventory,
    state: WorkState,
    progress: Fixed64,
    matched_recipe: Option<RecipeId>,
    completed_at: Option<Seconds>,
}

impl ProductionStation {
    pub fn new(config: StationConfig) -> Self {
        Self {
            config,
            input: SlotInventory::new(STATION_SLOT_COUNT),
            output: SlotInventory::new(STATION_SLOT_COUNT),
            state: WorkState::Idle,
            progress: Fixed64::ZERO,
            matched_recipe: None,
            completed_at: None,
        }
    }

    /// Rebuild a station from replicated or loaded contents. Slot arrays of
    /// the wrong length are fixed up by the next [`activate`](Self::activate).
    pub fn from_parts(
        config: StationConfig,
        input: SlotInventory,
        output: SlotInventory,
    ) -> Self {
        Self {
            input,
            output,
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }
    pub fn input(&self) -> &SlotInventory {
        &self.input
    }
    pub fn output(&self) -> &SlotInventory {
        &self.output
    }
    pub fn state(&self) -> WorkState {
        self.state
    }
    pub fn progress(&self) -> Fixed64 {
        self.progress
    }
    pub fn matched_recipe(&self) -> Option<RecipeId> {
        self.matched_recipe
    }
    pub fn completed_at(&self) -> Option<Seconds> {
        self.completed_at
    }

    /// Size both slot arrays to the station capacity and seed the configured
    /// initial contents if the inputs are empty.
    pub fn activate(&mut self, changes: &mut ChangeSet) {
        self.input.ensure_count(STATION_SLOT_COUNT);
        self.output.ensure_count(STATION_SLOT_COUNT);
        for index in self.input.seed_if_clear(&self.config.initial_contents) {
            changes.slot(InventoryKind::StationInput, index, self.input.get(index));
        }
    }

    /// Return to a clean Idle state with empty slots, then re-apply the
    /// initial contents.
    pub fn reset(&mut self, changes: &mut ChangeSet) {
        self.clear_inventory(InventoryKind::StationOutput, changes);
        self.clear_inventory(InventoryKind::StationInput, changes);
        self.completed_at = None;
        self.return_to_idle(changes);
        self.activate(changes);
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Take the item in input slot `index`. Not allowed while Working.
    pub fn take_from_slot(
        &mut self,
        index: usize,
        changes: &mut ChangeSet,
    ) -> Result<ItemId, Rejection> {
        if self.state == WorkState::Working {
            return Err(Rejection::WrongState(self.state));
        }
        if index >= self.input.len() {
            return Err(Rejection::SlotOutOfRange(index));
        }
        let item = self.input.get(index);
        if item.is_empty() {
            return Err(Rejection::SlotEmpty(index));
        }

        self.set_slot(InventoryKind::StationInput, index, ItemId::EMPTY, changes);
        if self.state == WorkState::Failed {
            self.finish_failed_if_empty(changes);
        }
        Ok(item)
    }

    /// Put `item` into the first empty input slot, then auto-start if
    /// configured and a recipe is now satisfied.
    pub fn deposit(
        &mut self,
        item: ItemId,
        catalog: &Catalog,
        changes: &mut ChangeSet,
    ) -> Result<(), Rejection> {
        if !self.state.accepts_deposits() {
            return Err(Rejection::WrongState(self.state));
        }
        let index = self.input.first_empty_slot().ok_or(Rejection::NoEmptySlot)?;

        self.set_slot(InventoryKind::StationInput, index, item, changes);
        if self.state == WorkState::Idle && self.config.auto_start {
            // An unsatisfied auto start is not a failure of the deposit.
            let _ = self.start_work(catalog, changes);
        }
        Ok(())
    }

    /// Bind the best satisfied recipe and begin working.
    pub fn start_work(
        &mut self,
        catalog: &Catalog,
        changes: &mut ChangeSet,
    ) -> Result<RecipeId, Rejection> {
        if self.state != WorkState::Idle {
            return Err(Rejection::WrongState(self.state));
        }
        let (recipe_id, recipe) =
            self.best_recipe(catalog).ok_or(Rejection::NoRecipeMatch)?;

        debug!(recipe = %recipe.name, "station starts work");
        self.matched_recipe = Some(recipe_id);
        self.set_progress(Fixed64::ZERO, changes);
        self.set_state(WorkState::Working, changes);
        Ok(recipe_id)
    }

    /// Abort work in progress. Inputs stay where they are.
    pub fn cancel(&mut self, changes: &mut ChangeSet) -> Result<(), Rejection> {
        if self.state != WorkState::Working {
            return Err(Rejection::WrongState(self.state));
        }
        debug!("station work cancelled");
        self.return_to_idle(changes);
        Ok(())
    }

    /// Take one product. The last product out also clears leftover inputs
    /// and returns the station to Idle.
    pub fn collect_output(&mut self, changes: &mut ChangeSet) -> Result<ItemId, Rejection> {
        if self.state != WorkState::Completed {
            return Err(Rejection::WrongState(self.state));
        }
        let index = self
            .output
            .first_occupied_slot()
            .ok_or(Rejection::NothingToCollect)?;
        let item = self.output.get(index);

        self.set_slot(InventoryKind::StationOutput, index, ItemId::EMPTY, changes);
        if self.output.is_clear() {
            self.clear_inventory(InventoryKind::StationInput, changes);
            self.completed_at = None;
            self.return_to_idle(changes);
        }
        Ok(item)
    }

    /// Take one leftover item from a failed station, outputs before inputs.
    pub fn collect_remaining(&mut self, changes: &mut ChangeSet) -> Result<ItemId, Rejection> {
        if self.state != WorkState::Failed {
            return Err(Rejection::WrongState(self.state));
        }
        let (kind, index) = if let Some(i) = self.output.first_occupied_slot() {
            (InventoryKind::StationOutput, i)
        } else if let Some(i) = self.input.first_occupied_slot() {
            (InventoryKind::StationInput, i)
        } else {
            return Err(Rejection::NothingToCollect);
        };
        let item = match kind {
            InventoryKind::StationOutput => self.output.get(index),
            _ => self.input.get(index),
        };

        self.set_slot(kind, index, ItemId::EMPTY, changes);
        self.finish_failed_if_empty(changes);
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the state machine by `dt` seconds; `now` is the session time
    /// after the advance.
    pub fn tick(&mut self, dt: Seconds, now: Seconds, catalog: &Catalog, changes: &mut ChangeSet) {
        match self.state {
            WorkState::Working => self.tick_working(dt, now, catalog, changes),
            WorkState::Completed => self.tick_completed(now, changes),
            WorkState::Idle | WorkState::Failed => {}
        }
    }

    fn tick_working(
        &mut self,
        dt: Seconds,
        now: Seconds,
        catalog: &Catalog,
        changes: &mut ChangeSet,
    ) {
        let Some(recipe) = self.matched_recipe.and_then(|id| catalog.get_recipe(id)) else {
            debug!("working station lost its recipe; returning to idle");
            self.return_to_idle(changes);
            return;
        };

        let dt = dt.max(Fixed64::ZERO);
        // Positive durations are enforced by the catalog; overflow means a
        // step far longer than the recipe.
        let step = checked_div_64(dt, recipe.work_duration).unwrap_or(Fixed64::ONE);
        let progress = clamp01(self.progress.saturating_add(step));
        trace!(progress = %progress, "station progress");
        self.set_progress(progress, changes);

        if progress >= Fixed64::ONE {
            self.complete(recipe, now, changes);
        }
    }

    fn complete(&mut self, recipe: &Recipe, now: Seconds, changes: &mut ChangeSet) {
        self.clear_inventory(InventoryKind::StationInput, changes);

        let mut written = 0u32;
        while written < recipe.output_quantity {
            let Some(index) = self.output.first_empty_slot() else {
                break;
            };
            self.set_slot(InventoryKind::StationOutput, index, recipe.output, changes);
            written += 1;
        }
        if written < recipe.output_quantity {
            debug!(
                recipe = %recipe.name,
                dropped = recipe.output_quantity - written,
                "output slots full; excess product dropped"
            );
        }

        self.completed_at = Some(now);
        self.set_state(WorkState::Completed, changes);
        debug!(recipe = %recipe.name, produced = written, "station completed work");
    }

    fn tick_completed(&mut self, now: Seconds, changes: &mut ChangeSet) {
        if let Some(grace) = self.config.completion_grace_period
            && let Some(completed_at) = self.completed_at
            && now.saturating_sub(completed_at) >= grace
        {
            debug!("grace period elapsed; product spoiled");
            self.set_state(WorkState::Failed, changes);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The recipe `start_work` would pick for the current input slots.
    pub fn best_recipe<'a>(&self, catalog: &'a Catalog) -> Option<(RecipeId, &'a Recipe)> {
        let candidates = self
            .config
            .recipes
            .iter()
            .filter_map(|&id| catalog.get_recipe(id).map(|r| (id, r)));
        best_match(self.input.as_slice(), candidates)
    }

    fn finish_failed_if_empty(&mut self, changes: &mut ChangeSet) {
        if self.input.is_clear() && self.output.is_clear() {
            debug!("failed station emptied; returning to idle");
            self.completed_at = None;
            self.return_to_idle(changes);
        }
    }

    fn return_to_idle(&mut self, changes: &mut ChangeSet) {
        self.matched_recipe = None;
        self.set_progress(Fixed64::ZERO, changes);
        self.set_state(WorkState::Idle, changes);
    }

    fn set_state(&mut self, state: WorkState, changes: &mut ChangeSet) {
        if self.state != state {
            self.state = state;
            changes.work_state(state);
        }
    }

    fn set_progress(&mut self, progress: Fixed64, changes: &mut ChangeSet) {
        if self.progress != progress {
            self.progress = progress;
            changes.progress(progress);
        }
    }

    fn set_slot(
        &mut self,
        kind: InventoryKind,
        index: usize,
        item: ItemId,
        changes: &mut ChangeSet,
    ) {
        let slots = match kind {
            InventoryKind::StationOutput => &mut self.output,
            _ => &mut self.input,
        };
        if slots.set(index, item) {
            changes.slot(kind, index, item);
        }
    }

    fn clear_inventory(&mut self, kind: InventoryKind, changes: &mut ChangeSet) {
        let slots = match kind {
            InventoryKind::StationOutput => &mut self.output,
            _ => &mut self.input,
        };
        for index in slots.clear() {
            changes.slot(kind, index, ItemId::EMPTY);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
