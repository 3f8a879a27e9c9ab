//! The authority: sole owner and writer of the shared session state.
//!
//! Intents are validated against the state at the moment they execute, never
//! against what the requester saw. A successful intent mutates exactly the
//! fields it names and emits one [`ChangeEvent`] per change; a rejected
//! intent mutates nothing and emits nothing.
//!
//! # Update loop
//!
//! Each [`Authority::step`] runs, in order:
//!
//! 1. **Tick** -- advance the tick counter.
//! 2. **Intents** -- drain the queue and apply each intent in arrival order.
//! 3. **Time** -- advance session time by `dt`.
//! 4. **Stations** -- accrue progress, complete work, check grace periods.
//! 5. **Goal** -- run the session clock and end the session on time-up.
//! 6. **Deliver** -- hand the step's change events to subscribers.
//!
//! A paused session skips phases 3 to 5.

use crate::delivery::{DeliveryConfig, DeliveryPoint};
use crate::event::{ChangeEvent, ChangeSet, EventBus, Replicated};
use crate::fixed::Seconds;
use crate::goal::{GoalConfig, SessionGoal};
use crate::held::HeldItem;
use crate::id::{EntityId, ItemId, ParticipantId};
use crate::intent::{Envelope, Intent, IntentQueue, Rejection};
use crate::registry::Catalog;
use crate::sim::SimState;
use crate::snapshot::{DeliveryView, EntityView, StationView, StorageView, WorldSnapshot};
use crate::station::{ProductionStation, StationConfig};
use crate::storage::{StorageConfig, StorageContainer};
use slotmap::SlotMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Everything the authority can address with an [`EntityId`].
#[derive(Debug, Clone)]
pub enum Entity {
    Station(ProductionStation),
    Storage(StorageContainer),
    Delivery(DeliveryPoint),
}

impl Entity {
    fn view(&self) -> EntityView {
        match self {
            Entity::Station(s) => EntityView::Station(StationView {
                input: s.input().as_slice().to_vec(),
                output: s.output().as_slice().to_vec(),
                state: s.state(),
                progress: s.progress(),
            }),
            Entity::Storage(s) => EntityView::Storage(StorageView {
                slots: s.slots().as_slice().to_vec(),
            }),
            Entity::Delivery(d) => EntityView::Delivery(DeliveryView {
                delivered: d.delivered(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Authority {
    catalog: Arc<Catalog>,
    entities: SlotMap<EntityId, Entity>,
    hands: BTreeMap<ParticipantId, HeldItem>,
    intents: IntentQueue,
    events: EventBus,
    sim: SimState,
    goal: Option<SessionGoal>,
    paused: bool,
}

impl Authority {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            entities: SlotMap::with_key(),
            hands: BTreeMap::new(),
            intents: IntentQueue::new(),
            events: EventBus::new(),
            sim: SimState::new(),
            goal: None,
            paused: false,
        }
    }

    /// Keep the last `max_history` executed intents for replay and debugging.
    pub fn with_intent_history(mut self, max_history: usize) -> Self {
        self.intents = IntentQueue::with_max_history(max_history);
        self
    }

    // -----------------------------------------------------------------------
    // Session setup
    // -----------------------------------------------------------------------
    //
    // Entities may be added at any time. Each one replicates as an
    // `EntityAdded` event followed by its activation changes, so mirrors
    // built from an earlier snapshot pick it up.

    fn insert_entity(&mut self, entity: Entity) -> EntityId {
        let view = entity.view();
        let id = self.entities.insert(entity);
        self.events
            .emit(ChangeEvent::EntityAdded { entity: id, view }, self.sim.tick);
        id
    }

    /// Create and activate a production station.
    pub fn add_station(&mut self, config: StationConfig) -> EntityId {
        let id = self.insert_entity(Entity::Station(ProductionStation::new(config)));
        let mut changes = ChangeSet::new(id);
        if let Some(Entity::Station(station)) = self.entities.get_mut(id) {
            station.activate(&mut changes);
        }
        self.events.emit_all(changes.into_events(), self.sim.tick);
        debug!(entity = ?id, "station added");
        id
    }

    /// Create and activate a storage container.
    pub fn add_storage(&mut self, config: StorageConfig) -> EntityId {
        let id = self.insert_entity(Entity::Storage(StorageContainer::new(config)));
        let mut changes = ChangeSet::new(id);
        if let Some(Entity::Storage(storage)) = self.entities.get_mut(id) {
            storage.activate(&mut changes);
        }
        self.events.emit_all(changes.into_events(), self.sim.tick);
        debug!(entity = ?id, "storage added");
        id
    }

    pub fn add_delivery(&mut self, config: DeliveryConfig) -> EntityId {
        let id = self.insert_entity(Entity::Delivery(DeliveryPoint::new(config)));
        debug!(entity = ?id, "delivery point added");
        id
    }

    /// Start a session goal with a fresh clock, replacing any earlier one.
    pub fn set_goal(&mut self, config: GoalConfig) {
        let goal = SessionGoal::new(config);
        self.events.emit(goal.started_event(), self.sim.tick);
        debug!(
            target_count = goal.config().target,
            time_limit = ?goal.config().time_limit,
            "session goal set"
        );
        self.goal = Some(goal);
    }

    /// Register a participant with an empty hand. Returns `false` if already
    /// present.
    pub fn add_participant(&mut self, participant: ParticipantId) -> bool {
        if self.hands.contains_key(&participant) {
            return false;
        }
        self.hands.insert(participant, HeldItem::new());
        self.events
            .emit(ChangeEvent::ParticipantJoined { participant }, self.sim.tick);
        debug!(participant = participant.0, "participant joined");
        true
    }

    /// Remove a participant. Whatever they held leaves with them, and their
    /// queued intents are dropped.
    pub fn remove_participant(&mut self, participant: ParticipantId) -> bool {
        let Some(hand) = self.hands.remove(&participant) else {
            return false;
        };
        self.intents.discard_from(participant);
        self.events
            .emit(ChangeEvent::ParticipantLeft { participant }, self.sim.tick);
        debug!(
            participant = participant.0,
            discarded = hand.get().0,
            "participant left"
        );
        true
    }

    /// Return every entity to its initial state: stations Idle with empty
    /// slots, storage re-seeded, delivery counters zeroed, hands emptied,
    /// the goal restarted and the session unpaused. All changes replicate as
    /// ordinary events.
    pub fn reset_session(&mut self) {
        let tick = self.sim.tick;
        for (id, entity) in self.entities.iter_mut() {
            let mut changes = ChangeSet::new(id);
            match entity {
                Entity::Station(s) => s.reset(&mut changes),
                Entity::Storage(s) => s.reset(&mut changes),
                Entity::Delivery(d) => d.reset(&mut changes),
            }
            self.events.emit_all(changes.into_events(), tick);
        }
        for (&participant, hand) in self.hands.iter_mut() {
            if hand.is_holding() {
                hand.clear();
                self.events.emit(
                    ChangeEvent::HeldItemChanged {
                        participant,
                        item: ItemId::EMPTY,
                    },
                    tick,
                );
            }
        }
        if let Some(goal) = self.goal.as_mut() {
            let mut events = Vec::new();
            goal.reset(&mut events);
            self.events.emit_all(events, tick);
        }
        if self.paused {
            self.paused = false;
            self.events
                .emit(ChangeEvent::PausedChanged { paused: false }, tick);
        }
        debug!(tick, "session reset");
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Queue an intent for the next [`step`](Self::step).
    pub fn submit(&mut self, sender: ParticipantId, intent: Intent) {
        self.intents.push(Envelope { sender, intent });
    }

    /// Validate and apply an intent now. Events are buffered until the next
    /// [`step`](Self::step) or [`flush`](Self::flush).
    pub fn apply(&mut self, sender: ParticipantId, intent: &Intent) -> Result<(), Rejection> {
        let result = self.execute(sender, intent);
        match &result {
            Ok(()) => trace!(participant = sender.0, ?intent, "intent applied"),
            Err(reason) => debug!(
                participant = sender.0,
                ?intent,
                %reason,
                "intent rejected"
            ),
        }
        result
    }

    fn execute(&mut self, sender: ParticipantId, intent: &Intent) -> Result<(), Rejection> {
        if !self.hands.contains_key(&sender) {
            return Err(Rejection::UnknownParticipant(sender));
        }
        let Some(entity_id) = intent.entity() else {
            return self.set_paused(sender, matches!(intent, Intent::Pause));
        };
        if self.paused {
            return Err(Rejection::Paused);
        }

        let tick = self.sim.tick;
        let catalog = &*self.catalog;
        let hand = self
            .hands
            .get_mut(&sender)
            .ok_or(Rejection::UnknownParticipant(sender))?;
        let entity = self
            .entities
            .get_mut(entity_id)
            .ok_or(Rejection::UnknownEntity)?;

        let mut changes = ChangeSet::new(entity_id);
        let mut session_events = Vec::new();
        // New hand contents, when the intent moves an item in or out of it.
        let held: Option<ItemId> = match (intent, entity) {
            (Intent::TakeFromSlot { index, .. }, Entity::Storage(storage)) => {
                require_empty_hand(hand)?;
                let item = storage.take_from_slot(*index, &mut changes)?;
                Some(item)
            }
            (Intent::TakeFromSlot { index, .. }, Entity::Station(station)) => {
                require_empty_hand(hand)?;
                let item = station.take_from_slot(*index, &mut changes)?;
                Some(item)
            }
            (Intent::DepositHeld { .. }, Entity::Storage(storage)) => {
                storage.deposit(require_holding(hand)?, &mut changes)?;
                Some(ItemId::EMPTY)
            }
            (Intent::DepositHeld { .. }, Entity::Station(station)) => {
                station.deposit(require_holding(hand)?, catalog, &mut changes)?;
                Some(ItemId::EMPTY)
            }
            (Intent::StartWork { .. }, Entity::Station(station)) => {
                station.start_work(catalog, &mut changes)?;
                None
            }
            (Intent::CancelWork { .. }, Entity::Station(station)) => {
                station.cancel(&mut changes)?;
                None
            }
            (Intent::CollectOutput { .. }, Entity::Station(station)) => {
                require_empty_hand(hand)?;
                Some(station.collect_output(&mut changes)?)
            }
            (Intent::CollectRemaining { .. }, Entity::Station(station)) => {
                require_empty_hand(hand)?;
                Some(station.collect_remaining(&mut changes)?)
            }
            (Intent::Deliver { .. }, Entity::Delivery(point)) => {
                if let Some(goal) = &self.goal
                    && !goal.is_active()
                {
                    return Err(Rejection::SessionEnded);
                }
                point.deliver(sender, require_holding(hand)?, &mut changes)?;
                if let Some(goal) = self.goal.as_mut()
                    && goal.record_delivery(&mut session_events)
                {
                    info!(tick, delivered = goal.delivered(), "session target reached");
                }
                Some(ItemId::EMPTY)
            }
            _ => return Err(Rejection::Unsupported),
        };

        if let Some(item) = held {
            hand.set(item);
        }
        self.events.emit_all(changes.into_events(), tick);
        if let Some(item) = held {
            self.events.emit(
                ChangeEvent::HeldItemChanged {
                    participant: sender,
                    item,
                },
                tick,
            );
        }
        self.events.emit_all(session_events, tick);
        Ok(())
    }

    fn set_paused(&mut self, sender: ParticipantId, paused: bool) -> Result<(), Rejection> {
        if self.paused == paused {
            return Err(if paused {
                Rejection::Paused
            } else {
                Rejection::NotPaused
            });
        }
        self.paused = paused;
        self.events
            .emit(ChangeEvent::PausedChanged { paused }, self.sim.tick);
        info!(participant = sender.0, paused, "session pause changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Update loop
    // -----------------------------------------------------------------------

    /// Run one authority step of `dt` seconds and return the delivered
    /// change events.
    ///
    /// Queued intents apply before time passes, so work started by an
    /// intent in this step already accrues the whole `dt`.
    pub fn step(&mut self, dt: Seconds) -> Vec<Replicated> {
        // Phase 1: tick
        let tick = self.sim.next_tick();

        // Phase 2: intents
        for envelope in self.intents.drain(tick) {
            // Rejections are logged in apply; the sender sees no change.
            let _ = self.apply(envelope.sender, &envelope.intent);
        }

        if self.paused {
            trace!(tick, "paused");
            return self.events.deliver();
        }

        // Phase 3: time
        let dt = self.sim.advance_time(dt);
        let now = self.sim.time;

        // Phase 4: stations
        let catalog = &*self.catalog;
        for (id, entity) in self.entities.iter_mut() {
            if let Entity::Station(station) = entity {
                let mut changes = ChangeSet::new(id);
                station.tick(dt, now, catalog, &mut changes);
                self.events.emit_all(changes.into_events(), tick);
            }
        }

        // Phase 5: goal
        if let Some(goal) = self.goal.as_mut() {
            let mut events = Vec::new();
            if goal.tick(dt, &mut events) {
                info!(
                    tick,
                    delivered = goal.delivered(),
                    target_count = goal.config().target,
                    "session time is up"
                );
            }
            self.events.emit_all(events, tick);
        }

        // Phase 6: deliver
        self.events.deliver()
    }

    /// Deliver events buffered outside [`step`](Self::step), e.g. by
    /// [`apply`](Self::apply) or session setup.
    pub fn flush(&mut self) -> Vec<Replicated> {
        self.events.deliver()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn sim_state(&self) -> &SimState {
        &self.sim
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn station(&self, id: EntityId) -> Option<&ProductionStation> {
        match self.entities.get(id)? {
            Entity::Station(s) => Some(s),
            _ => None,
        }
    }

    pub fn storage(&self, id: EntityId) -> Option<&StorageContainer> {
        match self.entities.get(id)? {
            Entity::Storage(s) => Some(s),
            _ => None,
        }
    }

    pub fn delivery(&self, id: EntityId) -> Option<&DeliveryPoint> {
        match self.entities.get(id)? {
            Entity::Delivery(d) => Some(d),
            _ => None,
        }
    }

    /// What a participant is holding, or `None` for unknown participants.
    pub fn goal(&self) -> Option<&SessionGoal> {
        self.goal.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn held(&self, participant: ParticipantId) -> Option<ItemId> {
        self.hands.get(&participant).map(HeldItem::get)
    }

    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.hands.keys().copied()
    }

    pub fn intents(&self) -> &IntentQueue {
        &self.intents
    }

    /// Subscribe observers here; they receive every delivered batch.
    pub fn event_bus_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Copy of every replicated field, tagged with the latest emitted
    /// sequence number.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut entities: Vec<(EntityId, EntityView)> = self
            .entities
            .iter()
            .map(|(id, entity)| (id, entity.view()))
            .collect();
        entities.sort_by_key(|(id, _)| *id);
        WorldSnapshot {
            seq: self.events.last_seq(),
            tick: self.sim.tick,
            entities,
            hands: self.hands.iter().map(|(p, h)| (*p, h.get())).collect(),
            goal: self.goal.as_ref().map(SessionGoal::view),
            paused: self.paused,
        }
    }

    pub fn state_hash(&self) -> u64 {
        self.snapshot().state_hash()
    }
}

fn require_empty_hand(hand: &HeldItem) -> Result<(), Rejection> {
    if hand.is_holding() {
        Err(Rejection::AlreadyHolding)
    } else {
        Ok(())
    }
}

fn require_holding(hand: &HeldItem) -> Result<ItemId, Rejection> {
    if hand.is_holding() {
        Ok(hand.get())
    } else {
        Err(Rejection::NotHolding)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::fixed::{Fixed64, f64_to_fixed64};
    use crate::mirror::Mirror;
    use crate::station::WorkState;
    use crate::test_utils::{lab, secs};

    const ALICE: ParticipantId = ParticipantId(1);
    const BOB: ParticipantId = ParticipantId(2);

    #[test]
    fn take_moves_item_into_hand() {
        let mut l = lab();
        l.authority
            .apply(ALICE, &Intent::TakeFromSlot { entity: l.shelf, index: 0 })
            .unwrap();
        assert_eq!(l.authority.held(ALICE), Some(l.acid));
        assert_eq!(l.authority.storage(l.shelf).unwrap().slots().get(0), ItemId::EMPTY);

        let batch = l.authority.flush();
        let kinds: Vec<EventKind> = batch.iter().map(|r| r.event.kind()).collect();
        assert_eq!(kinds, vec![EventKind::SlotChanged, EventKind::HeldItemChanged]);
    }

    #[test]
    fn racing_takes_only_one_wins() {
        let mut l = lab();
        let take = Intent::TakeFromSlot { entity: l.shelf, index: 0 };
        l.authority.submit(BOB, take.clone());
        l.authority.submit(ALICE, take);
        l.authority.step(Fixed64::ZERO);

        // Arrival order decides.
        assert_eq!(l.authority.held(BOB), Some(l.acid));
        assert_eq!(l.authority.held(ALICE), Some(ItemId::EMPTY));
        assert_eq!(l.authority.storage(l.shelf).unwrap().slots().get(0), ItemId::EMPTY);
    }

    #[test]
    fn rejected_intent_emits_nothing() {
        let mut l = lab();
        let before = l.authority.snapshot();
        let result = l
            .authority
            .apply(ALICE, &Intent::DepositHeld { entity: l.station });
        assert_eq!(result, Err(Rejection::NotHolding));
        assert!(l.authority.flush().is_empty());
        assert_eq!(l.authority.snapshot(), before);
    }

    #[test]
    fn holding_blocks_another_take() {
        let mut l = lab();
        let take0 = Intent::TakeFromSlot { entity: l.shelf, index: 0 };
        let take1 = Intent::TakeFromSlot { entity: l.shelf, index: 1 };
        l.authority.apply(ALICE, &take0).unwrap();
        assert_eq!(l.authority.apply(ALICE, &take1), Err(Rejection::AlreadyHolding));
        assert_eq!(l.authority.storage(l.shelf).unwrap().slots().get(1), l.base);
    }

    #[test]
    fn unknown_targets_are_dropped() {
        let mut l = lab();
        assert_eq!(
            l.authority
                .apply(ParticipantId(99), &Intent::StartWork { entity: l.station }),
            Err(Rejection::UnknownParticipant(ParticipantId(99)))
        );
        assert_eq!(
            l.authority
                .apply(ALICE, &Intent::StartWork { entity: EntityId::default() }),
            Err(Rejection::UnknownEntity)
        );
        assert_eq!(
            l.authority.apply(ALICE, &Intent::StartWork { entity: l.shelf }),
            Err(Rejection::Unsupported)
        );
    }

    #[test]
    fn crafting_scenario_end_to_end() {
        let mut l = lab();
        for index in 0..2 {
            l.authority
                .apply(ALICE, &Intent::TakeFromSlot { entity: l.shelf, index })
                .unwrap();
            l.authority
                .apply(ALICE, &Intent::DepositHeld { entity: l.station })
                .unwrap();
        }
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Working
        );

        for _ in 0..4 {
            l.authority.step(secs(0.5));
        }
        let station = l.authority.station(l.station).unwrap();
        assert_eq!(station.state(), WorkState::Completed);
        assert_eq!(station.output().get(0), l.salt);

        l.authority
            .apply(BOB, &Intent::CollectOutput { entity: l.station })
            .unwrap();
        assert_eq!(l.authority.held(BOB), Some(l.salt));
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Idle
        );

        l.authority
            .apply(BOB, &Intent::Deliver { entity: l.counter })
            .unwrap();
        assert_eq!(l.authority.held(BOB), Some(ItemId::EMPTY));
        assert_eq!(l.authority.delivery(l.counter).unwrap().delivered(), 1);
    }

    #[test]
    fn leaving_discards_hand_and_queue() {
        let mut l = lab();
        l.authority
            .apply(ALICE, &Intent::TakeFromSlot { entity: l.shelf, index: 0 })
            .unwrap();
        l.authority.submit(ALICE, Intent::DepositHeld { entity: l.shelf });
        assert!(l.authority.remove_participant(ALICE));
        assert!(!l.authority.remove_participant(ALICE));
        assert_eq!(l.authority.held(ALICE), None);
        assert_eq!(l.authority.intents().pending_count(), 0);

        let batch = l.authority.step(Fixed64::ZERO);
        assert_eq!(batch.last().map(|r| r.event.kind()), Some(EventKind::ParticipantLeft));
    }

    #[test]
    fn grace_period_spoils_in_step() {
        let mut l = lab();
        l.fill_station(ALICE);
        l.authority.step(f64_to_fixed64(2.0));
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Completed
        );
        l.authority.step(f64_to_fixed64(2.0));
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Completed
        );
        l.authority.step(f64_to_fixed64(1.0));
        let station = l.authority.station(l.station).unwrap();
        assert_eq!(station.state(), WorkState::Failed);
        assert_eq!(station.output().get(0), l.salt);

        l.authority
            .apply(BOB, &Intent::CollectRemaining { entity: l.station })
            .unwrap();
        assert_eq!(l.authority.held(BOB), Some(l.salt));
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Idle
        );
    }

    #[test]
    fn reset_session_restores_layout() {
        let mut l = lab();
        l.fill_station(ALICE);
        l.authority
            .apply(BOB, &Intent::TakeFromSlot { entity: l.shelf, index: 2 })
            .unwrap();
        let before = l.fresh_hash;

        l.authority.reset_session();
        assert_eq!(l.authority.held(BOB), Some(ItemId::EMPTY));
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Idle
        );
        assert_eq!(l.authority.state_hash(), before);
    }

    #[test]
    fn queued_deposit_accrues_in_the_same_step() {
        let mut l = lab();
        for index in 0..2 {
            l.authority
                .apply(ALICE, &Intent::TakeFromSlot { entity: l.shelf, index })
                .unwrap();
            if index == 0 {
                l.authority
                    .apply(ALICE, &Intent::DepositHeld { entity: l.station })
                    .unwrap();
            }
        }
        l.authority.submit(ALICE, Intent::DepositHeld { entity: l.station });
        l.authority.step(secs(2.0));
        let station = l.authority.station(l.station).unwrap();
        assert_eq!(station.state(), WorkState::Completed);
        assert_eq!(station.completed_at(), Some(secs(2.0)));
    }

    #[test]
    fn entity_added_later_reaches_existing_mirrors() {
        let mut l = lab();
        let mut mirror = Mirror::from_snapshot(l.authority.snapshot());
        let tap = l.authority.add_storage(StorageConfig {
            infinite_supply: true,
            initial_contents: vec![l.water],
        });
        let batch = l.authority.flush();
        assert_eq!(batch[0].event.kind(), EventKind::EntityAdded);
        assert_eq!(batch[0].event.entity(), Some(tap));

        mirror.apply_batch(&batch).unwrap();
        assert_eq!(mirror.storage(tap).map(|s| s.slots[0]), Some(l.water));
        assert_eq!(mirror.state_hash(), l.authority.state_hash());
    }

    #[test]
    fn pause_freezes_the_session() {
        let mut l = lab();
        l.fill_station(ALICE);
        l.authority.step(secs(0.5));
        let progress = l.authority.station(l.station).unwrap().progress();
        let time = l.authority.sim_state().time;

        l.authority.apply(BOB, &Intent::Pause).unwrap();
        assert!(l.authority.is_paused());
        assert_eq!(l.authority.apply(ALICE, &Intent::Pause), Err(Rejection::Paused));
        assert_eq!(
            l.authority
                .apply(ALICE, &Intent::TakeFromSlot { entity: l.shelf, index: 4 }),
            Err(Rejection::Paused)
        );

        for _ in 0..10 {
            l.authority.step(secs(1.0));
        }
        assert_eq!(l.authority.station(l.station).unwrap().progress(), progress);
        assert_eq!(l.authority.sim_state().time, time);

        l.authority.submit(ALICE, Intent::Resume);
        let batch = l.authority.step(secs(0.5));
        assert!(!l.authority.is_paused());
        assert!(
            batch
                .iter()
                .any(|r| r.event == ChangeEvent::PausedChanged { paused: false })
        );
        assert!(l.authority.station(l.station).unwrap().progress() > progress);
        assert_eq!(l.authority.apply(ALICE, &Intent::Resume), Err(Rejection::NotPaused));
    }

    #[test]
    fn pause_does_not_eat_the_grace_period() {
        let mut l = lab();
        l.fill_station(ALICE);
        l.authority.step(secs(2.0));
        l.authority.apply(ALICE, &Intent::Pause).unwrap();
        l.authority.step(secs(60.0));
        l.authority.apply(ALICE, &Intent::Resume).unwrap();
        l.authority.step(secs(1.0));
        assert_eq!(
            l.authority.station(l.station).unwrap().state(),
            WorkState::Completed
        );
    }

    #[test]
    fn goal_counts_deliveries() {
        let mut l = lab();
        l.authority.set_goal(GoalConfig {
            target: 1,
            time_limit: Some(secs(10.0)),
        });
        l.fill_station(ALICE);
        l.authority.step(secs(2.0));
        l.authority
            .apply(BOB, &Intent::CollectOutput { entity: l.station })
            .unwrap();
        l.authority
            .apply(BOB, &Intent::Deliver { entity: l.counter })
            .unwrap();

        let goal = l.authority.goal().unwrap();
        assert_eq!(goal.delivered(), 1);
        assert!(goal.is_complete());
        assert_eq!(goal.elapsed(), secs(2.0));

        // A met target outlives the clock.
        l.authority.step(secs(30.0));
        assert!(l.authority.goal().unwrap().is_active());
    }

    #[test]
    fn time_up_closes_delivery_points() {
        let mut l = lab();
        l.authority.set_goal(GoalConfig {
            target: 2,
            time_limit: Some(secs(3.0)),
        });
        l.fill_station(ALICE);
        l.authority.step(secs(2.0));
        l.authority
            .apply(BOB, &Intent::CollectOutput { entity: l.station })
            .unwrap();

        let batch = l.authority.step(secs(1.0));
        assert!(
            batch
                .iter()
                .any(|r| r.event == ChangeEvent::GoalActiveChanged { active: false })
        );
        let before = l.authority.snapshot();
        assert_eq!(
            l.authority.apply(BOB, &Intent::Deliver { entity: l.counter }),
            Err(Rejection::SessionEnded)
        );
        assert_eq!(l.authority.snapshot(), before);
        assert_eq!(l.authority.held(BOB), Some(l.salt));

        l.authority.reset_session();
        let goal = l.authority.goal().unwrap();
        assert!(goal.is_active());
        assert_eq!(goal.elapsed(), Fixed64::ZERO);
    }

    #[test]
    fn reset_unpauses() {
        let mut l = lab();
        l.authority.apply(ALICE, &Intent::Pause).unwrap();
        l.authority.flush();
        l.authority.reset_session();
        assert!(!l.authority.is_paused());
        assert_eq!(
            l.authority.flush().last().map(|r| r.event.clone()),
            Some(ChangeEvent::PausedChanged { paused: false })
        );
        assert_eq!(l.authority.state_hash(), l.fresh_hash);
    }

    #[test]
    fn snapshot_seq_tracks_emitted_events() {
        let mut l = lab();
        let seq = l.authority.snapshot().seq;
        l.authority
            .apply(ALICE, &Intent::TakeFromSlot { entity: l.shelf, index: 0 })
            .unwrap();
        assert_eq!(l.authority.snapshot().seq, seq + 2);
    }
}
