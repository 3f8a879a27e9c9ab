//! Change notifications for replicated state.
//!
//! Every validated mutation on the authority produces one [`ChangeEvent`] per
//! modified field or slot. Events are stamped with a session-wide sequence
//! number and buffered in the [`EventBus`]; [`EventBus::deliver`] hands the
//! batch to every subscriber (observer mirrors, UI bridges, the transport)
//! in sequence order and returns it.
//!
//! Observers never write shared state, so delivery needs no conflict
//! resolution: applying events in sequence order reproduces the authority.

use crate::fixed::{Fixed64, Seconds, Ticks};
use crate::id::{EntityId, ItemId, ParticipantId};
use crate::snapshot::EntityView;
use crate::station::WorkState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Which slot inventory of an entity a slot event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryKind {
    /// A storage container's slots.
    Storage,
    /// A station's ingredient slots.
    StationInput,
    /// A station's product slots.
    StationOutput,
}

/// A single replicated field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// A new entity, with every replicated field as it was created. Its
    /// activation changes follow as ordinary events.
    EntityAdded {
        entity: EntityId,
        view: EntityView,
    },
    SlotChanged {
        entity: EntityId,
        inventory: InventoryKind,
        index: usize,
        item: ItemId,
    },
    WorkStateChanged {
        entity: EntityId,
        state: WorkState,
    },
    ProgressChanged {
        entity: EntityId,
        progress: Fixed64,
    },
    HeldItemChanged {
        participant: ParticipantId,
        item: ItemId,
    },
    ParticipantJoined {
        participant: ParticipantId,
    },
    ParticipantLeft {
        participant: ParticipantId,
    },
    Delivered {
        entity: EntityId,
        participant: ParticipantId,
        item: ItemId,
        total: u32,
    },
    DeliveryCountReset {
        entity: EntityId,
    },
    GoalStarted {
        target: u32,
        time_limit: Option<Seconds>,
    },
    GoalElapsedChanged {
        elapsed: Seconds,
    },
    GoalDeliveredChanged {
        delivered: u32,
    },
    GoalActiveChanged {
        active: bool,
    },
    PausedChanged {
        paused: bool,
    },
}

/// Discriminant tag for change events, used for subscriber filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EntityAdded,
    SlotChanged,
    WorkStateChanged,
    ProgressChanged,
    HeldItemChanged,
    ParticipantJoined,
    ParticipantLeft,
    Delivered,
    DeliveryCountReset,
    GoalStarted,
    GoalElapsedChanged,
    GoalDeliveredChanged,
    GoalActiveChanged,
    PausedChanged,
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::EntityAdded { .. } => EventKind::EntityAdded,
            ChangeEvent::SlotChanged { .. } => EventKind::SlotChanged,
            ChangeEvent::WorkStateChanged { .. } => EventKind::WorkStateChanged,
            ChangeEvent::ProgressChanged { .. } => EventKind::ProgressChanged,
            ChangeEvent::HeldItemChanged { .. } => EventKind::HeldItemChanged,
            ChangeEvent::ParticipantJoined { .. } => EventKind::ParticipantJoined,
            ChangeEvent::ParticipantLeft { .. } => EventKind::ParticipantLeft,
            ChangeEvent::Delivered { .. } => EventKind::Delivered,
            ChangeEvent::DeliveryCountReset { .. } => EventKind::DeliveryCountReset,
            ChangeEvent::GoalStarted { .. } => EventKind::GoalStarted,
            ChangeEvent::GoalElapsedChanged { .. } => EventKind::GoalElapsedChanged,
            ChangeEvent::GoalDeliveredChanged { .. } => EventKind::GoalDeliveredChanged,
            ChangeEvent::GoalActiveChanged { .. } => EventKind::GoalActiveChanged,
            ChangeEvent::PausedChanged { .. } => EventKind::PausedChanged,
        }
    }

    /// The entity this event belongs to, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            ChangeEvent::EntityAdded { entity, .. }
            | ChangeEvent::SlotChanged { entity, .. }
            | ChangeEvent::WorkStateChanged { entity, .. }
            | ChangeEvent::ProgressChanged { entity, .. }
            | ChangeEvent::Delivered { entity, .. }
            | ChangeEvent::DeliveryCountReset { entity } => Some(*entity),
            _ => None,
        }
    }
}

/// A change event as it travels to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replicated {
    /// Session-wide sequence number, starting at 1, no gaps.
    pub seq: u64,
    /// Authority tick during which the change happened.
    pub tick: Ticks,
    pub event: ChangeEvent,
}

// ---------------------------------------------------------------------------
// ChangeSet -- per-entity collector used while an intent executes
// ---------------------------------------------------------------------------

/// Collects the field changes made to one entity during a single operation.
///
/// Entities record into a `ChangeSet` only after all their guards pass, so a
/// rejected operation leaves it empty.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    entity: EntityId,
    events: Vec<ChangeEvent>,
}

impl ChangeSet {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            events: Vec::new(),
        }
    }

    pub fn slot(&mut self, inventory: InventoryKind, index: usize, item: ItemId) {
        self.events.push(ChangeEvent::SlotChanged {
            entity: self.entity,
            inventory,
            index,
            item,
        });
    }

    pub fn work_state(&mut self, state: WorkState) {
        self.events.push(ChangeEvent::WorkStateChanged {
            entity: self.entity,
            state,
        });
    }

    pub fn progress(&mut self, progress: Fixed64) {
        self.events.push(ChangeEvent::ProgressChanged {
            entity: self.entity,
            progress,
        });
    }

    pub fn delivered(&mut self, participant: ParticipantId, item: ItemId, total: u32) {
        self.events.push(ChangeEvent::Delivered {
            entity: self.entity,
            participant,
            item,
            total,
        });
    }

    pub fn delivery_reset(&mut self) {
        self.events.push(ChangeEvent::DeliveryCountReset {
            entity: self.entity,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A listener receives every delivered event it is not filtered from.
pub type ChangeListener = Box<dyn FnMut(&Replicated)>;

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&ChangeEvent) -> bool>;

/// Priority level for subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct SubscriberEntry {
    listener: ChangeListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field(
                "filter",
                &if self.filter.is_some() {
                    "Some(<fn>)"
                } else {
                    "None"
                },
            )
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Sequences, buffers and delivers change events.
#[derive(Debug, Default)]
pub struct EventBus {
    /// Events emitted since the last delivery, oldest first.
    pending: Vec<Replicated>,
    subscribers: Vec<SubscriberEntry>,
    /// Sequence number of the most recently emitted event (0 = none yet).
    last_seq: u64,
    next_insertion_order: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and buffer an event.
    pub fn emit(&mut self, event: ChangeEvent, tick: Ticks) {
        self.last_seq += 1;
        self.pending.push(Replicated {
            seq: self.last_seq,
            tick,
            event,
        });
    }

    /// Stamp and buffer a batch of events, preserving their order.
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = ChangeEvent>, tick: Ticks) {
        for event in events {
            self.emit(event, tick);
        }
    }

    /// Register a listener with Normal priority and no filter.
    pub fn subscribe(&mut self, listener: ChangeListener) {
        self.subscribe_filtered(SubscriberPriority::Normal, None, listener);
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn subscribe_filtered(
        &mut self,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: ChangeListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers.push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
        self.subscribers
            .sort_by_key(|entry| (entry.priority as u8, entry.insertion_order));
    }

    /// Hand every buffered event to the subscribers and return the batch.
    ///
    /// Each subscriber sees the events oldest-to-newest; subscribers run in
    /// `(priority, insertion_order)` order.
    pub fn deliver(&mut self) -> Vec<Replicated> {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            return batch;
        }

        for entry in &mut self.subscribers {
            for replicated in &batch {
                if let Some(ref filter) = entry.filter
                    && !filter(&replicated.event)
                {
                    continue;
                }
                (entry.listener)(replicated);
            }
        }

        batch
    }

    /// Events buffered since the last delivery.
    pub fn pending(&self) -> &[Replicated] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sequence number of the latest emitted event (0 before any event).
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn entity() -> EntityId {
        use slotmap::SlotMap;
        let mut sm = SlotMap::<EntityId, ()>::with_key();
        sm.insert(())
    }

    fn held(participant: u64, item: u16) -> ChangeEvent {
        ChangeEvent::HeldItemChanged {
            participant: ParticipantId(participant),
            item: ItemId(item),
        }
    }

    #[test]
    fn emit_assigns_consecutive_sequence_numbers() {
        let mut bus = EventBus::new();
        bus.emit(held(1, 3), 0);
        bus.emit(held(2, 4), 0);
        bus.emit(held(1, 0), 1);
        let seqs: Vec<u64> = bus.pending().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(bus.last_seq(), 3);
        assert_eq!(bus.pending()[2].tick, 1);
    }

    #[test]
    fn deliver_reaches_every_subscriber_in_order() {
        let mut bus = EventBus::new();
        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));
        let a = seen_a.clone();
        let b = seen_b.clone();
        bus.subscribe(Box::new(move |r| a.borrow_mut().push(r.seq)));
        bus.subscribe(Box::new(move |r| b.borrow_mut().push(r.seq)));

        bus.emit(held(1, 3), 0);
        bus.emit(held(2, 4), 0);
        let batch = bus.deliver();

        assert_eq!(batch.len(), 2);
        assert_eq!(*seen_a.borrow(), vec![1, 2]);
        assert_eq!(*seen_b.borrow(), vec![1, 2]);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn deliver_with_nothing_pending_is_empty() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(0));
        let c = calls.clone();
        bus.subscribe(Box::new(move |_| *c.borrow_mut() += 1));
        assert!(bus.deliver().is_empty());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn priority_orders_subscribers() {
        let mut bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        bus.subscribe_filtered(
            SubscriberPriority::Post,
            None,
            Box::new(move |_| l.borrow_mut().push("post")),
        );
        let l = log.clone();
        bus.subscribe(Box::new(move |_| l.borrow_mut().push("normal")));
        let l = log.clone();
        bus.subscribe_filtered(
            SubscriberPriority::Pre,
            None,
            Box::new(move |_| l.borrow_mut().push("pre")),
        );

        bus.emit(held(1, 1), 0);
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["pre", "normal", "post"]);
    }

    #[test]
    fn filter_skips_events() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe_filtered(
            SubscriberPriority::Normal,
            Some(Box::new(|e| e.kind() == EventKind::WorkStateChanged)),
            Box::new(move |r| s.borrow_mut().push(r.event.clone())),
        );

        let station = entity();
        bus.emit(held(1, 1), 0);
        bus.emit(
            ChangeEvent::WorkStateChanged {
                entity: station,
                state: WorkState::Working,
            },
            0,
        );
        bus.deliver();

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].entity(), Some(station));
    }

    #[test]
    fn change_set_records_in_order() {
        let station = entity();
        let mut changes = ChangeSet::new(station);
        assert!(changes.is_empty());
        changes.slot(InventoryKind::StationInput, 2, ItemId(5));
        changes.work_state(WorkState::Working);
        changes.progress(Fixed64::ZERO);
        let kinds: Vec<EventKind> = changes.events().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::SlotChanged,
                EventKind::WorkStateChanged,
                EventKind::ProgressChanged
            ]
        );
        assert!(changes.into_events().iter().all(|e| e.entity() == Some(station)));
    }
}
