//! Point-in-time copies of the replicated state.
//!
//! A [`WorldSnapshot`] is what a late-joining observer receives before it
//! starts applying change events, and what convergence checks compare. It
//! contains only replicated fields: recipe bindings, timestamps and station
//! configuration stay on the authority.

use crate::fixed::{Fixed64, Ticks};
use crate::goal::GoalView;
use crate::id::{EntityId, ItemId, ParticipantId};
use crate::station::WorkState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationView {
    pub input: Vec<ItemId>,
    pub output: Vec<ItemId>,
    pub state: WorkState,
    pub progress: Fixed64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageView {
    pub slots: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryView {
    pub delivered: u32,
}

/// The replicated fields of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityView {
    Station(StationView),
    Storage(StorageView),
    Delivery(DeliveryView),
}

impl EntityView {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EntityView::Station(_) => "station",
            EntityView::Storage(_) => "storage",
            EntityView::Delivery(_) => "delivery",
        }
    }

    fn hash_into(&self, h: &mut Fnv1a) {
        match self {
            EntityView::Station(s) => {
                h.put([0u8]);
                hash_slots(h, &s.input);
                hash_slots(h, &s.output);
                h.put([s.state as u8]);
                h.put(s.progress.to_bits().to_le_bytes());
            }
            EntityView::Storage(s) => {
                h.put([1u8]);
                hash_slots(h, &s.slots);
            }
            EntityView::Delivery(d) => {
                h.put([2u8]);
                h.put(d.delivered.to_le_bytes());
            }
        }
    }
}

fn hash_slots(h: &mut Fnv1a, slots: &[ItemId]) {
    h.put((slots.len() as u32).to_le_bytes());
    for item in slots {
        h.put(item.0.to_le_bytes());
    }
}

fn hash_goal(h: &mut Fnv1a, goal: &GoalView) {
    h.put(goal.target.to_le_bytes());
    match goal.time_limit {
        Some(limit) => {
            h.put([1u8]);
            h.put(limit.to_bits().to_le_bytes());
        }
        None => h.put([0u8]),
    }
    h.put(goal.elapsed.to_bits().to_le_bytes());
    h.put(goal.delivered.to_le_bytes());
    h.put([goal.active as u8]);
}

/// 64-bit FNV-1a. Not cryptographic; multi-byte values go in little-endian
/// so hashes agree across platforms.
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    fn put(&mut self, bytes: impl AsRef<[u8]>) {
        for &b in bytes.as_ref() {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
}

/// Every replicated field at sequence number `seq`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Last change event already reflected in this snapshot.
    pub seq: u64,
    pub tick: Ticks,
    /// Sorted by entity id.
    pub entities: Vec<(EntityId, EntityView)>,
    /// Sorted by participant id.
    pub hands: Vec<(ParticipantId, ItemId)>,
    /// `None` for sessions without a goal.
    pub goal: Option<GoalView>,
    pub paused: bool,
}

impl WorldSnapshot {
    /// FNV-1a over the replicated fields. Sequence number and tick are left
    /// out so an authority and a caught-up mirror hash equal.
    pub fn state_hash(&self) -> u64 {
        let mut h = Fnv1a::new();
        h.put((self.entities.len() as u32).to_le_bytes());
        for (id, view) in &self.entities {
            h.put(slotmap::Key::data(id).as_ffi().to_le_bytes());
            view.hash_into(&mut h);
        }
        h.put((self.hands.len() as u32).to_le_bytes());
        for (participant, item) in &self.hands {
            h.put(participant.0.to_le_bytes());
            h.put(item.0.to_le_bytes());
        }
        match &self.goal {
            Some(goal) => {
                h.put([1u8]);
                hash_goal(&mut h, goal);
            }
            None => h.put([0u8]),
        }
        h.put([self.paused as u8]);
        h.0
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityView> {
        self.entities
            .binary_search_by_key(&id, |(e, _)| *e)
            .ok()
            .map(|i| &self.entities[i].1)
    }

    pub fn held(&self, participant: ParticipantId) -> Option<ItemId> {
        self.hands
            .binary_search_by_key(&participant, |(p, _)| *p)
            .ok()
            .map(|i| self.hands[i].1)
    }
}
