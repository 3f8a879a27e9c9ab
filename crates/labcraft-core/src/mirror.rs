//! Read-only observer shadow of the authority's replicated state.
//!
//! A mirror starts from a [`WorldSnapshot`] and only ever changes by applying
//! [`Replicated`] events in sequence order. Events already covered by the
//! snapshot (or applied earlier) are skipped, which makes redelivery harmless;
//! a missing sequence number means the mirror can no longer be trusted and
//! must be rebuilt from a fresh snapshot.

use crate::event::{ChangeEvent, InventoryKind, Replicated};
use crate::fixed::Ticks;
use crate::goal::GoalView;
use crate::id::{EntityId, ItemId, ParticipantId};
use crate::snapshot::{DeliveryView, EntityView, StationView, StorageView, WorldSnapshot};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MirrorError {
    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },
    #[error("event for unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("event does not apply to {kind} entity {entity:?}")]
    KindMismatch { entity: EntityId, kind: &'static str },
    #[error("slot {index} out of range on {entity:?}")]
    SlotOutOfRange { entity: EntityId, index: usize },
    #[error("goal event before the goal was started")]
    NoGoal,
}

#[derive(Debug, Clone, Default)]
pub struct Mirror {
    last_seq: u64,
    tick: Ticks,
    entities: BTreeMap<EntityId, EntityView>,
    hands: BTreeMap<ParticipantId, ItemId>,
    goal: Option<GoalView>,
    paused: bool,
}

impl Mirror {
    pub fn from_snapshot(snapshot: WorldSnapshot) -> Self {
        Self {
            last_seq: snapshot.seq,
            tick: snapshot.tick,
            entities: snapshot.entities.into_iter().collect(),
            hands: snapshot.hands.into_iter().collect(),
            goal: snapshot.goal,
            paused: snapshot.paused,
        }
    }

    /// Apply one event. Returns `Ok(false)` for an event that was already
    /// applied. On error the mirror is unchanged.
    pub fn apply(&mut self, replicated: &Replicated) -> Result<bool, MirrorError> {
        if replicated.seq <= self.last_seq {
            return Ok(false);
        }
        let expected = self.last_seq + 1;
        if replicated.seq != expected {
            return Err(MirrorError::SequenceGap {
                expected,
                got: replicated.seq,
            });
        }

        self.apply_event(&replicated.event)?;
        self.last_seq = replicated.seq;
        self.tick = replicated.tick;
        Ok(true)
    }

    /// Apply a batch in order, stopping at the first error. Returns the
    /// number of events that changed the mirror.
    pub fn apply_batch(&mut self, batch: &[Replicated]) -> Result<usize, MirrorError> {
        let mut applied = 0;
        for replicated in batch {
            if self.apply(replicated)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn apply_event(&mut self, event: &ChangeEvent) -> Result<(), MirrorError> {
        match *event {
            ChangeEvent::EntityAdded { entity, ref view } => {
                self.entities.insert(entity, view.clone());
            }
            ChangeEvent::SlotChanged {
                entity,
                inventory,
                index,
                item,
            } => {
                let view = self.view_mut(entity)?;
                let slots = match (inventory, view) {
                    (InventoryKind::Storage, EntityView::Storage(s)) => &mut s.slots,
                    (InventoryKind::StationInput, EntityView::Station(s)) => &mut s.input,
                    (InventoryKind::StationOutput, EntityView::Station(s)) => &mut s.output,
                    (_, other) => {
                        return Err(MirrorError::KindMismatch {
                            entity,
                            kind: other.kind_name(),
                        });
                    }
                };
                let slot = slots
                    .get_mut(index)
                    .ok_or(MirrorError::SlotOutOfRange { entity, index })?;
                *slot = item;
            }
            ChangeEvent::WorkStateChanged { entity, state } => {
                self.station_mut(entity)?.state = state;
            }
            ChangeEvent::ProgressChanged { entity, progress } => {
                self.station_mut(entity)?.progress = progress;
            }
            ChangeEvent::HeldItemChanged { participant, item } => {
                self.hands.insert(participant, item);
            }
            ChangeEvent::ParticipantJoined { participant } => {
                self.hands.insert(participant, ItemId::EMPTY);
            }
            ChangeEvent::ParticipantLeft { participant } => {
                self.hands.remove(&participant);
            }
            ChangeEvent::Delivered { entity, total, .. } => {
                self.delivery_mut(entity)?.delivered = total;
            }
            ChangeEvent::DeliveryCountReset { entity } => {
                self.delivery_mut(entity)?.delivered = 0;
            }
            ChangeEvent::GoalStarted { target, time_limit } => {
                self.goal = Some(GoalView::started(target, time_limit));
            }
            ChangeEvent::GoalElapsedChanged { elapsed } => {
                self.goal_mut()?.elapsed = elapsed;
            }
            ChangeEvent::GoalDeliveredChanged { delivered } => {
                self.goal_mut()?.delivered = delivered;
            }
            ChangeEvent::GoalActiveChanged { active } => {
                self.goal_mut()?.active = active;
            }
            ChangeEvent::PausedChanged { paused } => {
                self.paused = paused;
            }
        }
        Ok(())
    }

    fn goal_mut(&mut self) -> Result<&mut GoalView, MirrorError> {
        self.goal.as_mut().ok_or(MirrorError::NoGoal)
    }

    fn view_mut(&mut self, entity: EntityId) -> Result<&mut EntityView, MirrorError> {
        self.entities
            .get_mut(&entity)
            .ok_or(MirrorError::UnknownEntity(entity))
    }

    fn station_mut(&mut self, entity: EntityId) -> Result<&mut StationView, MirrorError> {
        match self.view_mut(entity)? {
            EntityView::Station(s) => Ok(s),
            other => Err(MirrorError::KindMismatch {
                entity,
                kind: other.kind_name(),
            }),
        }
    }

    fn delivery_mut(&mut self, entity: EntityId) -> Result<&mut DeliveryView, MirrorError> {
        match self.view_mut(entity)? {
            EntityView::Delivery(d) => Ok(d),
            other => Err(MirrorError::KindMismatch {
                entity,
                kind: other.kind_name(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Sequence number of the last applied event.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityView> {
        self.entities.get(&id)
    }

    pub fn station(&self, id: EntityId) -> Option<&StationView> {
        match self.entities.get(&id)? {
            EntityView::Station(s) => Some(s),
            _ => None,
        }
    }

    pub fn storage(&self, id: EntityId) -> Option<&StorageView> {
        match self.entities.get(&id)? {
            EntityView::Storage(s) => Some(s),
            _ => None,
        }
    }

    pub fn delivery(&self, id: EntityId) -> Option<&DeliveryView> {
        match self.entities.get(&id)? {
            EntityView::Delivery(d) => Some(d),
            _ => None,
        }
    }

    pub fn held(&self, participant: ParticipantId) -> Option<ItemId> {
        self.hands.get(&participant).copied()
    }

    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.hands.keys().copied()
    }

    pub fn goal(&self) -> Option<&GoalView> {
        self.goal.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            seq: self.last_seq,
            tick: self.tick,
            entities: self
                .entities
                .iter()
                .map(|(id, view)| (*id, view.clone()))
                .collect(),
            hands: self.hands.iter().map(|(p, item)| (*p, *item)).collect(),
            goal: self.goal.clone(),
            paused: self.paused,
        }
    }

    pub fn state_hash(&self) -> u64 {
        self.snapshot().state_hash()
    }
}
