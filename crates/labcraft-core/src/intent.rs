//! Participant intents and the queue they wait in.
//!
//! An intent is a request to mutate shared state. It names the target entity
//! but carries no item ids: the authority reads the current slot and hand
//! contents when it executes the intent, so a request built from a stale
//! mirror is simply rejected. The sender is attached by the transport
//! ([`Envelope`]) and is never trusted from the payload.

use crate::id::{EntityId, ItemId, ParticipantId};
use crate::station::WorkState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Intent enum
// ---------------------------------------------------------------------------

/// A single request a participant can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Move the item in `index` of a storage container or station input into
    /// the sender's empty hand.
    TakeFromSlot { entity: EntityId, index: usize },
    /// Place the sender's held item into the first empty slot.
    DepositHeld { entity: EntityId },
    /// Ask an idle station to match a recipe and begin working.
    StartWork { entity: EntityId },
    /// Abort a working station, keeping its inputs.
    CancelWork { entity: EntityId },
    /// Take one product from a completed station.
    CollectOutput { entity: EntityId },
    /// Take one leftover item from a failed station.
    CollectRemaining { entity: EntityId },
    /// Hand the held item to a delivery point.
    Deliver { entity: EntityId },
    /// Freeze the session: station work and the goal clock stop, and only
    /// [`Resume`](Intent::Resume) is accepted until it arrives.
    Pause,
    Resume,
}

impl Intent {
    /// The targeted entity. Session-wide intents have none.
    pub fn entity(&self) -> Option<EntityId> {
        let entity = match self {
            Intent::TakeFromSlot { entity, .. }
            | Intent::DepositHeld { entity }
            | Intent::StartWork { entity }
            | Intent::CancelWork { entity }
            | Intent::CollectOutput { entity }
            | Intent::CollectRemaining { entity }
            | Intent::Deliver { entity } => *entity,
            Intent::Pause | Intent::Resume => return None,
        };
        Some(entity)
    }
}

/// An intent together with the participant the transport says sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: ParticipantId,
    pub intent: Intent,
}

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// Why an intent was not applied. Rejections never reach the sender; they
/// are logged by the authority and returned to in-process callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("unknown entity")]
    UnknownEntity,
    #[error("unknown participant {0:?}")]
    UnknownParticipant(ParticipantId),
    #[error("entity does not accept this intent")]
    Unsupported,
    #[error("slot index {0} is out of range")]
    SlotOutOfRange(usize),
    #[error("slot {0} is empty")]
    SlotEmpty(usize),
    #[error("no empty slot")]
    NoEmptySlot,
    #[error("requester is already holding an item")]
    AlreadyHolding,
    #[error("requester is not holding anything")]
    NotHolding,
    #[error("station is {0:?}")]
    WrongState(WorkState),
    #[error("no recipe is satisfied by the current slots")]
    NoRecipeMatch,
    #[error("nothing left to collect")]
    NothingToCollect,
    #[error("item {0:?} is not accepted here")]
    NotAccepted(ItemId),
    #[error("infinite-supply storage does not take deposits")]
    InfiniteSupply,
    #[error("session is paused")]
    Paused,
    #[error("session is not paused")]
    NotPaused,
    #[error("session has ended")]
    SessionEnded,
}

// ---------------------------------------------------------------------------
// IntentQueue
// ---------------------------------------------------------------------------

/// Intents waiting for the next authority step, in arrival order.
///
/// Optionally keeps a bounded history of drained intents for replay and
/// debugging.
#[derive(Debug, Default)]
pub struct IntentQueue {
    pending: Vec<Envelope>,
    /// Executed intents: (tick, envelope).
    history: Vec<(u64, Envelope)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, envelope: Envelope) {
        self.pending.push(envelope);
    }

    pub fn push_batch(&mut self, envelopes: impl IntoIterator<Item = Envelope>) {
        self.pending.extend(envelopes);
    }

    /// Drain all pending intents, recording them in history under `tick`.
    /// Returns them in arrival order.
    pub fn drain(&mut self, tick: u64) -> Vec<Envelope> {
        let envelopes: Vec<Envelope> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            for envelope in &envelopes {
                self.history.push((tick, envelope.clone()));
            }
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        envelopes
    }

    /// Drop queued intents from one sender (used when a participant leaves).
    pub fn discard_from(&mut self, sender: ParticipantId) {
        self.pending.retain(|e| e.sender != sender);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(u64, Envelope)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
