//! Delivery points: where finished products leave the simulation.
//!
//! Delivered items are handed to the scoring collaborator through the
//! replicated [`Delivered`](crate::event::ChangeEvent::Delivered) event; the
//! point itself only keeps a running count.

use crate::event::ChangeSet;
use crate::id::{ItemId, ParticipantId};
use crate::intent::Rejection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Items this point takes. Empty means any item.
    pub accepted: Vec<ItemId>,
}

#[derive(Debug, Clone)]
pub struct DeliveryPoint {
    config: DeliveryConfig,
    delivered: u32,
}

impl DeliveryPoint {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            delivered: 0,
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    pub fn accepts(&self, item: ItemId) -> bool {
        !item.is_empty() && (self.config.accepted.is_empty() || self.config.accepted.contains(&item))
    }

    /// Record a delivery. The caller clears the participant's hand.
    pub fn deliver(
        &mut self,
        participant: ParticipantId,
        item: ItemId,
        changes: &mut ChangeSet,
    ) -> Result<u32, Rejection> {
        if !self.accepts(item) {
            return Err(Rejection::NotAccepted(item));
        }
        self.delivered = self.delivered.saturating_add(1);
        changes.delivered(participant, item, self.delivered);
        Ok(self.delivered)
    }

    /// Zero the counter for a new session.
    pub fn reset(&mut self, changes: &mut ChangeSet) {
        if self.delivered != 0 {
            self.delivered = 0;
            changes.delivery_reset();
        }
    }
}
