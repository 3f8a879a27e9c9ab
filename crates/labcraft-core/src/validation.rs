//! Convergence checks between the authority and observer mirrors.
//!
//! [`quick_compare`] answers "are they the same?" with one hash each;
//! [`diff_mirror`] says where they differ.

use crate::authority::Authority;
use crate::goal::GoalView;
use crate::id::{EntityId, ItemId, ParticipantId};
use crate::mirror::Mirror;
use crate::snapshot::{EntityView, WorldSnapshot};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Diff types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Entity exists only on the authority.
    MissingEntity(EntityId),
    /// Entity exists only on the mirror.
    ExtraEntity(EntityId),
    /// Entity exists on both sides with different replicated fields.
    EntityMismatch {
        entity: EntityId,
        fields: Vec<&'static str>,
    },
    MissingParticipant(ParticipantId),
    ExtraParticipant(ParticipantId),
    HeldMismatch {
        participant: ParticipantId,
        authority: ItemId,
        mirror: ItemId,
    },
    /// Goal fields differ, or the goal exists on one side only (`"goal"`).
    GoalMismatch { fields: Vec<&'static str> },
    PausedMismatch { authority: bool, mirror: bool },
}

#[derive(Debug, Clone, Default)]
pub struct MirrorDiff {
    pub divergences: Vec<Divergence>,
}

impl MirrorDiff {
    pub fn is_identical(&self) -> bool {
        self.divergences.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Hash-level comparison.
pub fn quick_compare(authority: &Authority, mirror: &Mirror) -> bool {
    authority.state_hash() == mirror.state_hash()
}

pub fn diff_mirror(authority: &Authority, mirror: &Mirror) -> MirrorDiff {
    diff_snapshots(&authority.snapshot(), &mirror.snapshot())
}

/// Field-level diff; `a` plays the authority, `b` the mirror.
pub fn diff_snapshots(a: &WorldSnapshot, b: &WorldSnapshot) -> MirrorDiff {
    let mut divergences = Vec::new();

    let a_entities: BTreeMap<EntityId, &EntityView> =
        a.entities.iter().map(|(id, v)| (*id, v)).collect();
    let b_entities: BTreeMap<EntityId, &EntityView> =
        b.entities.iter().map(|(id, v)| (*id, v)).collect();

    for (&id, &view_a) in &a_entities {
        match b_entities.get(&id) {
            None => divergences.push(Divergence::MissingEntity(id)),
            Some(&view_b) => {
                let fields = mismatched_fields(view_a, view_b);
                if !fields.is_empty() {
                    divergences.push(Divergence::EntityMismatch { entity: id, fields });
                }
            }
        }
    }
    for &id in b_entities.keys() {
        if !a_entities.contains_key(&id) {
            divergences.push(Divergence::ExtraEntity(id));
        }
    }

    let a_hands: BTreeMap<ParticipantId, ItemId> = a.hands.iter().copied().collect();
    let b_hands: BTreeMap<ParticipantId, ItemId> = b.hands.iter().copied().collect();
    for (&participant, &held_a) in &a_hands {
        match b_hands.get(&participant) {
            None => divergences.push(Divergence::MissingParticipant(participant)),
            Some(&held_b) if held_a != held_b => divergences.push(Divergence::HeldMismatch {
                participant,
                authority: held_a,
                mirror: held_b,
            }),
            Some(_) => {}
        }
    }
    for &participant in b_hands.keys() {
        if !a_hands.contains_key(&participant) {
            divergences.push(Divergence::ExtraParticipant(participant));
        }
    }

    let goal_fields = mismatched_goal(a.goal.as_ref(), b.goal.as_ref());
    if !goal_fields.is_empty() {
        divergences.push(Divergence::GoalMismatch {
            fields: goal_fields,
        });
    }
    if a.paused != b.paused {
        divergences.push(Divergence::PausedMismatch {
            authority: a.paused,
            mirror: b.paused,
        });
    }

    MirrorDiff { divergences }
}

fn mismatched_goal(a: Option<&GoalView>, b: Option<&GoalView>) -> Vec<&'static str> {
    let (a, b) = match (a, b) {
        (None, None) => return Vec::new(),
        (Some(a), Some(b)) => (a, b),
        _ => return vec!["goal"],
    };
    let checks = [
        ("target", a.target != b.target),
        ("time_limit", a.time_limit != b.time_limit),
        ("elapsed", a.elapsed != b.elapsed),
        ("delivered", a.delivered != b.delivered),
        ("active", a.active != b.active),
    ];
    checks
        .into_iter()
        .filter_map(|(field, differs)| differs.then_some(field))
        .collect()
}

fn mismatched_fields(a: &EntityView, b: &EntityView) -> Vec<&'static str> {
    let mut fields = Vec::new();
    match (a, b) {
        (EntityView::Station(a), EntityView::Station(b)) => {
            if a.input != b.input {
                fields.push("input");
            }
            if a.output != b.output {
                fields.push("output");
            }
            if a.state != b.state {
                fields.push("state");
            }
            if a.progress != b.progress {
                fields.push("progress");
            }
        }
        (EntityView::Storage(a), EntityView::Storage(b)) => {
            if a.slots != b.slots {
                fields.push("slots");
            }
        }
        (EntityView::Delivery(a), EntityView::Delivery(b)) => {
            if a.delivered != b.delivered {
                fields.push("delivered");
            }
        }
        _ => fields.push("kind"),
    }
    fields
}
