//! Timed intent scripts.
//!
//! A script names participants and lists actions keyed by the tick they
//! fire on. Entities and participants are referred to by name and resolved
//! against a loaded [`Session`] before the run starts.
//!
//! ```ron
//! (
//!     ticks: Some(100),
//!     participants: [(id: 1, name: "alice")],
//!     actions: [
//!         (at: 0, who: Some("alice"), action: Join),
//!         (at: 1, who: Some("alice"), action: Take(entity: "shelf", index: 0)),
//!     ],
//! )
//! ```

use labcraft_core::id::{EntityId, ParticipantId};
use labcraft_core::intent::Intent;
use labcraft_data::loader::{DataLoadError, deserialize_file};
use labcraft_data::Session;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Load(#[from] DataLoadError),
    #[error("tick {at}: unknown entity '{name}'")]
    UnknownEntity { at: u64, name: String },
    #[error("tick {at}: unknown participant '{name}'")]
    UnknownParticipant { at: u64, name: String },
    #[error("tick {at}: {action} needs a participant")]
    MissingParticipant { at: u64, action: &'static str },
    #[error("participant '{0}' declared twice")]
    DuplicateParticipant(String),
    #[error("tick {at} listed after tick {previous}")]
    Unordered { at: u64, previous: u64 },
}

// ===========================================================================
// File format
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Run length. The command line may override it.
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default)]
    pub participants: Vec<ParticipantDecl>,
    #[serde(default)]
    pub actions: Vec<ScriptEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantDecl {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEntry {
    pub at: u64,
    #[serde(default)]
    pub who: Option<String>,
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub enum Action {
    Join,
    Leave,
    Take { entity: String, index: usize },
    Deposit { entity: String },
    Start { entity: String },
    Cancel { entity: String },
    Collect { entity: String },
    CollectRemaining { entity: String },
    Deliver { entity: String },
    Pause,
    Resume,
    ResetSession,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Join => "Join",
            Action::Leave => "Leave",
            Action::Take { .. } => "Take",
            Action::Deposit { .. } => "Deposit",
            Action::Start { .. } => "Start",
            Action::Cancel { .. } => "Cancel",
            Action::Collect { .. } => "Collect",
            Action::CollectRemaining { .. } => "CollectRemaining",
            Action::Deliver { .. } => "Deliver",
            Action::Pause => "Pause",
            Action::Resume => "Resume",
            Action::ResetSession => "ResetSession",
        }
    }
}

// ===========================================================================
// Resolved form
// ===========================================================================

/// A script action with every name replaced by an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Join(ParticipantId),
    Leave(ParticipantId),
    Submit(ParticipantId, Intent),
    ResetSession,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedStep {
    pub at: u64,
    pub step: Step,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        Ok(deserialize_file(path)?)
    }

    /// Resolve every name against `session`. Entries must be in tick order.
    pub fn resolve(&self, session: &Session) -> Result<Vec<TimedStep>, ScriptError> {
        let mut participants: HashMap<&str, ParticipantId> = HashMap::new();
        for decl in &self.participants {
            if participants
                .insert(decl.name.as_str(), ParticipantId(decl.id))
                .is_some()
            {
                return Err(ScriptError::DuplicateParticipant(decl.name.clone()));
            }
        }

        let mut previous = 0;
        let mut steps = Vec::with_capacity(self.actions.len());
        for entry in &self.actions {
            if entry.at < previous {
                return Err(ScriptError::Unordered {
                    at: entry.at,
                    previous,
                });
            }
            previous = entry.at;

            let at = entry.at;
            let entity = |name: &str| -> Result<EntityId, ScriptError> {
                session
                    .entity(name)
                    .ok_or_else(|| ScriptError::UnknownEntity {
                        at,
                        name: name.to_string(),
                    })
            };
            let who = || -> Result<ParticipantId, ScriptError> {
                let name = entry.who.as_deref().ok_or(ScriptError::MissingParticipant {
                    at,
                    action: entry.action.name(),
                })?;
                participants
                    .get(name)
                    .copied()
                    .ok_or_else(|| ScriptError::UnknownParticipant {
                        at,
                        name: name.to_string(),
                    })
            };
            let submit = |intent: Intent| -> Result<Step, ScriptError> {
                Ok(Step::Submit(who()?, intent))
            };
            let step = match &entry.action {
                Action::ResetSession => Step::ResetSession,
                Action::Join => Step::Join(who()?),
                Action::Leave => Step::Leave(who()?),
                Action::Take { entity: e, index } => submit(Intent::TakeFromSlot {
                    entity: entity(e)?,
                    index: *index,
                })?,
                Action::Deposit { entity: e } => submit(Intent::DepositHeld { entity: entity(e)? })?,
                Action::Start { entity: e } => submit(Intent::StartWork { entity: entity(e)? })?,
                Action::Cancel { entity: e } => submit(Intent::CancelWork { entity: entity(e)? })?,
                Action::Collect { entity: e } => {
                    submit(Intent::CollectOutput { entity: entity(e)? })?
                }
                Action::CollectRemaining { entity: e } => {
                    submit(Intent::CollectRemaining { entity: entity(e)? })?
                }
                Action::Deliver { entity: e } => submit(Intent::Deliver { entity: entity(e)? })?,
                Action::Pause => submit(Intent::Pause)?,
                Action::Resume => submit(Intent::Resume)?,
            };
            steps.push(TimedStep { at, step });
        }
        Ok(steps)
    }
}
