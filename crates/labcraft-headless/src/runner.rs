//! The headless run loop.
//!
//! Each tick:
//!
//! 1. Fire the script steps due this tick. Intents travel as wire frames,
//!    the way a transport would carry them from a client.
//! 2. Step the authority by one tick length.
//! 3. Encode the step's event batch once and decode it for every observer.
//!    Observers that have not joined yet receive a snapshot frame instead.
//! 4. Compare every observer mirror against the authority.

use crate::script::{Step, TimedStep};
use labcraft_core::authority::Authority;
use labcraft_core::event::Replicated;
use labcraft_core::goal::GoalView;
use labcraft_core::mirror::{Mirror, MirrorError};
use labcraft_core::snapshot::WorldSnapshot;
use labcraft_core::validation::{Divergence, diff_mirror, quick_compare};
use labcraft_core::wire::{self, WireError, WireMessage};
use labcraft_data::Session;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("expected a {expected} frame, got {got}")]
    UnexpectedFrame {
        expected: &'static str,
        got: &'static str,
    },
    #[error("observer '{observer}' failed at tick {tick}: {source}")]
    Mirror {
        observer: String,
        tick: u64,
        #[source]
        source: MirrorError,
    },
    #[error("observer '{observer}' diverged at tick {tick}: {divergences:?}")]
    Diverged {
        observer: String,
        tick: u64,
        divergences: Vec<Divergence>,
    },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub ticks: u64,
    /// Observers present from the first tick.
    pub observers: usize,
    /// Add one more observer that joins from a snapshot at this tick.
    pub late_observer_at: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticks: 100,
            observers: 1,
            late_observer_at: None,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub ticks: u64,
    pub events: u64,
    pub frames: u64,
    pub bytes: u64,
    pub resyncs: u32,
    pub observers: usize,
    /// Delivery counts by entity name, sorted by name.
    pub deliveries: Vec<(String, u32)>,
    pub participants: usize,
    /// Final goal state, for sessions that have one.
    pub goal: Option<GoalView>,
    pub paused: bool,
    pub state_hash: u64,
}

struct Observer {
    name: String,
    joins_at: u64,
    mirror: Option<Mirror>,
}

impl Observer {
    fn new(name: String, joins_at: u64) -> Self {
        Self {
            name,
            joins_at,
            mirror: None,
        }
    }
}

/// Drives a session through a resolved script.
pub struct Runner {
    session: Session,
    steps: Vec<TimedStep>,
    cursor: usize,
    observers: Vec<Observer>,
    report: RunReport,
}

impl Runner {
    pub fn new(session: Session, steps: Vec<TimedStep>, config: &RunConfig) -> Self {
        let mut observers: Vec<Observer> = (0..config.observers)
            .map(|i| Observer::new(format!("observer-{i}"), 0))
            .collect();
        if let Some(at) = config.late_observer_at {
            observers.push(Observer::new("late-observer".to_string(), at));
        }
        let report = RunReport {
            observers: observers.len(),
            ..RunReport::default()
        };
        Self {
            session,
            steps,
            cursor: 0,
            observers,
            report,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn authority(&self) -> &Authority {
        &self.session.authority
    }

    /// Run `ticks` authority steps, stopping at the first divergence.
    pub fn run(&mut self, ticks: u64) -> Result<RunReport, RunError> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(self.finish())
    }

    /// One authority step with replication and verification.
    pub fn tick(&mut self) -> Result<(), RunError> {
        let tick = self.report.ticks;
        self.fire_due_steps(tick)?;

        let dt = self.session.step_duration();
        let batch = self.session.authority.step(dt);
        self.report.events += batch.len() as u64;
        self.replicate(tick, &batch)?;
        self.verify(tick)?;

        self.report.ticks += 1;
        Ok(())
    }

    fn fire_due_steps(&mut self, tick: u64) -> Result<(), RunError> {
        while let Some(timed) = self.steps.get(self.cursor) {
            if timed.at > tick {
                break;
            }
            self.cursor += 1;
            let authority = &mut self.session.authority;
            match &timed.step {
                Step::Join(who) => {
                    authority.add_participant(*who);
                }
                Step::Leave(who) => {
                    authority.remove_participant(*who);
                }
                Step::ResetSession => {
                    info!(tick, "session reset");
                    authority.reset_session();
                }
                Step::Submit(who, intent) => {
                    let frame = wire::encode(&WireMessage::Intent(intent.clone()))?;
                    self.report.frames += 1;
                    self.report.bytes += frame.len() as u64;
                    match wire::decode(&frame)? {
                        WireMessage::Intent(intent) => authority.submit(*who, intent),
                        other => {
                            return Err(RunError::UnexpectedFrame {
                                expected: "intent",
                                got: frame_kind(&other),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn replicate(&mut self, tick: u64, batch: &[Replicated]) -> Result<(), RunError> {
        let mut batch_frame: Option<Vec<u8>> = None;
        for observer in &mut self.observers {
            if observer.mirror.is_none() {
                if tick >= observer.joins_at {
                    let snapshot = self.session.authority.snapshot();
                    let frame = wire::encode(&WireMessage::Snapshot(snapshot))?;
                    self.report.frames += 1;
                    self.report.bytes += frame.len() as u64;
                    observer.mirror = Some(Mirror::from_snapshot(decode_snapshot(&frame)?));
                    debug!(observer = %observer.name, tick, "observer joined");
                }
                continue;
            }
            if batch.is_empty() {
                continue;
            }

            if batch_frame.is_none() {
                let frame = wire::encode(&WireMessage::Batch(batch.to_vec()))?;
                self.report.frames += 1;
                self.report.bytes += frame.len() as u64;
                batch_frame = Some(frame);
            }
            let events = match batch_frame.as_deref().map(wire::decode).transpose()? {
                Some(WireMessage::Batch(events)) => events,
                Some(other) => {
                    return Err(RunError::UnexpectedFrame {
                        expected: "batch",
                        got: frame_kind(&other),
                    });
                }
                None => continue,
            };

            let Some(mirror) = observer.mirror.as_mut() else {
                continue;
            };
            match mirror.apply_batch(&events) {
                Ok(_) => {}
                Err(MirrorError::SequenceGap { expected, got }) => {
                    warn!(
                        observer = %observer.name,
                        expected,
                        got,
                        "sequence gap, resyncing"
                    );
                    *mirror = Mirror::from_snapshot(self.session.authority.snapshot());
                    self.report.resyncs += 1;
                }
                Err(source) => {
                    return Err(RunError::Mirror {
                        observer: observer.name.clone(),
                        tick,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn verify(&self, tick: u64) -> Result<(), RunError> {
        let authority = &self.session.authority;
        for observer in &self.observers {
            let Some(mirror) = &observer.mirror else {
                continue;
            };
            if quick_compare(authority, mirror) {
                continue;
            }
            let diff = diff_mirror(authority, mirror);
            return Err(RunError::Diverged {
                observer: observer.name.clone(),
                tick,
                divergences: diff.divergences,
            });
        }
        Ok(())
    }

    fn finish(&self) -> RunReport {
        let authority = &self.session.authority;
        let mut deliveries: Vec<(String, u32)> = self
            .session
            .entity_names()
            .filter_map(|name| {
                let id = self.session.entity(name)?;
                let point = authority.delivery(id)?;
                Some((name.to_string(), point.delivered()))
            })
            .collect();
        deliveries.sort();

        RunReport {
            deliveries,
            participants: authority.participants().count(),
            goal: authority.goal().map(|goal| goal.view()),
            paused: authority.is_paused(),
            state_hash: authority.state_hash(),
            ..self.report.clone()
        }
    }
}

fn decode_snapshot(frame: &[u8]) -> Result<WorldSnapshot, RunError> {
    match wire::decode(frame)? {
        WireMessage::Snapshot(snapshot) => Ok(snapshot),
        other => Err(RunError::UnexpectedFrame {
            expected: "snapshot",
            got: frame_kind(&other),
        }),
    }
}

fn frame_kind(message: &WireMessage) -> &'static str {
    match message {
        WireMessage::Snapshot(_) => "snapshot",
        WireMessage::Batch(_) => "batch",
        WireMessage::Intent(_) => "intent",
    }
}
