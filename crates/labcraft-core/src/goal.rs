//! Session goal: a delivery target with an optional time limit.
//!
//! The goal owns the session clock the players race against. While it is
//! active, every accepted delivery counts toward `target`. When the clock
//! reaches `time_limit` with the target still unmet, the goal deactivates
//! and delivery points stop accepting items until the session is reset.
//! A met target keeps the session open.

use crate::event::ChangeEvent;
use crate::fixed::{Fixed64, Seconds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalConfig {
    /// Deliveries needed to complete the session.
    pub target: u32,
    /// Session length. `None` never runs out.
    pub time_limit: Option<Seconds>,
}

/// The replicated fields of the session goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalView {
    pub target: u32,
    pub time_limit: Option<Seconds>,
    pub elapsed: Seconds,
    pub delivered: u32,
    pub active: bool,
}

impl GoalView {
    /// A freshly started goal.
    pub fn started(target: u32, time_limit: Option<Seconds>) -> Self {
        Self {
            target,
            time_limit,
            elapsed: Fixed64::ZERO,
            delivered: 0,
            active: true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.delivered >= self.target
    }

    /// Time left on the clock, or `None` without a time limit.
    pub fn remaining(&self) -> Option<Seconds> {
        self.time_limit
            .map(|limit| limit.saturating_sub(self.elapsed).max(Fixed64::ZERO))
    }
}

#[derive(Debug, Clone)]
pub struct SessionGoal {
    config: GoalConfig,
    elapsed: Seconds,
    delivered: u32,
    active: bool,
}

impl SessionGoal {
    /// Start the goal. The caller replicates it with [`started_event`](Self::started_event).
    pub fn new(config: GoalConfig) -> Self {
        Self {
            config,
            elapsed: Fixed64::ZERO,
            delivered: 0,
            active: true,
        }
    }

    pub fn config(&self) -> &GoalConfig {
        &self.config
    }

    pub fn started_event(&self) -> ChangeEvent {
        ChangeEvent::GoalStarted {
            target: self.config.target,
            time_limit: self.config.time_limit,
        }
    }

    pub fn elapsed(&self) -> Seconds {
        self.elapsed
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_complete(&self) -> bool {
        self.delivered >= self.config.target
    }

    pub fn is_time_up(&self) -> bool {
        self.config
            .time_limit
            .is_some_and(|limit| self.elapsed >= limit)
    }

    pub fn view(&self) -> GoalView {
        GoalView {
            target: self.config.target,
            time_limit: self.config.time_limit,
            elapsed: self.elapsed,
            delivered: self.delivered,
            active: self.active,
        }
    }

    /// Count one delivery. Returns `true` when it is the one that meets the
    /// target.
    pub fn record_delivery(&mut self, events: &mut Vec<ChangeEvent>) -> bool {
        let was_complete = self.is_complete();
        self.delivered = self.delivered.saturating_add(1);
        events.push(ChangeEvent::GoalDeliveredChanged {
            delivered: self.delivered,
        });
        !was_complete && self.is_complete()
    }

    /// Run the clock for `dt`. Returns `true` if time ran out on this call.
    pub fn tick(&mut self, dt: Seconds, events: &mut Vec<ChangeEvent>) -> bool {
        if !self.active {
            return false;
        }
        if dt > Fixed64::ZERO {
            self.elapsed = self.elapsed.saturating_add(dt);
            events.push(ChangeEvent::GoalElapsedChanged {
                elapsed: self.elapsed,
            });
        }
        if self.is_time_up() && !self.is_complete() {
            self.active = false;
            events.push(ChangeEvent::GoalActiveChanged { active: false });
            return true;
        }
        false
    }

    /// Restart the clock and the count. Only changed fields are reported.
    pub fn reset(&mut self, events: &mut Vec<ChangeEvent>) {
        if self.elapsed != Fixed64::ZERO {
            self.elapsed = Fixed64::ZERO;
            events.push(ChangeEvent::GoalElapsedChanged {
                elapsed: self.elapsed,
            });
        }
        if self.delivered != 0 {
            self.delivered = 0;
            events.push(ChangeEvent::GoalDeliveredChanged { delivered: 0 });
        }
        if !self.active {
            self.active = true;
            events.push(ChangeEvent::GoalActiveChanged { active: true });
        }
    }
}
