//! Session clock.

use crate::fixed::{Fixed64, Seconds, Ticks};
use serde::{Deserialize, Serialize};

/// Mutable clock state tracked by the authority.
///
/// The tick counter and session time move separately: every step is a new
/// tick, but time only passes while the session is not paused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Incremented by 1 for each authority step.
    pub tick: Ticks,
    /// Elapsed unpaused session time in seconds.
    pub time: Seconds,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the next step. Returns its tick number.
    pub fn next_tick(&mut self) -> Ticks {
        self.tick += 1;
        self.tick
    }

    /// Let `dt` seconds pass. Negative steps count as zero so session time
    /// never runs backwards. Returns the effective `dt`.
    pub fn advance_time(&mut self, dt: Seconds) -> Seconds {
        let dt = dt.max(Fixed64::ZERO);
        self.time = self.time.saturating_add(dt);
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.tick, 0);
        assert_eq!(state.time, Fixed64::ZERO);
    }

    #[test]
    fn ticks_and_time_move_independently() {
        let mut state = SimState::new();
        assert_eq!(state.next_tick(), 1);
        state.advance_time(f64_to_fixed64(0.5));
        assert_eq!(state.next_tick(), 2);
        assert_eq!(state.next_tick(), 3);
        state.advance_time(f64_to_fixed64(0.25));
        assert_eq!(state.tick, 3);
        assert_eq!(state.time, f64_to_fixed64(0.75));
    }

    #[test]
    fn negative_dt_does_not_rewind() {
        let mut state = SimState::new();
        state.advance_time(f64_to_fixed64(1.0));
        assert_eq!(state.advance_time(f64_to_fixed64(-3.0)), Fixed64::ZERO);
        assert_eq!(state.time, f64_to_fixed64(1.0));
    }

    #[test]
    fn time_saturates() {
        let mut state = SimState::new();
        state.advance_time(Fixed64::MAX);
        state.advance_time(Fixed64::ONE);
        assert_eq!(state.time, Fixed64::MAX);
    }
}
