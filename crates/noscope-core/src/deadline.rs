use std::collections::HashMap;
use std::time::{Duration, Instant};

use noscope_types::phase::Phase;

/// Manages the global timebox and the per-phase budgets carved out of it.
///
/// All timing is driven off [`Instant`] rather than wall clock time, so the
/// deadline is immune to clock adjustments during a run.
#[derive(Debug)]
pub struct Deadline {
    total: Duration,
    start: Instant,
    deadline: Instant,
    current_phase: Phase,
    phase_deadlines: HashMap<Phase, Instant>,
}

impl Deadline {
    /// Build a deadline from a total timebox and the default per-phase
    /// allocation (see [`Phase::default_allocation`]).
    pub fn new(total_seconds: u64) -> Self {
        Self::with_allocation(total_seconds, |p| p.default_allocation())
    }

    /// Build a deadline with a caller-supplied allocation function. The
    /// fractions returned do not need to be validated here; callers that
    /// care should check they sum to 1.0 up front.
    pub fn with_allocation(total_seconds: u64, allocation: impl Fn(Phase) -> f64) -> Self {
        let total = Duration::from_secs(total_seconds);
        let start = Instant::now();
        let deadline = start + total;

        let mut phase_deadlines = HashMap::new();
        let mut cumulative = 0.0;
        for phase in Phase::ORDER {
            cumulative += allocation(phase);
            let offset = total.mul_f64(cumulative.clamp(0.0, 1.0));
            phase_deadlines.insert(phase, start + offset);
        }

        Self {
            total,
            start,
            deadline,
            current_phase: Phase::Plan,
            phase_deadlines,
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    /// Manually advance to a specific phase.
    pub fn advance_phase(&mut self, phase: Phase) {
        self.current_phase = phase;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Seconds remaining in the total timebox. Never negative.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Seconds remaining for the given (or current) phase.
    pub fn phase_remaining(&self, phase: Option<Phase>) -> Duration {
        let phase = phase.unwrap_or(self.current_phase);
        let phase_deadline = self.phase_deadlines.get(&phase).copied().unwrap_or(self.deadline);
        phase_deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// True once remaining time drops below `max(60s, 10% of total)`.
    pub fn is_panic_mode(&self) -> bool {
        let threshold = self.total.mul_f64(0.10).max(Duration::from_secs(60));
        self.remaining() < threshold
    }

    /// Suggest the next phase if the current phase's budget is exhausted.
    pub fn should_transition(&self, current_phase: Option<Phase>) -> Option<Phase> {
        let current = current_phase.unwrap_or(self.current_phase);
        if self.phase_remaining(Some(current)).is_zero() {
            let idx = Phase::ORDER.iter().position(|p| *p == current)?;
            return Phase::ORDER.get(idx + 1).copied();
        }
        None
    }

    /// Human-readable `M:SS` remaining time.
    pub fn format_remaining(&self) -> String {
        let secs = self.remaining().as_secs();
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_deadlines_are_cumulative() {
        let d = Deadline::new(1000);
        // PLAN ends at 10%, BUILD ends at 60% (10+0+50), HANDOFF at 100%.
        assert!(d.phase_remaining(Some(Phase::Plan)).as_secs() <= 100);
        assert!(d.phase_remaining(Some(Phase::Build)).as_secs() <= 600);
        assert!(d.phase_remaining(Some(Phase::Handoff)).as_secs() <= 1000);
    }

    #[test]
    fn panic_mode_uses_floor_of_60s() {
        let d = Deadline::new(30);
        // 10% of 30s is 3s, floor is 60s, so panic mode is immediate.
        assert!(d.is_panic_mode());
    }

    #[test]
    fn should_transition_past_phase_boundary() {
        let d = Deadline::new(0);
        assert_eq!(d.should_transition(Some(Phase::Plan)), Some(Phase::Request));
    }
}
