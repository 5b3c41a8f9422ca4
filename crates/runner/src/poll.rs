//! Polling state machine and completion heuristic.
//!
//! Some processor endpoints publish an authoritative `done` flag; others
//! only expose raw counters. [`PollCycle`] decides after every poll whether
//! the job is finished:
//!
//! 1. `done == Some(true)` completes immediately.
//! 2. Otherwise, the same `completed` value seen on `stable_threshold`
//!    consecutive successful polls completes the job, even if
//!    `completed < total`. Any change resets the count.
//! 3. Otherwise, once `max_attempts` polls (failed ones included) have
//!    been made, the job times out.
//!
//! The stability rule is an approximation. A slow job whose counter stalls
//! can be declared complete early, and a job that keeps moving past the
//! budget times out even though it may still finish remotely.

use std::time::Duration;

use hirebatch_core::JobCounters;
use hirebatch_gateway::ProgressSnapshot;
use serde::{Deserialize, Serialize};

/// Tunable parameters for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between polls. The first poll is immediate.
    pub interval: Duration,
    /// Upper bound on polls per job, failed polls included.
    pub max_attempts: u32,
    /// Consecutive identical `completed` readings that count as finished.
    pub stable_threshold: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 30,
            stable_threshold: 3,
        }
    }
}

impl PollConfig {
    /// Clamp zero values to the smallest workable setting.
    pub fn normalized(mut self) -> Self {
        self.interval = self.interval.max(Duration::from_millis(1));
        self.max_attempts = self.max_attempts.max(1);
        self.stable_threshold = self.stable_threshold.max(1);
        self
    }

    /// Longest time a job can be monitored, ignoring request latency.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Lifecycle of one job's poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling,
    Complete,
    TimedOut,
    ExternallyCancelled,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::TimedOut | Self::ExternallyCancelled
        )
    }
}

/// Why a job was considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    /// The processor reported `done`.
    Explicit,
    /// The `completed` counter stopped moving.
    Stable,
}

/// Outcome of feeding one poll into a [`PollCycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Continue,
    Complete(CompletionSignal),
    TimedOut,
}

/// Per-job poll bookkeeping. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycle {
    attempt: u32,
    last_completed: Option<u64>,
    stable_repeats: u32,
}

impl PollCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Polls made so far, failed ones included.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn stable_repeats(&self) -> u32 {
        self.stable_repeats
    }

    /// Feed a successful poll.
    pub fn observe(&mut self, snapshot: &ProgressSnapshot, config: &PollConfig) -> PollDecision {
        self.attempt += 1;

        if snapshot.is_done() {
            return PollDecision::Complete(CompletionSignal::Explicit);
        }

        if self.last_completed == Some(snapshot.completed) {
            self.stable_repeats += 1;
        } else {
            self.last_completed = Some(snapshot.completed);
            self.stable_repeats = 1;
        }

        if self.stable_repeats >= config.stable_threshold {
            return PollDecision::Complete(CompletionSignal::Stable);
        }

        self.check_budget(config)
    }

    /// Feed a failed poll. Consumes an attempt; stability is untouched.
    pub fn record_failure(&mut self, config: &PollConfig) -> PollDecision {
        self.attempt += 1;
        self.check_budget(config)
    }

    fn check_budget(&self, config: &PollConfig) -> PollDecision {
        if self.attempt >= config.max_attempts {
            PollDecision::TimedOut
        } else {
            PollDecision::Continue
        }
    }
}

/// Turns raw snapshots into counters that are safe to publish.
///
/// Published counters never exceed the last known non-zero total and
/// `completed + failed` never goes backwards. A regressing snapshot is
/// swallowed rather than published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressWatermark {
    known_total: u64,
    emitted: Option<JobCounters>,
}

impl ProgressWatermark {
    /// `initial_total` is the item count from the submit receipt, or 0
    /// when unknown (reattachment).
    pub fn new(initial_total: u64) -> Self {
        Self {
            known_total: initial_total,
            emitted: None,
        }
    }

    pub fn known_total(&self) -> u64 {
        self.known_total
    }

    /// Fold a snapshot in. Returns the counters to publish, or `None` if
    /// publishing them would move progress backwards.
    pub fn advance(&mut self, snapshot: &ProgressSnapshot) -> Option<JobCounters> {
        if snapshot.total > 0 {
            self.known_total = snapshot.total;
        }
        let counters = snapshot.counters().clamped_to(self.known_total);

        if let Some(prev) = self.emitted {
            if counters.processed() < prev.processed() {
                return None;
            }
        }
        self.emitted = Some(counters);
        Some(counters)
    }

    /// Last published counters.
    pub fn current(&self) -> JobCounters {
        self.emitted.unwrap_or(JobCounters {
            total: self.known_total,
            ..JobCounters::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(total: u64, completed: u64) -> ProgressSnapshot {
        ProgressSnapshot::new(total, completed, 0)
    }

    #[test]
    fn explicit_done_completes_on_first_poll() {
        let cfg = PollConfig::default();
        let mut cycle = PollCycle::new();

        let decision = cycle.observe(&snap(10, 10).finished(), &cfg);

        assert_eq!(decision, PollDecision::Complete(CompletionSignal::Explicit));
        assert_eq!(cycle.attempt(), 1);
    }

    #[test]
    fn explicit_done_wins_even_when_counters_lag() {
        let cfg = PollConfig::default();
        let mut cycle = PollCycle::new();

        let decision = cycle.observe(&snap(10, 4).finished(), &cfg);

        assert_eq!(decision, PollDecision::Complete(CompletionSignal::Explicit));
    }

    #[test]
    fn three_identical_readings_complete_below_total() {
        let cfg = PollConfig::default();
        let mut cycle = PollCycle::new();

        assert_eq!(cycle.observe(&snap(10, 3), &cfg), PollDecision::Continue);
        assert_eq!(cycle.observe(&snap(10, 3), &cfg), PollDecision::Continue);
        assert_eq!(
            cycle.observe(&snap(10, 3), &cfg),
            PollDecision::Complete(CompletionSignal::Stable)
        );
    }

    #[test]
    fn change_resets_stability() {
        let cfg = PollConfig::default();
        let mut cycle = PollCycle::new();

        cycle.observe(&snap(10, 3), &cfg);
        cycle.observe(&snap(10, 3), &cfg);
        assert_eq!(cycle.observe(&snap(10, 4), &cfg), PollDecision::Continue);
        assert_eq!(cycle.stable_repeats(), 1);
        assert_eq!(cycle.observe(&snap(10, 4), &cfg), PollDecision::Continue);
        assert_eq!(
            cycle.observe(&snap(10, 4), &cfg),
            PollDecision::Complete(CompletionSignal::Stable)
        );
    }

    #[test]
    fn failure_neither_advances_nor_resets_stability() {
        let cfg = PollConfig::default();
        let mut cycle = PollCycle::new();

        cycle.observe(&snap(10, 3), &cfg);
        cycle.observe(&snap(10, 3), &cfg);
        assert_eq!(cycle.record_failure(&cfg), PollDecision::Continue);
        assert_eq!(cycle.stable_repeats(), 2);
        assert_eq!(
            cycle.observe(&snap(10, 3), &cfg),
            PollDecision::Complete(CompletionSignal::Stable)
        );
        assert_eq!(cycle.attempt(), 4);
    }

    #[test]
    fn oscillating_counter_times_out_on_last_attempt() {
        let cfg = PollConfig::default();
        let mut cycle = PollCycle::new();

        for i in 1..cfg.max_attempts {
            let completed = if i % 2 == 1 { 2 } else { 1 };
            assert_eq!(
                cycle.observe(&snap(10, completed), &cfg),
                PollDecision::Continue,
                "attempt {i}"
            );
        }
        // Attempt 30 would be a `1` after a `2`.
        assert_eq!(cycle.observe(&snap(10, 1), &cfg), PollDecision::TimedOut);
        assert_eq!(cycle.attempt(), 30);
    }

    #[test]
    fn stability_on_last_attempt_beats_timeout() {
        let cfg = PollConfig {
            max_attempts: 3,
            ..PollConfig::default()
        };
        let mut cycle = PollCycle::new();

        cycle.observe(&snap(10, 5), &cfg);
        cycle.observe(&snap(10, 5), &cfg);
        assert_eq!(
            cycle.observe(&snap(10, 5), &cfg),
            PollDecision::Complete(CompletionSignal::Stable)
        );
    }

    #[test]
    fn failures_alone_exhaust_budget() {
        let cfg = PollConfig {
            max_attempts: 2,
            ..PollConfig::default()
        };
        let mut cycle = PollCycle::new();

        assert_eq!(cycle.record_failure(&cfg), PollDecision::Continue);
        assert_eq!(cycle.record_failure(&cfg), PollDecision::TimedOut);
    }

    #[test]
    fn normalized_clamps_zero_values() {
        let cfg = PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 0,
            stable_threshold: 0,
        }
        .normalized();
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.stable_threshold, 1);
        assert_eq!(cfg.interval, Duration::from_millis(10));
    }

    #[test]
    fn default_budget_is_under_ninety_seconds() {
        assert_eq!(PollConfig::default().budget(), Duration::from_secs(87));
    }

    #[test]
    fn watermark_clamps_to_known_total() {
        let mut wm = ProgressWatermark::new(0);
        let c = wm
            .advance(&ProgressSnapshot::new(10, 9, 4))
            .expect("first reading is published");
        assert_eq!(c, JobCounters::new(10, 9, 1));
    }

    #[test]
    fn watermark_keeps_last_nonzero_total() {
        let mut wm = ProgressWatermark::new(0);
        wm.advance(&ProgressSnapshot::new(5, 1, 0));
        let c = wm.advance(&ProgressSnapshot::new(0, 7, 0)).unwrap();
        assert_eq!(c, JobCounters::new(5, 5, 0));
    }

    #[test]
    fn watermark_seeds_total_from_receipt() {
        let mut wm = ProgressWatermark::new(4);
        let c = wm.advance(&ProgressSnapshot::new(0, 6, 0)).unwrap();
        assert_eq!(c.completed, 4);
        assert_eq!(wm.current().total, 4);
    }

    #[test]
    fn watermark_swallows_regressions() {
        let mut wm = ProgressWatermark::new(10);
        assert!(wm.advance(&snap(10, 2)).is_some());
        assert!(wm.advance(&snap(10, 1)).is_none());
        assert_eq!(wm.current().completed, 2);
        assert!(wm.advance(&snap(10, 2)).is_some());
    }
}
