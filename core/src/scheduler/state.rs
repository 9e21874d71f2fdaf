//! Poll scheduler state machine
//!
//! Completion-chained and single-flight: the next attempt is armed only when
//! the previous one completes, every start is spaced at least one interval
//! after the previous start, and the first start after activation is never
//! immediate. The machine owns no timers; callers arm the delays it returns.
//!
//! ```text
//!   activate ──► Armed ──tick──► InFlight ──complete──► Armed ──► ...
//!                  ▲                                      │
//!                  └──────────────────────────────────────┘
//!   deactivate ──► Disposed
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use super::attempt::{AttemptMode, AttemptReport, AttemptTicket, Epoch};
use super::clock::Clock;

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Minimum spacing between attempt starts (milliseconds)
    pub interval_ms: u64,

    /// Degraded window after the primary source reports unavailability (milliseconds)
    pub backoff_ms: u64,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            backoff_ms: 30_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Never activated
    Idle,
    /// Waiting for the next tick
    Armed,
    InFlight,
    Disposed,
}

/// Result of [`PollScheduler::activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub epoch: Epoch,

    /// Delay before the first tick
    pub arm_delay: Duration,

    /// Attempt of the previous epoch that must be aborted
    pub superseded: Option<AttemptTicket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Tick belongs to an old epoch or a disposed scheduler; do nothing
    Stale,

    /// Too early or busy; tick again after `delay`
    Reschedule { delay: Duration },

    /// Run an attempt
    Start {
        ticket: AttemptTicket,
        cancel: Option<AttemptTicket>,
        mode: AttemptMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Arm the next tick after `delay`
    ScheduleNext { delay: Duration },

    /// Completion of a superseded attempt
    Ignored,
}

pub struct PollScheduler<C: Clock> {
    clock: C,
    interval: Duration,
    backoff: Duration,
    phase: SchedulerPhase,
    epoch: Epoch,
    attempts: u64,
    in_flight: bool,
    outstanding: Option<AttemptTicket>,
    activated_at: Duration,
    last_start: Option<Duration>,
    backoff_until: Option<Duration>,
}

impl<C: Clock> PollScheduler<C> {
    pub fn new(clock: C, config: &PollConfig) -> Self {
        Self {
            clock,
            interval: config.interval(),
            backoff: config.backoff(),
            phase: SchedulerPhase::Idle,
            epoch: 0,
            attempts: 0,
            in_flight: false,
            outstanding: None,
            activated_at: Duration::ZERO,
            last_start: None,
            backoff_until: None,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn outstanding(&self) -> Option<AttemptTicket> {
        self.outstanding
    }

    /// Time of the last attempt start in this activation, zero if none
    pub fn last_start(&self) -> Duration {
        self.last_start.unwrap_or(Duration::ZERO)
    }

    pub fn in_backoff(&self) -> bool {
        self.backoff_until.map_or(false, |until| self.clock.now() < until)
    }

    /// Begin a new epoch; the first tick is due one interval from now
    pub fn activate(&mut self) -> Activation {
        let superseded = self.outstanding.take();
        self.in_flight = false;
        self.epoch += 1;
        self.phase = SchedulerPhase::Armed;
        self.activated_at = self.clock.now();
        self.last_start = None;
        self.backoff_until = None;
        debug!("Poll scheduler activated: epoch {}", self.epoch);

        Activation { epoch: self.epoch, arm_delay: self.interval, superseded }
    }

    pub fn tick(&mut self, epoch: Epoch) -> TickDecision {
        if self.phase == SchedulerPhase::Disposed || epoch != self.epoch || epoch == 0 {
            return TickDecision::Stale;
        }
        if self.in_flight {
            return TickDecision::Reschedule { delay: self.interval };
        }

        let now = self.clock.now();
        let since = self.last_start.unwrap_or(self.activated_at);
        let elapsed = now.saturating_sub(since);
        if elapsed < self.interval {
            return TickDecision::Reschedule { delay: self.interval - elapsed };
        }

        let cancel = self.outstanding.take();
        self.attempts += 1;
        let ticket = AttemptTicket { epoch: self.epoch, attempt: self.attempts };
        let mode = if self.in_backoff() { AttemptMode::Degraded } else { AttemptMode::Primary };

        self.outstanding = Some(ticket);
        self.in_flight = true;
        self.last_start = Some(now);
        self.phase = SchedulerPhase::InFlight;
        debug!("Attempt {} started at {:?} ({:?})", ticket, now, mode);

        TickDecision::Start { ticket, cancel, mode }
    }

    /// Manual refresh; subject to the same checks as a timer tick
    pub fn refresh(&mut self) -> TickDecision {
        self.tick(self.epoch)
    }

    pub fn complete(&mut self, ticket: AttemptTicket, report: AttemptReport) -> Completion {
        if self.outstanding != Some(ticket) {
            debug!("Ignoring completion of superseded attempt {}", ticket);
            return Completion::Ignored;
        }
        self.outstanding = None;
        self.in_flight = false;

        if self.phase == SchedulerPhase::Disposed || ticket.epoch != self.epoch {
            return Completion::Ignored;
        }

        let now = self.clock.now();
        if report.source_unavailable {
            self.backoff_until = Some(now + self.backoff);
            debug!("Primary source unavailable; degraded until {:?}", now + self.backoff);
        }

        self.phase = SchedulerPhase::Armed;
        let elapsed = now.saturating_sub(self.last_start());
        let delay = self.interval.saturating_sub(elapsed);
        debug!("Attempt {} completed ({:?}); next tick in {:?}", ticket, report.outcome, delay);

        Completion::ScheduleNext { delay }
    }

    /// Tear down; returns the outstanding attempt so it can be aborted
    pub fn deactivate(&mut self) -> Option<AttemptTicket> {
        let outstanding = self.outstanding.take();
        self.in_flight = false;
        self.last_start = None;
        self.backoff_until = None;
        self.phase = SchedulerPhase::Disposed;
        debug!("Poll scheduler deactivated at epoch {}", self.epoch);
        outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::attempt::AttemptOutcome;
    use crate::scheduler::clock::ManualClock;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn config(interval_ms: u64) -> PollConfig {
        PollConfig { interval_ms, backoff_ms: 5_000, ..PollConfig::default() }
    }

    fn applied() -> AttemptReport {
        AttemptReport::new(AttemptOutcome::Applied)
    }

    /// Drive the machine like the tokio driver does, with attempts that
    /// complete instantly; returns the start times in milliseconds
    fn simulate(interval_ms: u64, window_ms: u64, mut refreshes: Vec<u64>) -> Vec<u64> {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(interval_ms));
        let activation = scheduler.activate();
        let mut timer = Some(activation.arm_delay.as_millis() as u64);
        refreshes.sort_unstable();
        let mut refreshes = refreshes.into_iter().peekable();
        let mut starts = Vec::new();

        loop {
            let next_refresh = refreshes.peek().copied();
            let (at, from_timer) = match (timer, next_refresh) {
                (Some(t), Some(r)) if r < t => (r, false),
                (Some(t), _) => (t, true),
                (None, Some(r)) => (r, false),
                (None, None) => break,
            };
            if at > window_ms {
                break;
            }
            clock.set(Duration::from_millis(at));
            let decision = if from_timer {
                timer = None;
                scheduler.tick(activation.epoch)
            } else {
                refreshes.next();
                scheduler.refresh()
            };

            match decision {
                TickDecision::Start { ticket, .. } => {
                    starts.push(at);
                    timer = None;
                    match scheduler.complete(ticket, applied()) {
                        Completion::ScheduleNext { delay } => timer = Some(at + delay.as_millis() as u64),
                        Completion::Ignored => panic!("current attempt ignored"),
                    }
                }
                TickDecision::Reschedule { delay } if from_timer => timer = Some(at + delay.as_millis() as u64),
                _ => {}
            }
        }
        starts
    }

    #[test]
    fn test_steady_polling_starts_on_interval_boundaries() {
        let starts = simulate(2_000, 10_000, Vec::new());
        assert_eq!(starts, vec![2_000, 4_000, 6_000, 8_000, 10_000]);
    }

    #[test]
    fn test_first_attempt_is_never_immediate() {
        let starts = simulate(2_000, 10_000, vec![0, 1, 500, 1_999]);
        assert_eq!(starts.first(), Some(&2_000));
    }

    #[test]
    fn test_refresh_spam_never_exceeds_rate() {
        let mut rng = StdRng::seed_from_u64(0xb0b);
        for _ in 0..200 {
            let interval = rng.gen_range(50..3_000u64);
            let window = rng.gen_range(0..60_000u64);
            let refreshes: Vec<u64> = (0..rng.gen_range(0..400)).map(|_| rng.gen_range(0..=window)).collect();

            let starts = simulate(interval, window, refreshes);
            assert!(starts.len() as u64 <= window / interval + 1, "{} starts for T={} I={}", starts.len(), window, interval);
            if let Some(&first) = starts.first() {
                assert!(first >= interval);
            }
            for pair in starts.windows(2) {
                assert!(pair[1] - pair[0] >= interval);
            }
        }
    }

    #[test]
    fn test_tick_while_in_flight_reschedules() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let epoch = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        assert!(matches!(scheduler.tick(epoch), TickDecision::Start { .. }));
        assert_eq!(scheduler.phase(), SchedulerPhase::InFlight);

        clock.set(Duration::from_millis(5_000));
        assert_eq!(scheduler.refresh(), TickDecision::Reschedule { delay: Duration::from_millis(1_000) });
    }

    #[test]
    fn test_slow_attempt_schedules_next_immediately() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let epoch = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        let TickDecision::Start { ticket, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        clock.set(Duration::from_millis(3_500));
        assert_eq!(scheduler.complete(ticket, applied()), Completion::ScheduleNext { delay: Duration::ZERO });
    }

    #[test]
    fn test_reactivation_supersedes_previous_epoch() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let first = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        let TickDecision::Start { ticket, .. } = scheduler.tick(first) else {
            panic!("expected a start");
        };

        let activation = scheduler.activate();
        assert_eq!(activation.superseded, Some(ticket));
        assert_eq!(activation.epoch, first + 1);
        assert!(!scheduler.is_in_flight());

        // Old timers and old completions are inert
        assert_eq!(scheduler.tick(first), TickDecision::Stale);
        assert_eq!(scheduler.complete(ticket, applied()), Completion::Ignored);

        // New epoch waits a full interval from reactivation
        assert_eq!(scheduler.tick(activation.epoch), TickDecision::Reschedule { delay: Duration::from_millis(1_000) });
    }

    #[test]
    fn test_deactivate_returns_outstanding_and_resets() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let epoch = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        let TickDecision::Start { ticket, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };

        assert_eq!(scheduler.deactivate(), Some(ticket));
        assert_eq!(scheduler.phase(), SchedulerPhase::Disposed);
        assert_eq!(scheduler.last_start(), Duration::ZERO);
        assert!(!scheduler.is_in_flight());
        assert_eq!(scheduler.tick(epoch), TickDecision::Stale);
        assert_eq!(scheduler.refresh(), TickDecision::Stale);
    }

    #[test]
    fn test_unavailability_opens_degraded_window() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let epoch = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        let TickDecision::Start { ticket, mode, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        assert_eq!(mode, AttemptMode::Primary);

        let report = AttemptReport::new(AttemptOutcome::TransientFailure).with_source_unavailable(true);
        // Backoff does not stretch the regular interval
        assert_eq!(scheduler.complete(ticket, report), Completion::ScheduleNext { delay: Duration::from_millis(1_000) });

        clock.set(Duration::from_millis(2_000));
        let TickDecision::Start { ticket, mode, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        assert_eq!(mode, AttemptMode::Degraded);
        scheduler.complete(ticket, applied());

        // Window of 5s opened at 1s closes at 6s
        clock.set(Duration::from_millis(6_000));
        let TickDecision::Start { mode, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        assert_eq!(mode, AttemptMode::Primary);
    }

    #[test]
    fn test_degraded_window_ends_with_its_activation() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let epoch = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        let TickDecision::Start { ticket, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        scheduler.complete(ticket, AttemptReport::new(AttemptOutcome::TransientFailure).with_source_unavailable(true));
        assert!(scheduler.in_backoff());

        scheduler.deactivate();
        assert!(!scheduler.in_backoff());

        clock.set(Duration::from_millis(1_500));
        let epoch = scheduler.activate().epoch;
        clock.set(Duration::from_millis(2_500));
        let TickDecision::Start { mode, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        // Verify the fresh activation polls the primary source
        assert_eq!(mode, AttemptMode::Primary);
    }

    #[test]
    fn test_reactivation_without_deactivate_clears_backoff() {
        let clock = ManualClock::new();
        let mut scheduler = PollScheduler::new(clock.clone(), &config(1_000));
        let epoch = scheduler.activate().epoch;

        clock.set(Duration::from_millis(1_000));
        let TickDecision::Start { ticket, .. } = scheduler.tick(epoch) else {
            panic!("expected a start");
        };
        scheduler.complete(ticket, AttemptReport::new(AttemptOutcome::TransientFailure).with_source_unavailable(true));

        scheduler.activate();
        assert!(!scheduler.in_backoff());
    }
}
