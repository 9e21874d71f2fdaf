//! Tokio driver for one active view
//!
//! A single task owns the [`PollScheduler`] and reacts to three kinds of
//! events: commands from the view, completions of spawned attempts and the
//! one armed timer. Attempts run as separate tasks so they can be aborted when
//! an epoch ends; the [`EpochGate`] covers the window between abort and the
//! attempt noticing it.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::attempt::{AttemptOutcome, AttemptReport, AttemptRunner, AttemptTicket, EpochGate};
use super::clock::{Clock, TokioClock};
use super::state::{Completion, PollConfig, PollScheduler, TickDecision};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Poll driver has stopped")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    Activate,
    Refresh,
    Deactivate,
    Shutdown,
}

/// Handle to the driver task; dropping it stops polling
pub struct PollDriver {
    commands: UnboundedSender<DriverCommand>,
    task: Option<JoinHandle<()>>,
    gate: EpochGate,
}

impl PollDriver {
    /// Spawn the driver on the current tokio runtime
    pub fn spawn<R: AttemptRunner>(runner: Arc<R>, gate: EpochGate, config: &PollConfig) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let clock = TokioClock::new();
        let scheduler = PollScheduler::new(clock, config);
        let task = DriverTask {
            scheduler,
            clock,
            runner,
            gate: gate.clone(),
            attempt: None,
            deadline: None,
        };
        let task = tokio::spawn(task.run(receiver));
        Self { commands, task: Some(task), gate }
    }

    pub fn gate(&self) -> &EpochGate {
        &self.gate
    }

    pub fn activate(&self) -> Result<(), DriverError> {
        self.send(DriverCommand::Activate)
    }

    /// Request an attempt now, still subject to the interval
    pub fn refresh(&self) -> Result<(), DriverError> {
        self.send(DriverCommand::Refresh)
    }

    pub fn deactivate(&self) -> Result<(), DriverError> {
        self.send(DriverCommand::Deactivate)
    }

    /// Stop the driver and wait for its task to finish
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(DriverCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!("Poll driver task panicked");
                }
            }
        }
    }

    fn send(&self, command: DriverCommand) -> Result<(), DriverError> {
        self.commands.send(command).map_err(|_| DriverError::Stopped)
    }
}

impl Drop for PollDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.commands.send(DriverCommand::Shutdown);
            task.abort();
            self.gate.close();
        }
    }
}

struct DriverTask<R: AttemptRunner> {
    scheduler: PollScheduler<TokioClock>,
    clock: TokioClock,
    runner: Arc<R>,
    gate: EpochGate,
    attempt: Option<(AttemptTicket, JoinHandle<()>)>,
    deadline: Option<Instant>,
}

impl<R: AttemptRunner> DriverTask<R> {
    async fn run(mut self, mut commands: UnboundedReceiver<DriverCommand>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(AttemptTicket, AttemptReport)>();

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(DriverCommand::Activate) => self.activate(),
                    Some(DriverCommand::Refresh) => {
                        let decision = self.scheduler.refresh();
                        self.apply(decision, false, &done_tx);
                    }
                    Some(DriverCommand::Deactivate) => self.deactivate(),
                    Some(DriverCommand::Shutdown) | None => {
                        self.deactivate();
                        break;
                    }
                },
                Some((ticket, report)) = done_rx.recv() => {
                    if matches!(&self.attempt, Some((current, _)) if *current == ticket) {
                        self.attempt = None;
                    }
                    if let Completion::ScheduleNext { delay } = self.scheduler.complete(ticket, report) {
                        self.deadline = Some(Instant::now() + delay);
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    let decision = self.scheduler.tick(self.scheduler.epoch());
                    self.apply(decision, true, &done_tx);
                }
            }
        }
        debug!("Poll driver stopped");
    }

    fn activate(&mut self) {
        let activation = self.scheduler.activate();
        if let Some(ticket) = activation.superseded {
            self.abort(ticket);
        }
        self.gate.open(activation.epoch);
        self.deadline = Some(self.clock.instant_at(self.clock.now() + activation.arm_delay));
        info!("Polling activated: epoch {}, first attempt in {:?}", activation.epoch, activation.arm_delay);
    }

    fn deactivate(&mut self) {
        if let Some(ticket) = self.scheduler.deactivate() {
            self.abort(ticket);
        }
        self.gate.close();
        self.deadline = None;
    }

    fn apply(&mut self, decision: TickDecision, from_timer: bool, done: &UnboundedSender<(AttemptTicket, AttemptReport)>) {
        match decision {
            TickDecision::Stale => {}
            TickDecision::Reschedule { delay } => {
                if from_timer {
                    self.deadline = Some(Instant::now() + delay);
                }
            }
            TickDecision::Start { ticket, cancel, mode } => {
                if let Some(previous) = cancel {
                    self.abort(previous);
                }
                self.deadline = None;
                let runner = Arc::clone(&self.runner);
                let guard = CompletionGuard { ticket, done: done.clone(), reported: false };
                let handle = tokio::spawn(async move {
                    let report = runner.run(ticket, mode).await;
                    guard.report(report);
                });
                self.attempt = Some((ticket, handle));
            }
        }
    }

    fn abort(&mut self, ticket: AttemptTicket) {
        if let Some((current, handle)) = self.attempt.take() {
            if current == ticket {
                debug!("Aborting attempt {}", ticket);
                handle.abort();
            } else {
                self.attempt = Some((current, handle));
            }
        }
    }
}

impl<R: AttemptRunner> Drop for DriverTask<R> {
    fn drop(&mut self) {
        // Also reached when the task itself is aborted
        if let Some((ticket, handle)) = self.attempt.take() {
            debug!("Aborting attempt {} with its driver", ticket);
            handle.abort();
        }
    }
}

/// Completes the attempt even if its task ends without a report
struct CompletionGuard {
    ticket: AttemptTicket,
    done: UnboundedSender<(AttemptTicket, AttemptReport)>,
    reported: bool,
}

impl CompletionGuard {
    fn report(mut self, report: AttemptReport) {
        self.reported = true;
        let _ = self.done.send((self.ticket, report));
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.reported {
            // Aborted attempts are already superseded and get ignored; a panicked
            // one must still free the scheduler
            debug!("Attempt {} ended without a report", self.ticket);
            let _ = self.done.send((self.ticket, AttemptReport::new(AttemptOutcome::TransientFailure)));
        }
    }
}
