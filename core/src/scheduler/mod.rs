//! Fetch scheduling
//!
//! The [`PollScheduler`] is a pure state machine over an injected [`Clock`];
//! the [`PollDriver`] runs it on tokio for one active view.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod attempt;
pub mod clock;
pub mod driver;
pub mod state;

pub use attempt::{AttemptMode, AttemptOutcome, AttemptReport, AttemptRunner, AttemptTicket, Epoch, EpochGate};
pub use clock::{Clock, ManualClock, TokioClock};
pub use driver::{DriverCommand, DriverError, PollDriver};
pub use state::{Activation, Completion, PollConfig, PollScheduler, SchedulerPhase, TickDecision};
