//! Attempt identity, outcomes and the epoch gate
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

/// Activation counter; 0 means no activation has happened
pub type Epoch = u64;

/// Identity of one network attempt.
///
/// Attempt numbers increase monotonically across epochs for the lifetime of a
/// scheduler, so `(epoch, attempt)` totally orders completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptTicket {
    pub epoch: Epoch,
    pub attempt: u64,
}

impl fmt::Display for AttemptTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.epoch, self.attempt)
    }
}

/// Which source an attempt should consult first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptMode {
    Primary,

    /// Inside a backoff window; the primary source is skipped
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A new snapshot was committed
    Applied,

    /// Source had nothing to deliver; prior snapshot retained
    NoContent,

    /// Network or availability problem
    TransientFailure,

    /// Payload violated the wire contract or could not be decoded
    ContractFailure,

    /// Superseded by a newer epoch or attempt
    Cancelled,
}

impl AttemptOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::TransientFailure | Self::ContractFailure)
    }
}

/// Result of one attempt as seen by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptReport {
    pub outcome: AttemptOutcome,

    /// Primary source answered "temporarily unavailable"; opens a backoff window
    pub source_unavailable: bool,
}

impl AttemptReport {
    pub fn new(outcome: AttemptOutcome) -> Self {
        Self { outcome, source_unavailable: false }
    }

    pub fn cancelled() -> Self {
        Self::new(AttemptOutcome::Cancelled)
    }

    pub fn with_source_unavailable(mut self, unavailable: bool) -> Self {
        self.source_unavailable = unavailable;
        self
    }
}

/// Seam between the poll driver and whatever performs an attempt
#[async_trait]
pub trait AttemptRunner: Send + Sync + 'static {
    async fn run(&self, ticket: AttemptTicket, mode: AttemptMode) -> AttemptReport;
}

/// Published active epoch, shared between a driver and its pipeline.
///
/// Holds 0 while no view is active, so every ticket is refused after
/// deactivation.
#[derive(Debug, Clone, Default)]
pub struct EpochGate {
    active: Arc<AtomicU64>,
}

impl EpochGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, epoch: Epoch) {
        self.active.store(epoch, Ordering::Release);
    }

    pub fn close(&self) {
        self.active.store(0, Ordering::Release);
    }

    pub fn active(&self) -> Epoch {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn admits(&self, epoch: Epoch) -> bool {
        epoch != 0 && self.active() == epoch
    }
}
