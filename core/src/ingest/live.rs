//! Last-known-good render state and ingest diagnostics
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use parking_lot::RwLock;
use serde::Serialize;

use super::bounds::Bounds;
use super::error::ErrorClass;
use super::projection::PointData;
use crate::codec::{DecodePath, VertexRecord};
use crate::scheduler::AttemptTicket;

/// Decoded records and what was derived from them
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Vec<VertexRecord>,
    pub bounds: Bounds,
    pub intensity: f32,
    pub path: DecodePath,
}

/// Everything the render loop and the pointer layer read for one snapshot
#[derive(Debug)]
pub struct RenderState {
    /// Attempt that produced this state; its `attempt` is the snapshot sequence
    pub ticket: AttemptTicket,

    pub snapshot: Snapshot,

    pub points: Vec<PointData>,

    /// Picker input, NaN for unpickable points
    pub pick_positions: Arc<[Vec2]>,

    pub applied_at: Instant,
}

impl RenderState {
    pub fn new(ticket: AttemptTicket, snapshot: Snapshot, points: Vec<PointData>) -> Self {
        let pick_positions = points.iter().map(PointData::pick_position).collect();
        Self { ticket, snapshot, points, pick_positions, applied_at: Instant::now() }
    }

    pub fn sequence(&self) -> u64 {
        self.ticket.attempt
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<&PointData> {
        self.points.get(index)
    }
}

/// Single-writer, many-reader slot for the current [`RenderState`]
#[derive(Debug, Clone, Default)]
pub struct LiveView {
    slot: Arc<RwLock<Option<Arc<RenderState>>>>,
}

impl LiveView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<RenderState>> {
        self.slot.read().clone()
    }

    /// Sequence of the live snapshot, 0 before the first commit
    pub fn sequence(&self) -> u64 {
        self.slot.read().as_ref().map_or(0, |state| state.sequence())
    }

    pub(crate) fn replace(&self, state: Arc<RenderState>) {
        *self.slot.write() = Some(state);
    }
}

/// Most recent error class plus a passive idle indicator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub last_error: Option<ErrorClass>,
    pub last_message: Option<String>,
    pub idle: bool,
    pub applied: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    inner: Arc<RwLock<DiagnosticsSnapshot>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        self.inner.read().clone()
    }

    pub fn last_error(&self) -> Option<ErrorClass> {
        self.inner.read().last_error
    }

    pub(crate) fn record_applied(&self) {
        let mut state = self.inner.write();
        state.last_error = None;
        state.last_message = None;
        state.idle = false;
        state.applied += 1;
        state.consecutive_failures = 0;
    }

    pub(crate) fn record_idle(&self) {
        self.inner.write().idle = true;
    }

    /// Cancellations are not failures and are never recorded
    pub(crate) fn record_error(&self, class: ErrorClass, message: String) {
        if class == ErrorClass::Cancelled {
            return;
        }
        let mut state = self.inner.write();
        state.last_error = Some(class);
        state.last_message = Some(message);
        state.idle = false;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
    }
}
