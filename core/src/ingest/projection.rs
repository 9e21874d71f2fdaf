//! Per-point interaction projection
//!
//! Built once per applied snapshot and read by hover/click handling and the
//! picker. Large snapshots are projected in parallel; output order always
//! equals record order so a point's index is its record index.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use glam::Vec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::bounds::Bounds;
use crate::codec::VertexRecord;
use crate::semantic::SemanticTuple;

/// Projection of one record for interaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointData {
    /// Record index within the snapshot
    pub index: u32,

    /// Identity key
    pub id: u32,

    /// Position normalized by snapshot bounds
    pub position: Vec2,

    /// False when the record's x or y was non-finite
    pub pickable: bool,

    /// Decoded semantic bitfield
    pub semantic: SemanticTuple,

    pub risk: f32,
    pub shock: f32,
}

impl PointData {
    pub fn from_record(index: usize, record: &VertexRecord, bounds: &Bounds) -> Self {
        Self {
            index: index as u32,
            id: record.id,
            position: bounds.normalize(record.x(), record.y()),
            pickable: record.x().is_finite() && record.y().is_finite(),
            semantic: record.semantic(),
            risk: record.risk,
            shock: record.shock,
        }
    }

    /// Identity key as a decimal taxonomy code, as shown in tooltips
    pub fn display_id(&self) -> String {
        self.id.to_string()
    }

    /// Position fed to the picker; unpickable points map to NaN
    pub fn pick_position(&self) -> Vec2 {
        if self.pickable {
            self.position
        } else {
            Vec2::NAN
        }
    }
}

/// Project every record, in parallel at or above `parallel_threshold`
pub fn project_points(records: &[VertexRecord], bounds: &Bounds, parallel_threshold: usize) -> Vec<PointData> {
    if records.len() >= parallel_threshold.max(1) {
        records
            .par_iter()
            .enumerate()
            .map(|(index, record)| PointData::from_record(index, record, bounds))
            .collect()
    } else {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| PointData::from_record(index, record, bounds))
            .collect()
    }
}

/// Mean finite shock score over the first `sample` records, clamped to `[0, 1]`
pub fn sample_intensity(records: &[VertexRecord], sample: usize) -> f32 {
    let (sum, count) = records
        .iter()
        .take(sample)
        .filter(|record| record.shock.is_finite())
        .fold((0.0f64, 0usize), |(sum, count), record| {
            (sum + record.shock.clamp(0.0, 1.0) as f64, count + 1)
        });

    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}
