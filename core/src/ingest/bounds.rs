//! Planar bounds over finite positions
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::codec::VertexRecord;

/// Default half extent applied around a degenerate axis
pub const DEFAULT_DEGENERATE_HALF_EXTENT: f32 = 1.0;

/// Min/max over finite x and finite y.
///
/// Never zero-width: a degenerate axis is widened to `[v - h, v + h]`, and an
/// axis without any finite value becomes `[-h, h]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn compute(records: &[VertexRecord], half_extent: f32) -> Self {
        let half_extent = if half_extent.is_finite() && half_extent > 0.0 {
            half_extent
        } else {
            DEFAULT_DEGENERATE_HALF_EXTENT
        };

        let mut x = AxisRange::default();
        let mut y = AxisRange::default();
        for record in records {
            x.include(record.x());
            y.include(record.y());
        }

        let (min_x, max_x) = x.resolve(half_extent);
        let (min_y, max_y) = y.resolve(half_extent);
        Self { min_x, max_x, min_y, max_y }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Map a position into `[0, 1]²`; a non-finite component maps to 0.5
    #[inline]
    pub fn normalize(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            normalize_axis(x, self.min_x, self.width()),
            normalize_axis(y, self.min_y, self.height()),
        )
    }
}

#[inline]
fn normalize_axis(value: f32, min: f32, span: f32) -> f32 {
    if !value.is_finite() {
        return 0.5;
    }
    ((value - min) / span).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy)]
struct AxisRange {
    min: f32,
    max: f32,
}

impl Default for AxisRange {
    fn default() -> Self {
        Self { min: f32::INFINITY, max: f32::NEG_INFINITY }
    }
}

impl AxisRange {
    #[inline]
    fn include(&mut self, value: f32) {
        if value.is_finite() {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    fn resolve(self, half_extent: f32) -> (f32, f32) {
        if self.min > self.max {
            (-half_extent, half_extent)
        } else if self.max - self.min <= f32::EPSILON * self.max.abs().max(1.0) {
            let mid = self.min;
            (mid - half_extent, mid + half_extent)
        } else {
            (self.min, self.max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> VertexRecord {
        VertexRecord { id: 0, meta: 0, position: [x, y, 0.0], risk: 0.0, shock: 0.0 }
    }

    #[test]
    fn test_bounds_over_finite_values() {
        let records = vec![at(0.0, -2.0), at(5.0, 4.0), at(10.0, 1.0)];
        let bounds = Bounds::compute(&records, 1.0);

        assert_eq!(bounds.min_x, 0.0);
        assert_eq!(bounds.max_x, 10.0);
        assert_eq!(bounds.min_y, -2.0);
        assert_eq!(bounds.max_y, 4.0);
    }

    #[test]
    fn test_non_finite_values_are_excluded() {
        let records = vec![at(f32::NAN, 1.0), at(2.0, f32::INFINITY), at(4.0, 3.0), at(f32::NEG_INFINITY, 0.0)];
        let bounds = Bounds::compute(&records, 1.0);

        assert_eq!((bounds.min_x, bounds.max_x), (2.0, 4.0));
        assert_eq!((bounds.min_y, bounds.max_y), (0.0, 3.0));
    }

    #[test]
    fn test_degenerate_axis_uses_fallback_range() {
        let records = vec![at(3.0, 1.0), at(3.0, 2.0)];
        let bounds = Bounds::compute(&records, 0.5);

        assert_eq!((bounds.min_x, bounds.max_x), (2.5, 3.5));
        assert!(bounds.width() > 0.0);
        assert_eq!(bounds.normalize(3.0, 1.5).x, 0.5);
    }

    #[test]
    fn test_axis_without_finite_values_is_centered() {
        let bounds = Bounds::compute(&[at(f32::NAN, f32::NAN)], 2.0);
        assert_eq!((bounds.min_x, bounds.max_x), (-2.0, 2.0));
        assert_eq!((bounds.min_y, bounds.max_y), (-2.0, 2.0));
    }

    #[test]
    fn test_invalid_half_extent_uses_default() {
        let bounds = Bounds::compute(&[at(1.0, 1.0)], 0.0);
        assert_eq!(bounds.width(), 2.0 * DEFAULT_DEGENERATE_HALF_EXTENT);
    }

    #[test]
    fn test_normalize_maps_non_finite_to_center() {
        let bounds = Bounds::compute(&[at(0.0, 0.0), at(10.0, 10.0)], 1.0);
        assert_eq!(bounds.normalize(f32::NAN, 10.0), Vec2::new(0.5, 1.0));
    }
}
