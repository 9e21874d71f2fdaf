//! Screen-space uniform grid for nearest-point picking
//!
//! Points are bucketed into square pixel cells after camera projection. A query
//! scans the ring of cells that can contain a point within the pick radius
//! (the 3×3 neighbourhood whenever the radius does not exceed the cell size),
//! so its cost depends on local occupancy rather than on the total point count.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;

use glam::Vec2;

use super::camera::{CameraTransform, Viewport};

/// Default cell edge in pixels
pub const DEFAULT_CELL_SIZE: f32 = 24.0;

#[inline]
fn cell_key(cx: i32, cy: i32) -> u64 {
    ((cx as u32 as u64) << 32) | cy as u32 as u64
}

/// Immutable-once-built grid; [`SpatialGrid::build`] replaces all state
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<u64, Vec<u32>>,
    screen: Vec<Vec2>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self { cell_size, cells: HashMap::new(), screen: Vec::new() }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of indexed positions, pickable or not
    pub fn len(&self) -> usize {
        self.screen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screen.is_empty()
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn cell_of(&self, p: Vec2) -> (i32, i32) {
        ((p.x / self.cell_size).floor() as i32, (p.y / self.cell_size).floor() as i32)
    }

    /// Rebuild from normalized positions under the given camera.
    ///
    /// Non-finite positions are kept in the index space but never bucketed, so
    /// they can never be returned by a query.
    pub fn build(&mut self, positions: &[Vec2], camera: &CameraTransform, viewport: Viewport) {
        self.cells.clear();
        self.screen.clear();
        self.screen.reserve(positions.len());

        for (index, &normalized) in positions.iter().enumerate() {
            let screen = camera.to_screen(normalized, viewport);
            self.screen.push(screen);
            if !screen.is_finite() {
                continue;
            }
            let (cx, cy) = self.cell_of(screen);
            self.cells.entry(cell_key(cx, cy)).or_default().push(index as u32);
        }
    }

    /// Nearest indexed point within `radius` pixels of `(x, y)`.
    ///
    /// Ties resolve to the lowest index.
    pub fn query(&self, x: f32, y: f32, radius: f32) -> Option<usize> {
        if !(x.is_finite() && y.is_finite() && radius.is_finite()) || radius < 0.0 {
            return None;
        }
        let target = Vec2::new(x, y);
        let limit = radius * radius;
        let mut best: Option<(f32, u32)> = None;

        // Rings wider than the occupied set are cheaper to answer by visiting every bucket
        let ring = (radius / self.cell_size).ceil().max(1.0);
        let span = 2.0 * ring as f64 + 1.0;
        if span * span > self.cells.len() as f64 {
            for bucket in self.cells.values() {
                self.nearest_in(bucket, target, limit, &mut best);
            }
            return best.map(|(_, index)| index as usize);
        }

        let ring = ring as i64;
        let (qx, qy) = self.cell_of(target);
        for dy in -ring..=ring {
            for dx in -ring..=ring {
                let (Ok(cx), Ok(cy)) = (i32::try_from(qx as i64 + dx), i32::try_from(qy as i64 + dy)) else {
                    continue;
                };
                if let Some(bucket) = self.cells.get(&cell_key(cx, cy)) {
                    self.nearest_in(bucket, target, limit, &mut best);
                }
            }
        }
        best.map(|(_, index)| index as usize)
    }

    #[inline]
    fn nearest_in(&self, bucket: &[u32], target: Vec2, limit: f32, best: &mut Option<(f32, u32)>) {
        for &index in bucket {
            let d2 = self.screen[index as usize].distance_squared(target);
            if d2 > limit {
                continue;
            }
            let closer = match *best {
                None => true,
                Some((best_d2, best_index)) => d2 < best_d2 || (d2 == best_d2 && index < best_index),
            };
            if closer {
                *best = Some((d2, index));
            }
        }
    }

    /// Screen position of an indexed point from the last build
    pub fn screen_position(&self, index: usize) -> Option<Vec2> {
        self.screen.get(index).copied()
    }

    /// Exhaustive O(N) reference scan with the same tie rule as [`Self::query`]
    #[cfg(test)]
    pub(crate) fn query_linear(&self, x: f32, y: f32, radius: f32) -> Option<usize> {
        let target = Vec2::new(x, y);
        let limit = radius * radius;
        let mut best: Option<(f32, usize)> = None;
        for (index, p) in self.screen.iter().enumerate() {
            if !p.is_finite() {
                continue;
            }
            let d2 = p.distance_squared(target);
            if d2 <= limit && best.map_or(true, |(b, _)| d2 < b) {
                best = Some((d2, index));
            }
        }
        best.map(|(_, index)| index)
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn viewport() -> Viewport {
        Viewport::new(1000, 1000)
    }

    #[test]
    fn test_query_finds_exact_point() {
        let mut grid = SpatialGrid::default();
        let positions = vec![Vec2::new(0.1, 0.1), Vec2::new(0.5, 0.5), Vec2::new(0.9, 0.2)];
        grid.build(&positions, &CameraTransform::default(), viewport());

        // (0.5, 0.5) lands at screen (500, 500)
        assert_eq!(grid.query(500.0, 500.0, 10.0), Some(1));
        assert_eq!(grid.query(503.0, 498.0, 10.0), Some(1));
        assert_eq!(grid.query(700.0, 700.0, 10.0), None);
    }

    #[test]
    fn test_query_respects_radius() {
        let mut grid = SpatialGrid::default();
        grid.build(&[Vec2::splat(0.5)], &CameraTransform::default(), viewport());

        assert_eq!(grid.query(510.0, 500.0, 10.0), Some(0));
        assert_eq!(grid.query(510.5, 500.0, 10.0), None);
    }

    #[test]
    fn test_points_across_cell_borders_are_found() {
        let mut grid = SpatialGrid::new(24.0);
        // Screen x = 479.9 sits in cell 19, the query at 480.1 in cell 20
        grid.build(&[Vec2::new(0.4799, 0.5)], &CameraTransform::default(), viewport());
        assert_eq!(grid.query(480.1, 500.0, 5.0), Some(0));
    }

    #[test]
    fn test_non_finite_positions_are_never_picked() {
        let mut grid = SpatialGrid::default();
        let positions = vec![Vec2::new(f32::NAN, 0.5), Vec2::new(0.5, 0.5)];
        grid.build(&positions, &CameraTransform::default(), viewport());

        assert_eq!(grid.len(), 2);
        assert_eq!(grid.query(500.0, 500.0, 50.0), Some(1));
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let mut grid = SpatialGrid::default();
        // Screen x 750 and 250, both exactly 250 px from the query
        let positions = vec![Vec2::new(0.75, 0.5), Vec2::new(0.25, 0.5)];
        grid.build(&positions, &CameraTransform::default(), viewport());
        assert_eq!(grid.query(500.0, 500.0, 300.0), Some(0));
    }

    #[test]
    fn test_rebuild_replaces_previous_contents() {
        let mut grid = SpatialGrid::default();
        grid.build(&[Vec2::splat(0.5)], &CameraTransform::default(), viewport());
        grid.build(&[Vec2::new(0.1, 0.1)], &CameraTransform::default(), viewport());

        assert_eq!(grid.len(), 1);
        assert_eq!(grid.query(500.0, 500.0, 10.0), None);
        assert_eq!(grid.query(100.0, 900.0, 10.0), Some(0));
    }

    #[test]
    fn test_camera_changes_screen_placement() {
        let mut grid = SpatialGrid::default();
        let camera = CameraTransform::new(Vec2::new(0.25, 0.25), 2.0);
        grid.build(&[Vec2::new(0.25, 0.25)], &camera, viewport());
        assert_eq!(grid.query(500.0, 500.0, 1.0), Some(0));
    }

    #[test]
    fn test_far_off_screen_query_does_not_overflow() {
        let mut grid = SpatialGrid::default();
        grid.build(&[Vec2::splat(0.5)], &CameraTransform::default(), viewport());

        assert_eq!(grid.query(1e12, 0.0, 5.0), None);
        assert_eq!(grid.query(-1e12, -1e12, 5.0), None);
        assert_eq!(grid.query(f32::MAX, f32::MAX, 24.0), None);
    }

    #[test]
    fn test_huge_radius_visits_occupied_cells_only() {
        let mut grid = SpatialGrid::default();
        let positions = vec![Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.9)];
        grid.build(&positions, &CameraTransform::default(), viewport());

        // A ring of this size would be ~1e20 cells if walked
        assert_eq!(grid.query(150.0, 850.0, 1e10), Some(0));
        assert_eq!(grid.query(850.0, 150.0, 1e10), Some(1));
        assert_eq!(grid.query(850.0, 150.0, 1e10), grid.query_linear(850.0, 150.0, 1e10));
    }

    #[test]
    fn test_grid_matches_exhaustive_scan_on_uniform_points() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for trial in 0..4 {
            let count = 10_000 + trial * 2_500;
            let positions: Vec<Vec2> = (0..count).map(|_| Vec2::new(rng.gen(), rng.gen())).collect();
            let camera = CameraTransform::new(Vec2::new(rng.gen_range(0.3..0.7), rng.gen_range(0.3..0.7)), rng.gen_range(0.8..3.0));
            let mut grid = SpatialGrid::default();
            grid.build(&positions, &camera, viewport());

            for _ in 0..500 {
                let x = rng.gen_range(-50.0..1050.0);
                let y = rng.gen_range(-50.0..1050.0);
                let radius = rng.gen_range(0.5..40.0);
                assert_eq!(grid.query(x, y, radius), grid.query_linear(x, y, radius), "trial {} at ({}, {}) r={}", trial, x, y, radius);
            }
        }
    }
}
