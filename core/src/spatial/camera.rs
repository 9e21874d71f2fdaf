//! Camera transform shared by the picker and the GPU path
//!
//! Points live in normalized `[0, 1]²` space after bounds normalization. The
//! camera maps that space to NDC as `(p - center) * 2 * zoom`, then to screen
//! pixels with the y axis pointing down.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Screen-space viewport in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// 2D camera over normalized point space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTransform {
    /// Normalized-space point shown at the viewport center
    pub center: Vec2,

    /// Magnification; 1.0 fits the unit square to the viewport
    pub zoom: f32,
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self { center: Vec2::splat(0.5), zoom: 1.0 }
    }
}

impl CameraTransform {
    pub const MIN_ZOOM: f32 = 0.05;
    pub const MAX_ZOOM: f32 = 512.0;

    pub fn new(center: Vec2, zoom: f32) -> Self {
        Self { center, zoom: zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM) }
    }

    #[inline]
    pub fn to_ndc(&self, normalized: Vec2) -> Vec2 {
        (normalized - self.center) * 2.0 * self.zoom
    }

    /// Project a normalized position to screen pixels
    #[inline]
    pub fn to_screen(&self, normalized: Vec2, viewport: Viewport) -> Vec2 {
        let ndc = self.to_ndc(normalized);
        let size = viewport.size();
        Vec2::new((ndc.x + 1.0) * 0.5 * size.x, (1.0 - ndc.y) * 0.5 * size.y)
    }

    /// Inverse of [`Self::to_screen`]
    pub fn screen_to_normalized(&self, screen: Vec2, viewport: Viewport) -> Vec2 {
        let size = viewport.size().max(Vec2::ONE);
        let ndc = Vec2::new(screen.x / size.x * 2.0 - 1.0, 1.0 - screen.y / size.y * 2.0);
        ndc / (2.0 * self.zoom) + self.center
    }

    /// Matrix form of [`Self::to_ndc`] for the vertex shader
    pub fn view_matrix(&self) -> Mat4 {
        let scale = 2.0 * self.zoom;
        Mat4::from_scale(Vec3::new(scale, scale, 1.0))
            * Mat4::from_translation(Vec3::new(-self.center.x, -self.center.y, 0.0))
    }

    /// Recenter on a normalized position, optionally changing zoom
    pub fn focus_on(&mut self, normalized: Vec2, zoom: Option<f32>) {
        if normalized.is_finite() {
            self.center = normalized;
        }
        if let Some(zoom) = zoom {
            self.zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        }
    }

    /// Multiply zoom, keeping the normalized point under `anchor` fixed on screen
    pub fn zoom_about(&mut self, factor: f32, anchor: Vec2, viewport: Viewport) {
        let before = self.screen_to_normalized(anchor, viewport);
        self.zoom = (self.zoom * factor).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        let after = self.screen_to_normalized(anchor, viewport);
        self.center += before - after;
    }

    pub fn pan_pixels(&mut self, delta: Vec2, viewport: Viewport) {
        let size = viewport.size().max(Vec2::ONE);
        self.center.x -= delta.x / size.x / self.zoom;
        self.center.y += delta.y / size.y / self.zoom;
    }

    fn hash_bits<H: Hasher>(&self, state: &mut H) {
        self.center.x.to_bits().hash(state);
        self.center.y.to_bits().hash(state);
        self.zoom.to_bits().hash(state);
    }
}

/// Hash of everything a grid build depends on
pub fn grid_signature(source: u64, point_count: usize, camera: &CameraTransform, viewport: Viewport) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    point_count.hash(&mut hasher);
    camera.hash_bits(&mut hasher);
    viewport.hash(&mut hasher);
    hasher.finish()
}
