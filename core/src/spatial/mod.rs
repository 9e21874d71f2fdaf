//! Spatial picking
//!
//! Screen-space grid index over projected point positions, the camera transform
//! it is keyed on, and the isolated worker that hosts it.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod camera;
pub mod grid;
pub mod worker;

pub use camera::{grid_signature, CameraTransform, Viewport};
pub use grid::{SpatialGrid, DEFAULT_CELL_SIZE};
pub use worker::{PickHit, Picker, PickerConfig, PickerError, PickerWorker};
