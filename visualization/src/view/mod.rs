//! Views
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod point_cloud;

pub use point_cloud::{PointRenderer, CLEAR_COLOR};
