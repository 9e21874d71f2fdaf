//! GPU engine: point buffer, generated shader and render pipeline
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod buffer;
pub mod pipeline;
pub mod shader;

pub use buffer::{check_capacity, BoundPoints, GpuVertex, PointBuffer, PointBufferHandle};
pub use pipeline::{vertex_layout, PointPipeline, PointUniforms, DEFAULT_POINT_SIZE, QUAD_VERTICES};
pub use shader::{create_point_shader, point_shader_source, semantic_decoders};
