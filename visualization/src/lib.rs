//! ORBIS visualization
//!
//! wgpu side of the engine. [`engine::PointBuffer`] implements
//! [`orbis_core::ingest::GpuUploader`], so the ingest pipeline swaps GPU
//! buffers directly; [`view::PointRenderer`] draws whichever buffer is bound.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod engine;
pub mod view;

pub use engine::{BoundPoints, PointBuffer, PointBufferHandle, PointPipeline, PointUniforms};
pub use view::PointRenderer;
