//! GPU point buffer
//!
//! Each upload allocates a fresh vertex buffer sized to the snapshot; binding
//! swaps it into a shared slot that the renderer reads once per frame. The
//! renderer keeps its own `Arc` for the duration of a pass, so a swap never
//! frees a buffer that is still being drawn.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use log::{debug, info};
use parking_lot::RwLock;
use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferUsages, Device};

use orbis_core::codec::VertexRecord;
use orbis_core::ingest::{Bounds, GpuUploader, UploadBatch, UploadError};

/// GPU copy of one Vertex Record, byte-identical to the wire layout
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub id: u32,
    pub word: u32,
    pub position: [f32; 3],
    pub risk: f32,
    pub shock: f32,
}

impl From<&VertexRecord> for GpuVertex {
    fn from(record: &VertexRecord) -> Self {
        Self {
            id: record.id,
            word: record.meta,
            position: record.position,
            risk: record.risk,
            shock: record.shock,
        }
    }
}

/// Refuse buffers the device cannot allocate
pub fn check_capacity(requested: u64, limit: u64) -> Result<(), UploadError> {
    if requested > limit {
        return Err(UploadError::ExceedsLimit { requested, limit });
    }
    Ok(())
}

/// A vertex buffer together with the snapshot parameters it was built from
#[derive(Debug, Clone)]
pub struct BoundPoints {
    pub buffer: Arc<Buffer>,
    pub count: u32,
    pub sequence: u64,
    pub bounds: Bounds,
    pub intensity: f32,
}

/// Reader side of a [`PointBuffer`]
#[derive(Debug, Clone, Default)]
pub struct PointBufferHandle {
    slot: Arc<RwLock<Option<BoundPoints>>>,
}

impl PointBufferHandle {
    /// Buffer to draw this frame, if any snapshot was ever bound
    pub fn current(&self) -> Option<BoundPoints> {
        self.slot.read().clone()
    }
}

pub struct PointBuffer {
    device: Arc<Device>,
    slot: Arc<RwLock<Option<BoundPoints>>>,
}

impl PointBuffer {
    pub fn new(device: Arc<Device>) -> Self {
        Self { device, slot: Arc::new(RwLock::new(None)) }
    }

    pub fn handle(&self) -> PointBufferHandle {
        PointBufferHandle { slot: Arc::clone(&self.slot) }
    }
}

impl GpuUploader for PointBuffer {
    type Staged = BoundPoints;

    fn upload(&mut self, batch: &UploadBatch<'_>) -> Result<BoundPoints, UploadError> {
        check_capacity(batch.byte_len(), self.device.limits().max_buffer_size)?;
        let count = u32::try_from(batch.records.len())
            .map_err(|_| UploadError::ExceedsLimit { requested: batch.byte_len(), limit: u32::MAX as u64 })?;

        let vertices: Vec<GpuVertex> = batch.records.iter().map(GpuVertex::from).collect();
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ORBIS Point Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        });
        debug!("Staged point buffer {}: {} points", batch.sequence, count);

        Ok(BoundPoints {
            buffer: Arc::new(buffer),
            count,
            sequence: batch.sequence,
            bounds: batch.bounds,
            intensity: batch.intensity,
        })
    }

    fn bind(&mut self, staged: BoundPoints) {
        info!("Point buffer {} bound ({} points)", staged.sequence, staged.count);
        *self.slot.write() = Some(staged);
    }
}
