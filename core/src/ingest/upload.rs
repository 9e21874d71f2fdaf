//! GPU upload seam
//!
//! Uploading is two-phase. [`GpuUploader::upload`] writes the batch into a new
//! staged buffer while the previous one stays bound; [`GpuUploader::bind`]
//! makes the staged buffer current and cannot fail. A staged buffer that is
//! dropped instead of bound is simply released.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::debug;
use thiserror::Error;

use super::bounds::Bounds;
use crate::codec::{VertexRecord, STRIDE};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Vertex buffer of {requested} bytes exceeds device limit of {limit} bytes")]
    ExceedsLimit { requested: u64, limit: u64 },

    #[error("GPU device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Everything the GPU side needs for one snapshot
#[derive(Debug, Clone, Copy)]
pub struct UploadBatch<'a> {
    pub sequence: u64,
    pub records: &'a [VertexRecord],
    pub bounds: Bounds,
    pub intensity: f32,
}

impl UploadBatch<'_> {
    pub fn byte_len(&self) -> u64 {
        (self.records.len() * STRIDE) as u64
    }
}

/// Replaces the GPU vertex buffer without ever leaving it blank
pub trait GpuUploader: Send {
    type Staged: Send;

    fn upload(&mut self, batch: &UploadBatch<'_>) -> Result<Self::Staged, UploadError>;

    fn bind(&mut self, staged: Self::Staged);
}

/// Summary of a batch accepted by [`HeadlessUploader`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessBuffer {
    pub sequence: u64,
    pub count: usize,
    pub bounds: Bounds,
}

/// Uploader without a device, used by the probe binary and tests
#[derive(Debug, Default)]
pub struct HeadlessUploader {
    bound: Option<HeadlessBuffer>,
    binds: u64,
    byte_limit: Option<u64>,
}

impl HeadlessUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject batches larger than `limit` bytes, like a device would
    pub fn with_byte_limit(limit: u64) -> Self {
        Self { byte_limit: Some(limit), ..Self::default() }
    }

    pub fn bound(&self) -> Option<HeadlessBuffer> {
        self.bound
    }

    pub fn binds(&self) -> u64 {
        self.binds
    }
}

impl GpuUploader for HeadlessUploader {
    type Staged = HeadlessBuffer;

    fn upload(&mut self, batch: &UploadBatch<'_>) -> Result<HeadlessBuffer, UploadError> {
        if let Some(limit) = self.byte_limit {
            if batch.byte_len() > limit {
                return Err(UploadError::ExceedsLimit { requested: batch.byte_len(), limit });
            }
        }
        Ok(HeadlessBuffer { sequence: batch.sequence, count: batch.records.len(), bounds: batch.bounds })
    }

    fn bind(&mut self, staged: HeadlessBuffer) {
        debug!("Headless buffer {} bound: {} records", staged.sequence, staged.count);
        self.bound = Some(staged);
        self.binds += 1;
    }
}
