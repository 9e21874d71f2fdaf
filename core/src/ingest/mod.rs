//! Snapshot ingest
//!
//! Turns fetched payloads into the live render state: decode, bound, project,
//! upload and commit, keeping the last good snapshot whenever a cycle fails.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod bounds;
pub mod error;
pub mod http;
pub mod live;
pub mod pipeline;
pub mod projection;
pub mod source;
pub mod upload;

pub use bounds::{Bounds, DEFAULT_DEGENERATE_HALF_EXTENT};
pub use error::{ErrorClass, IngestError};
pub use http::HttpSnapshotSource;
pub use live::{Diagnostics, DiagnosticsSnapshot, LiveView, RenderState, Snapshot};
pub use pipeline::{IngestConfig, IngestPipeline};
pub use projection::{project_points, sample_intensity, PointData};
pub use source::{FetchOutcome, SnapshotSource, SourceError};
pub use upload::{GpuUploader, HeadlessBuffer, HeadlessUploader, UploadBatch, UploadError};
