//! ORBIS core
//!
//! Streaming point-cloud ingest for analytics front ends: the 28-byte Vertex
//! Record codec, the bit-packed semantic decoder, a completion-chained poll
//! scheduler, the never-blank snapshot ingest pipeline, and screen-space
//! spatial picking with an isolated worker thread.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod codec;
pub mod config;
pub mod ingest;
pub mod interaction;
pub mod scheduler;
pub mod semantic;
pub mod spatial;

pub use codec::{VertexRecord, WireCodec, STRIDE};
pub use config::{ConfigError, OrbisConfig};
pub use ingest::{GpuUploader, IngestPipeline, LiveView, RenderState};
pub use interaction::{InteractionController, InteractionEvent};
pub use scheduler::{EpochGate, PollDriver, PollScheduler};
pub use semantic::{SemanticDecoder, SemanticTuple};
pub use spatial::{CameraTransform, Picker, SpatialGrid, Viewport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
