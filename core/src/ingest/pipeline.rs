//! Snapshot ingest pipeline
//!
//! One attempt runs fetch → decode → bounds → projection → upload → commit.
//! The CPU-heavy middle (inflate, decode, projection) runs on the blocking pool
//! so the poll driver's runtime stays responsive. Every failure is converted into an [`AttemptReport`] at this boundary; the
//! live [`RenderState`] and the bound GPU buffer change only when all stages
//! succeed, so a bad cycle never blanks the view.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::bounds::{Bounds, DEFAULT_DEGENERATE_HALF_EXTENT};
use super::error::{ErrorClass, IngestError};
use super::live::{Diagnostics, LiveView, RenderState, Snapshot};
use super::projection::{project_points, sample_intensity, PointData};
use super::source::{FetchOutcome, SnapshotSource};
use super::upload::{GpuUploader, UploadBatch};
use crate::codec::{DecodePath, Payload, VertexRecord, WireCodec};
use crate::scheduler::{AttemptMode, AttemptOutcome, AttemptReport, AttemptRunner, AttemptTicket, EpochGate};

/// Ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Records sampled for the intensity scalar
    pub intensity_sample: usize,

    /// Point count at which projection goes parallel
    pub parallel_projection_threshold: usize,

    /// Half width given to an axis whose bounds collapse
    pub degenerate_half_extent: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            intensity_sample: 4096,
            parallel_projection_threshold: 16_384,
            degenerate_half_extent: DEFAULT_DEGENERATE_HALF_EXTENT,
        }
    }
}

enum Fetched {
    Payload(Payload),
    NoContent,
}

enum Ingested {
    Applied { count: usize, path: DecodePath },
    Empty,
}

/// Decoded and projected snapshot, not yet uploaded
struct Prepared {
    records: Vec<VertexRecord>,
    bounds: Bounds,
    intensity: f32,
    points: Vec<PointData>,
    path: DecodePath,
}

/// Decode and project a payload; `None` for an empty snapshot
fn prepare(codec: &WireCodec, config: &IngestConfig, payload: &Payload) -> Result<Option<Prepared>, IngestError> {
    let decoded = codec.decode(payload)?;
    if decoded.records.is_empty() {
        return Ok(None);
    }

    let records = decoded.records;
    let bounds = Bounds::compute(&records, config.degenerate_half_extent);
    let intensity = sample_intensity(&records, config.intensity_sample);
    let points = project_points(&records, &bounds, config.parallel_projection_threshold);
    Ok(Some(Prepared { records, bounds, intensity, points, path: decoded.path }))
}

struct Committer<U> {
    uploader: U,
    last_applied: Option<AttemptTicket>,
}

pub struct IngestPipeline<U: GpuUploader> {
    primary: Arc<dyn SnapshotSource>,
    degraded: Option<Arc<dyn SnapshotSource>>,
    codec: WireCodec,
    config: IngestConfig,
    gate: EpochGate,
    live: LiveView,
    diagnostics: Diagnostics,
    committer: Mutex<Committer<U>>,
}

impl<U: GpuUploader> IngestPipeline<U> {
    pub fn new(primary: Arc<dyn SnapshotSource>, uploader: U, gate: EpochGate) -> Self {
        Self {
            primary,
            degraded: None,
            codec: WireCodec::default(),
            config: IngestConfig::default(),
            gate,
            live: LiveView::new(),
            diagnostics: Diagnostics::new(),
            committer: Mutex::new(Committer { uploader, last_applied: None }),
        }
    }

    pub fn with_degraded(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.degraded = Some(source);
        self
    }

    pub fn with_codec(mut self, codec: WireCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle for readers of the live state
    pub fn live(&self) -> &LiveView {
        &self.live
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn gate(&self) -> &EpochGate {
        &self.gate
    }

    /// Inspect the uploader between attempts
    pub fn with_uploader<R>(&self, f: impl FnOnce(&U) -> R) -> R {
        f(&self.committer.lock().uploader)
    }

    /// Run one attempt end to end; never fails
    pub async fn run_attempt(&self, ticket: AttemptTicket, mode: AttemptMode) -> AttemptReport {
        let (fetched, source_unavailable) = self.fetch(mode).await;
        let result = match fetched {
            Ok(Fetched::Payload(payload)) => self.ingest(ticket, payload).await,
            Ok(Fetched::NoContent) => Ok(Ingested::Empty),
            Err(e) => Err(e),
        };
        match self.conclude(ticket, result) {
            AttemptOutcome::Cancelled => AttemptReport::cancelled(),
            outcome => AttemptReport::new(outcome).with_source_unavailable(source_unavailable),
        }
    }

    /// Fetch from the source chosen by `mode`; the flag reports primary unavailability
    async fn fetch(&self, mode: AttemptMode) -> (Result<Fetched, IngestError>, bool) {
        if mode == AttemptMode::Degraded {
            if let Some(degraded) = &self.degraded {
                return (fetch_from(degraded.as_ref()).await, false);
            }
        }

        match fetch_from(self.primary.as_ref()).await {
            Err(IngestError::Unavailable { source_name, retry_after }) => match &self.degraded {
                Some(degraded) => {
                    info!("Source '{}' unavailable; trying '{}'", source_name, degraded.name());
                    (fetch_from(degraded.as_ref()).await, true)
                }
                None => (Err(IngestError::Unavailable { source_name, retry_after }), true),
            },
            other => (other, false),
        }
    }

    async fn ingest(&self, ticket: AttemptTicket, payload: Payload) -> Result<Ingested, IngestError> {
        let codec = self.codec.clone();
        let config = self.config.clone();
        let prepared = tokio::task::spawn_blocking(move || prepare(&codec, &config, &payload))
            .await
            .map_err(|e| IngestError::Interrupted(e.to_string()))??;

        match prepared {
            Some(prepared) => self.commit(ticket, prepared),
            None => Ok(Ingested::Empty),
        }
    }

    fn commit(&self, ticket: AttemptTicket, prepared: Prepared) -> Result<Ingested, IngestError> {
        let Prepared { records, bounds, intensity, points, path } = prepared;

        let mut committer = self.committer.lock();
        self.ensure_current(ticket, committer.last_applied)?;

        let batch = UploadBatch { sequence: ticket.attempt, records: &records, bounds, intensity };
        let staged = committer.uploader.upload(&batch)?;

        // Staged buffer is dropped unbound if the attempt went stale meanwhile
        self.ensure_current(ticket, committer.last_applied)?;

        let count = records.len();
        let snapshot = Snapshot { records, bounds, intensity, path };
        let state = Arc::new(RenderState::new(ticket, snapshot, points));
        committer.uploader.bind(staged);
        committer.last_applied = Some(ticket);
        self.live.replace(state);

        Ok(Ingested::Applied { count, path })
    }

    fn ensure_current(&self, ticket: AttemptTicket, last_applied: Option<AttemptTicket>) -> Result<(), IngestError> {
        let newer_than_applied = last_applied.map_or(true, |applied| ticket > applied);
        if self.gate.admits(ticket.epoch) && newer_than_applied {
            Ok(())
        } else {
            Err(IngestError::Superseded { ticket })
        }
    }

    fn conclude(&self, ticket: AttemptTicket, result: Result<Ingested, IngestError>) -> AttemptOutcome {
        // Results from a closed epoch are dropped silently
        if !self.gate.admits(ticket.epoch) {
            debug!("Dropping result of attempt {} from closed epoch", ticket);
            return AttemptOutcome::Cancelled;
        }
        match result {
            Ok(Ingested::Applied { count, path }) => {
                info!("Applied snapshot {} with {} points ({:?})", ticket, count, path);
                self.diagnostics.record_applied();
                AttemptOutcome::Applied
            }
            Ok(Ingested::Empty) => {
                debug!("Attempt {} had no content; keeping snapshot {}", ticket, self.live.sequence());
                self.diagnostics.record_idle();
                AttemptOutcome::NoContent
            }
            Err(e) => {
                let class = e.class();
                match class {
                    ErrorClass::Cancelled => {
                        debug!("{}", e);
                        return AttemptOutcome::Cancelled;
                    }
                    _ => warn!("Attempt {} failed ({}): {}", ticket, class, e),
                }
                self.diagnostics.record_error(class, e.to_string());
                match class {
                    ErrorClass::TransientUnavailable => AttemptOutcome::TransientFailure,
                    _ => AttemptOutcome::ContractFailure,
                }
            }
        }
    }
}

async fn fetch_from(source: &dyn SnapshotSource) -> Result<Fetched, IngestError> {
    match source.fetch().await {
        Ok(FetchOutcome::Payload(payload)) => Ok(Fetched::Payload(payload)),
        Ok(FetchOutcome::NoContent) => Ok(Fetched::NoContent),
        Ok(FetchOutcome::Unavailable { retry_after }) => Err(IngestError::Unavailable {
            source_name: source.name().to_owned(),
            retry_after,
        }),
        Err(error) => Err(IngestError::Source { source_name: source.name().to_owned(), error }),
    }
}

#[async_trait]
impl<U> AttemptRunner for IngestPipeline<U>
where
    U: GpuUploader + 'static,
{
    async fn run(&self, ticket: AttemptTicket, mode: AttemptMode) -> AttemptReport {
        self.run_attempt(ticket, mode).await
    }
}
