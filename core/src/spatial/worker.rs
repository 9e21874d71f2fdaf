//! Isolated picker context
//!
//! The grid lives on a dedicated thread and is reached only through crossbeam
//! channels, so a build over 100k points never stalls the render loop. The
//! front-end [`Picker`] keeps at most one round trip in flight: newer build or
//! query requests replace older queued ones, and responses that were superseded
//! while in flight are dropped on arrival. When the thread cannot be started,
//! or dies, the same grid runs inline.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use glam::Vec2;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::camera::{CameraTransform, Viewport};
use super::grid::{SpatialGrid, DEFAULT_CELL_SIZE};

/// Picker errors
#[derive(Error, Debug)]
pub enum PickerError {
    #[error("Picker thread could not be spawned: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Picker thread disconnected")]
    Disconnected,
}

/// Picker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Grid cell edge in pixels
    pub cell_size: f32,

    /// Pointer pick radius in pixels
    pub pick_radius: f32,

    /// Run the grid on its own thread
    pub isolated: bool,

    /// Zoom applied by focus-point, `None` keeps the current zoom
    pub focus_zoom: Option<f32>,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            pick_radius: 12.0,
            isolated: true,
            focus_zoom: Some(4.0),
        }
    }
}

/// Build request, tagged with the snapshot sequence it was derived from
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub generation: u64,
    pub tag: u64,
    pub positions: Arc<[Vec2]>,
    pub camera: CameraTransform,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryRequest {
    pub seq: u64,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

enum WorkerMessage {
    Build(BuildRequest),
    Query(QueryRequest),
    Shutdown,
}

enum WorkerReply {
    Built { generation: u64, tag: u64 },
    Hit(PickHit),
}

/// Answer to one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Query sequence number
    pub seq: u64,

    /// Grid generation the query ran against
    pub generation: u64,

    /// Snapshot tag of that grid
    pub tag: u64,

    /// Nearest point index within radius
    pub index: Option<usize>,

    /// Query position in screen pixels
    pub position: Vec2,
}

/// Grid state shared by both backends
struct GridHost {
    grid: SpatialGrid,
    generation: u64,
    tag: u64,
}

impl GridHost {
    fn new(cell_size: f32) -> Self {
        Self { grid: SpatialGrid::new(cell_size), generation: 0, tag: 0 }
    }

    fn handle(&mut self, message: WorkerMessage) -> Option<WorkerReply> {
        match message {
            WorkerMessage::Build(request) => {
                self.grid.build(&request.positions, &request.camera, request.viewport);
                self.generation = request.generation;
                self.tag = request.tag;
                debug!(
                    "Picker grid generation {} built: {} points in {} cells",
                    request.generation,
                    self.grid.len(),
                    self.grid.occupied_cells()
                );
                Some(WorkerReply::Built { generation: request.generation, tag: request.tag })
            }
            WorkerMessage::Query(query) => Some(WorkerReply::Hit(PickHit {
                seq: query.seq,
                generation: self.generation,
                tag: self.tag,
                index: self.grid.query(query.x, query.y, query.radius),
                position: Vec2::new(query.x, query.y),
            })),
            WorkerMessage::Shutdown => None,
        }
    }
}

/// Dedicated picker thread
pub struct PickerWorker {
    requests: Sender<WorkerMessage>,
    replies: Receiver<WorkerReply>,
    handle: Option<JoinHandle<()>>,
}

impl PickerWorker {
    pub fn spawn(cell_size: f32) -> Result<Self, PickerError> {
        let (request_tx, request_rx) = unbounded::<WorkerMessage>();
        let (reply_tx, reply_rx) = unbounded::<WorkerReply>();

        let handle = thread::Builder::new().name("orbis-picker".into()).spawn(move || {
            let mut host = GridHost::new(cell_size);
            while let Ok(message) = request_rx.recv() {
                match host.handle(message) {
                    Some(reply) => {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            debug!("Picker thread exiting");
        })?;

        Ok(Self { requests: request_tx, replies: reply_rx, handle: Some(handle) })
    }

    fn send(&self, message: WorkerMessage) -> Result<(), PickerError> {
        self.requests.send(message).map_err(|_| PickerError::Disconnected)
    }
}

impl Drop for PickerWorker {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Picker thread panicked during shutdown");
            }
        }
    }
}

enum Backend {
    Isolated(PickerWorker),
    Inline { host: GridHost, replies: VecDeque<WorkerReply> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Build(u64),
    Query(u64),
}

/// Front end of the picking context, owned by the interaction layer
pub struct Picker {
    backend: Backend,
    cell_size: f32,
    generation: u64,
    query_seq: u64,
    built_generation: u64,
    in_flight: Option<InFlight>,
    queued_build: Option<BuildRequest>,
    queued_query: Option<QueryRequest>,
    last_build: Option<BuildRequest>,
    last_query: Option<QueryRequest>,
}

impl Picker {
    /// Start an isolated picker when configured, falling back to inline
    pub fn new(config: &PickerConfig) -> Self {
        let backend = if config.isolated {
            match PickerWorker::spawn(config.cell_size) {
                Ok(worker) => Backend::Isolated(worker),
                Err(e) => {
                    warn!("{}; picking runs inline", e);
                    Self::inline_backend(config.cell_size)
                }
            }
        } else {
            Self::inline_backend(config.cell_size)
        };

        Self {
            backend,
            cell_size: config.cell_size,
            generation: 0,
            query_seq: 0,
            built_generation: 0,
            in_flight: None,
            queued_build: None,
            queued_query: None,
            last_build: None,
            last_query: None,
        }
    }

    fn inline_backend(cell_size: f32) -> Backend {
        Backend::Inline { host: GridHost::new(cell_size), replies: VecDeque::new() }
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self.backend, Backend::Isolated(_))
    }

    /// Latest requested grid generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the grid the backend currently holds
    pub fn built_generation(&self) -> u64 {
        self.built_generation
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queued_build.is_none() && self.queued_query.is_none()
    }

    /// Request a full rebuild; returns the new generation
    pub fn rebuild(&mut self, tag: u64, positions: Arc<[Vec2]>, camera: CameraTransform, viewport: Viewport) -> u64 {
        self.generation += 1;
        self.queued_build = Some(BuildRequest { generation: self.generation, tag, positions, camera, viewport });
        self.pump();
        self.generation
    }

    /// Request the nearest point to a screen position; returns the query sequence
    pub fn query(&mut self, x: f32, y: f32, radius: f32) -> u64 {
        self.query_seq += 1;
        self.queued_query = Some(QueryRequest { seq: self.query_seq, x, y, radius });
        self.pump();
        self.query_seq
    }

    /// Drain available responses without blocking
    pub fn poll(&mut self) -> Vec<PickHit> {
        let mut hits = Vec::new();
        while let Some(reply) = self.try_reply() {
            if let Some(hit) = self.accept(reply) {
                hits.push(hit);
            }
            self.pump();
        }
        hits
    }

    /// Block up to `timeout` for outstanding work to settle
    pub fn poll_until_idle(&mut self, timeout: Duration) -> Vec<PickHit> {
        let deadline = std::time::Instant::now() + timeout;
        let mut hits = self.poll();
        while self.in_flight.is_some() {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let reply = match &self.backend {
                Backend::Isolated(worker) => match worker.replies.recv_timeout(remaining) {
                    Ok(reply) => reply,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        self.fall_back_inline();
                        continue;
                    }
                },
                Backend::Inline { .. } => match self.try_reply() {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if let Some(hit) = self.accept(reply) {
                hits.push(hit);
            }
            self.pump();
            hits.extend(self.poll());
        }
        hits
    }

    fn try_reply(&mut self) -> Option<WorkerReply> {
        match &mut self.backend {
            Backend::Isolated(worker) => match worker.replies.try_recv() {
                Ok(reply) => Some(reply),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.fall_back_inline();
                    self.try_reply()
                }
            },
            Backend::Inline { replies, .. } => replies.pop_front(),
        }
    }

    fn accept(&mut self, reply: WorkerReply) -> Option<PickHit> {
        match reply {
            WorkerReply::Built { generation, .. } => {
                if self.in_flight == Some(InFlight::Build(generation)) {
                    self.in_flight = None;
                }
                self.built_generation = generation;
                None
            }
            WorkerReply::Hit(hit) => {
                if self.in_flight == Some(InFlight::Query(hit.seq)) {
                    self.in_flight = None;
                }
                if hit.seq != self.query_seq {
                    debug!("Dropping superseded pick response {} (latest {})", hit.seq, self.query_seq);
                    return None;
                }
                if hit.generation != self.generation {
                    // Grid was replaced after this query left; ask again once the new grid lands
                    if self.queued_query.is_none() {
                        self.queued_query = self.last_query;
                    }
                    return None;
                }
                Some(hit)
            }
        }
    }

    /// Dispatch the next queued request if nothing is in flight
    fn pump(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let message = if let Some(build) = self.queued_build.take() {
            self.in_flight = Some(InFlight::Build(build.generation));
            self.last_build = Some(build.clone());
            WorkerMessage::Build(build)
        } else if let Some(query) = self.queued_query.take() {
            self.in_flight = Some(InFlight::Query(query.seq));
            self.last_query = Some(query);
            WorkerMessage::Query(query)
        } else {
            return;
        };
        self.dispatch(message);
    }

    fn dispatch(&mut self, message: WorkerMessage) {
        match &mut self.backend {
            Backend::Isolated(worker) => {
                if let Err(e) = worker.send(message) {
                    warn!("{}; switching picker inline", e);
                    self.fall_back_inline();
                }
            }
            Backend::Inline { host, replies } => {
                if let Some(reply) = host.handle(message) {
                    replies.push_back(reply);
                }
            }
        }
    }

    /// Replace a dead worker with the inline grid and replay the latest requests
    fn fall_back_inline(&mut self) {
        self.backend = Self::inline_backend(self.cell_size);
        self.in_flight = None;
        if self.queued_build.is_none() {
            self.queued_build = self.last_build.clone().map(|mut build| {
                build.generation = self.generation;
                build
            });
        }
        if self.queued_query.is_none() {
            self.queued_query = self.last_query;
        }
        self.pump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions() -> Arc<[Vec2]> {
        vec![Vec2::new(0.25, 0.25), Vec2::splat(0.5), Vec2::new(0.75, 0.75)].into()
    }

    fn config(isolated: bool) -> PickerConfig {
        PickerConfig { isolated, ..PickerConfig::default() }
    }

    fn hits_for(isolated: bool) -> Vec<PickHit> {
        let mut picker = Picker::new(&config(isolated));
        picker.rebuild(7, positions(), CameraTransform::default(), Viewport::new(400, 400));
        picker.query(200.0, 200.0, 10.0);
        picker.poll_until_idle(Duration::from_secs(5))
    }

    #[test]
    fn test_isolated_and_inline_agree() {
        let isolated = hits_for(true);
        let inline = hits_for(false);

        assert_eq!(isolated.len(), 1);
        assert_eq!(isolated[0].index, Some(1));
        assert_eq!(isolated[0].tag, 7);
        assert_eq!(isolated[0].index, inline[0].index);
        assert_eq!(isolated[0].generation, inline[0].generation);
    }

    #[test]
    fn test_only_latest_query_is_answered() {
        let mut picker = Picker::new(&config(true));
        picker.rebuild(1, positions(), CameraTransform::default(), Viewport::new(400, 400));
        picker.query(100.0, 300.0, 10.0);
        picker.query(300.0, 100.0, 10.0);
        let latest = picker.query(200.0, 200.0, 10.0);

        let hits = picker.poll_until_idle(Duration::from_secs(5));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].seq, latest);
        assert_eq!(hits[0].index, Some(1));
    }

    #[test]
    fn test_query_after_rebuild_uses_new_grid() {
        let mut picker = Picker::new(&config(false));
        picker.rebuild(1, positions(), CameraTransform::default(), Viewport::new(400, 400));
        picker.poll();
        picker.rebuild(2, vec![Vec2::new(0.9, 0.9)].into(), CameraTransform::default(), Viewport::new(400, 400));
        picker.query(200.0, 200.0, 10.0);

        let hits = picker.poll_until_idle(Duration::from_secs(1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tag, 2);
        assert_eq!(hits[0].index, None);
        assert_eq!(picker.built_generation(), 2);
    }

    #[test]
    fn test_stale_generation_hit_is_requeued() {
        let mut picker = Picker::new(&config(true));
        picker.rebuild(1, positions(), CameraTransform::default(), Viewport::new(400, 400));
        picker.poll_until_idle(Duration::from_secs(5));

        // Query leaves against generation 1, then a rebuild is requested behind it
        picker.query(200.0, 200.0, 10.0);
        picker.rebuild(2, positions(), CameraTransform::default(), Viewport::new(400, 400));

        let hits = picker.poll_until_idle(Duration::from_secs(5));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].generation, 2);
        assert_eq!(hits[0].tag, 2);
        assert!(picker.is_idle());
    }
}
