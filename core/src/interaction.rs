//! Pointer interaction over the live snapshot
//!
//! The controller owns the camera and the picker. Once per frame
//! [`InteractionController::sync_frame`] rebuilds the picking grid when the
//! snapshot, camera or viewport changed and turns picker answers into
//! [`InteractionEvent`]s. Answers computed against a snapshot other than the
//! one the grid was built from are discarded.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec2;
use log::debug;
use serde::Serialize;

use crate::ingest::{LiveView, PointData, RenderState};
use crate::semantic::SemanticTuple;
use crate::spatial::{grid_signature, CameraTransform, PickHit, Picker, PickerConfig, Viewport};

/// What a listener learns about a point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSummary {
    pub index: u32,
    pub id: u32,
    pub display_id: String,
    pub position: Vec2,
    pub semantic: SemanticTuple,
    pub risk: f32,
    pub shock: f32,
}

impl From<&PointData> for PointSummary {
    fn from(point: &PointData) -> Self {
        Self {
            index: point.index,
            id: point.id,
            display_id: point.display_id(),
            position: point.position,
            semantic: point.semantic,
            risk: point.risk,
            shock: point.shock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InteractionEvent {
    Hover(PointSummary),
    HoverCleared,
    Select(PointSummary),
    /// Every click, with the point under it if any
    Click { position: Vec2, point: Option<PointSummary> },
    Focus(PointSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    Hover,
    Click,
}

pub struct InteractionController {
    live: LiveView,
    picker: Picker,
    camera: CameraTransform,
    viewport: Viewport,
    pick_radius: f32,
    focus_zoom: Option<f32>,
    signature: Option<u64>,
    indexed: Option<Arc<RenderState>>,
    pending: Option<(u64, QueryKind)>,
    deferred_hover: Option<Vec2>,
    hovered: Option<u32>,
    selected: Option<u32>,
    events: Sender<InteractionEvent>,
}

impl InteractionController {
    pub fn new(live: LiveView, config: &PickerConfig, events: Sender<InteractionEvent>) -> Self {
        Self {
            live,
            picker: Picker::new(config),
            camera: CameraTransform::default(),
            viewport: Viewport::default(),
            pick_radius: config.pick_radius,
            focus_zoom: config.focus_zoom,
            signature: None,
            indexed: None,
            pending: None,
            deferred_hover: None,
            hovered: None,
            selected: None,
            events,
        }
    }

    /// Controller plus the receiving end of its event stream
    pub fn with_channel(live: LiveView, config: &PickerConfig) -> (Self, Receiver<InteractionEvent>) {
        let (sender, receiver) = unbounded();
        (Self::new(live, config, sender), receiver)
    }

    pub fn camera(&self) -> &CameraTransform {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: CameraTransform) {
        self.camera = camera;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.camera.pan_pixels(delta, self.viewport);
    }

    pub fn zoom_about(&mut self, factor: f32, anchor: Vec2) {
        self.camera.zoom_about(factor, anchor, self.viewport);
    }

    pub fn hovered(&self) -> Option<u32> {
        self.hovered
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    /// Rebuild the grid if its inputs changed, then dispatch picker answers
    pub fn sync_frame(&mut self) {
        self.refresh_index();
        for hit in self.picker.poll() {
            self.handle_hit(hit);
        }
    }

    /// Like [`Self::sync_frame`], but waits up to `timeout` for the picker to settle
    pub fn settle(&mut self, timeout: Duration) {
        self.refresh_index();
        for hit in self.picker.poll_until_idle(timeout) {
            self.handle_hit(hit);
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if matches!(self.pending, Some((_, QueryKind::Click))) {
            self.deferred_hover = Some(Vec2::new(x, y));
            return;
        }
        self.submit(x, y, QueryKind::Hover);
    }

    pub fn pointer_clicked(&mut self, x: f32, y: f32) {
        self.deferred_hover = None;
        self.submit(x, y, QueryKind::Click);
    }

    /// Center the camera on a point of the live snapshot
    pub fn focus_point(&mut self, index: usize) -> Option<PointSummary> {
        let state = self.live.current()?;
        let point = state.point(index).filter(|point| point.pickable)?;
        self.camera.focus_on(point.position, self.focus_zoom);

        let summary = PointSummary::from(point);
        self.emit(InteractionEvent::Focus(summary.clone()));
        Some(summary)
    }

    fn refresh_index(&mut self) {
        let Some(state) = self.live.current() else {
            return;
        };
        let signature = grid_signature(state.sequence(), state.len(), &self.camera, self.viewport);
        if self.signature == Some(signature) {
            return;
        }

        let snapshot_changed = self.indexed.as_ref().map_or(true, |indexed| indexed.sequence() != state.sequence());
        if snapshot_changed && self.hovered.take().is_some() {
            self.emit(InteractionEvent::HoverCleared);
        }
        if snapshot_changed {
            self.selected = None;
        }

        self.signature = Some(signature);
        self.picker.rebuild(state.sequence(), Arc::clone(&state.pick_positions), self.camera, self.viewport);
        self.indexed = Some(state);
    }

    fn submit(&mut self, x: f32, y: f32, kind: QueryKind) {
        self.refresh_index();
        if self.indexed.is_none() {
            return;
        }
        let seq = self.picker.query(x, y, self.pick_radius);
        self.pending = Some((seq, kind));
    }

    fn handle_hit(&mut self, hit: PickHit) {
        let Some((seq, kind)) = self.pending else {
            return;
        };
        if hit.seq != seq {
            return;
        }
        self.pending = None;

        let Some(indexed) = self.indexed.clone() else {
            return;
        };
        if hit.tag != indexed.sequence() {
            debug!("Discarding pick for snapshot {} (indexed {})", hit.tag, indexed.sequence());
            self.resubmit_deferred();
            return;
        }

        let point = hit.index.and_then(|index| indexed.point(index)).map(PointSummary::from);
        match kind {
            QueryKind::Hover => match point {
                Some(point) if self.hovered != Some(point.index) => {
                    self.hovered = Some(point.index);
                    self.emit(InteractionEvent::Hover(point));
                }
                Some(_) => {}
                None => {
                    if self.hovered.take().is_some() {
                        self.emit(InteractionEvent::HoverCleared);
                    }
                }
            },
            QueryKind::Click => {
                self.selected = point.as_ref().map(|point| point.index);
                self.emit(InteractionEvent::Click { position: hit.position, point: point.clone() });
                if let Some(point) = point {
                    self.emit(InteractionEvent::Select(point));
                }
            }
        }
        self.resubmit_deferred();
    }

    fn resubmit_deferred(&mut self) {
        if let Some(position) = self.deferred_hover.take() {
            self.submit(position.x, position.y, QueryKind::Hover);
        }
    }

    fn emit(&self, event: InteractionEvent) {
        if self.events.send(event).is_err() {
            debug!("Interaction listener disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecodePath, VertexRecord};
    use crate::ingest::{project_points, Bounds, Snapshot};
    use crate::scheduler::AttemptTicket;

    fn publish(live: &LiveView, attempt: u64, xy: &[(f32, f32)]) {
        let records: Vec<VertexRecord> = xy
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| VertexRecord {
                id: 1000 + i as u32,
                meta: 0x00FF_0000 | i as u32,
                position: [x, y, 0.0],
                risk: 0.5,
                shock: 0.1,
            })
            .collect();
        let bounds = Bounds::compute(&records, 1.0);
        let points = project_points(&records, &bounds, usize::MAX);
        let snapshot = Snapshot { records, bounds, intensity: 0.1, path: DecodePath::Raw };
        live.replace(Arc::new(RenderState::new(AttemptTicket { epoch: 1, attempt }, snapshot, points)));
    }

    fn controller(isolated: bool) -> (InteractionController, Receiver<InteractionEvent>, LiveView) {
        let live = LiveView::new();
        let config = PickerConfig { isolated, pick_radius: 10.0, ..PickerConfig::default() };
        let (mut controller, events) = InteractionController::with_channel(live.clone(), &config);
        controller.set_viewport(Viewport::new(100, 100));
        (controller, events, live)
    }

    fn drain(events: &Receiver<InteractionEvent>) -> Vec<InteractionEvent> {
        events.try_iter().collect()
    }

    #[test]
    fn test_hover_then_leave() {
        let (mut controller, events, live) = controller(false);
        // Bounds [0, 10]²: (0,0) → screen (0,100), (10,10) → (100,0), (5,5) → (50,50)
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0), (5.0, 5.0)]);
        controller.sync_frame();

        controller.pointer_moved(52.0, 49.0);
        controller.sync_frame();
        let received = drain(&events);
        assert_eq!(received.len(), 1);
        let InteractionEvent::Hover(point) = &received[0] else {
            panic!("expected hover, got {:?}", received[0]);
        };
        assert_eq!(point.index, 2);
        assert_eq!(point.display_id, "1002");
        assert_eq!(controller.hovered(), Some(2));

        // Same point again emits nothing
        controller.pointer_moved(50.0, 50.0);
        controller.sync_frame();
        assert!(drain(&events).is_empty());

        controller.pointer_moved(25.0, 25.0);
        controller.sync_frame();
        assert_eq!(drain(&events), vec![InteractionEvent::HoverCleared]);
    }

    #[test]
    fn test_click_selects_point() {
        let (mut controller, events, live) = controller(false);
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0)]);

        controller.pointer_clicked(99.0, 1.0);
        controller.sync_frame();

        let received = drain(&events);
        assert_eq!(received.len(), 2);
        assert!(matches!(&received[0], InteractionEvent::Click { point: Some(p), .. } if p.index == 1));
        assert!(matches!(&received[1], InteractionEvent::Select(p) if p.id == 1001));
        assert_eq!(controller.selected(), Some(1));

        controller.pointer_clicked(50.0, 50.0);
        controller.sync_frame();
        assert_eq!(drain(&events), vec![InteractionEvent::Click { position: Vec2::new(50.0, 50.0), point: None }]);
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn test_hover_while_click_pending_is_deferred() {
        let (mut controller, events, live) = controller(false);
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0)]);

        controller.pointer_clicked(0.0, 100.0);
        controller.pointer_moved(100.0, 0.0);
        controller.sync_frame();
        controller.sync_frame();

        let received = drain(&events);
        assert!(matches!(&received[1], InteractionEvent::Select(p) if p.index == 0));
        assert!(matches!(&received[2], InteractionEvent::Hover(p) if p.index == 1));
    }

    #[test]
    fn test_pick_resolves_against_newest_snapshot() {
        let (mut controller, events, live) = controller(false);
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0), (5.0, 5.0)]);
        controller.sync_frame();
        controller.pointer_moved(50.0, 50.0);

        // A new snapshot lands before the answer is read
        publish(&live, 2, &[(0.0, 0.0), (10.0, 10.0)]);
        controller.sync_frame();
        controller.sync_frame();

        // Center is empty in snapshot 2, so no hover may come from snapshot 1
        assert!(drain(&events).iter().all(|event| !matches!(event, InteractionEvent::Hover(_))));
    }

    #[test]
    fn test_new_snapshot_clears_hover() {
        let (mut controller, events, live) = controller(false);
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0)]);
        controller.pointer_moved(0.0, 100.0);
        controller.sync_frame();
        drain(&events);

        publish(&live, 2, &[(0.0, 0.0), (10.0, 10.0)]);
        controller.sync_frame();
        assert_eq!(drain(&events), vec![InteractionEvent::HoverCleared]);
        assert_eq!(controller.hovered(), None);
    }

    #[test]
    fn test_focus_point_recenters_camera() {
        let (mut controller, events, live) = controller(false);
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0), (2.5, 7.5)]);
        controller.sync_frame();
        let generation = controller.picker().generation();

        let summary = controller.focus_point(2).unwrap();
        assert_eq!(controller.camera().center, Vec2::new(0.25, 0.75));
        assert_eq!(controller.camera().zoom, 4.0);
        assert_eq!(drain(&events), vec![InteractionEvent::Focus(summary)]);

        // Camera change forces a rebuild on the next frame
        controller.sync_frame();
        assert_eq!(controller.picker().generation(), generation + 1);

        assert!(controller.focus_point(99).is_none());
    }

    #[test]
    fn test_unpickable_points_cannot_be_focused() {
        let (mut controller, _events, live) = controller(false);
        publish(&live, 1, &[(f32::NAN, 1.0), (2.0, 2.0)]);
        assert!(controller.focus_point(0).is_none());
        assert!(controller.focus_point(1).is_some());
    }

    #[test]
    fn test_isolated_picker_delivers_hover() {
        let (mut controller, events, live) = controller(true);
        publish(&live, 1, &[(0.0, 0.0), (10.0, 10.0), (5.0, 5.0)]);

        controller.pointer_moved(50.0, 50.0);
        controller.settle(Duration::from_secs(5));

        let received = drain(&events);
        assert!(matches!(received.as_slice(), [InteractionEvent::Hover(p)] if p.index == 2));
    }

    #[test]
    fn test_no_snapshot_means_no_queries() {
        let (mut controller, events, _live) = controller(false);
        controller.pointer_moved(10.0, 10.0);
        controller.pointer_clicked(10.0, 10.0);
        controller.sync_frame();
        assert!(drain(&events).is_empty());
        assert!(controller.picker().is_idle());
    }
}
