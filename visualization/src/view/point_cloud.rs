//! Point-cloud view
//!
//! Thin façade over [`PointPipeline`] and the bound [`PointBuffer`]. The
//! renderer never talks to the ingest pipeline; it only reads whichever buffer
//! was bound last, so a failed or in-flight ingest leaves the picture as it was.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;

use log::trace;
use wgpu::{Color, CommandEncoderDescriptor, Device, Queue, RenderPass, TextureFormat, TextureView};

use orbis_core::spatial::{CameraTransform, Viewport};

use crate::engine::buffer::{BoundPoints, PointBuffer, PointBufferHandle};
use crate::engine::pipeline::{PointPipeline, PointUniforms, DEFAULT_POINT_SIZE};

/// Background used by [`PointRenderer::encode_frame`]
pub const CLEAR_COLOR: Color = Color { r: 0.05, g: 0.06, b: 0.08, a: 1.0 };

pub struct PointRenderer {
    pipeline: PointPipeline,
    points: PointBufferHandle,
    point_size: f32,
}

impl PointRenderer {
    /// Create the renderer together with the uploader that feeds it
    pub fn new(device: Arc<Device>, format: TextureFormat) -> (Self, PointBuffer) {
        let pipeline = PointPipeline::new(&device, format);
        let buffer = PointBuffer::new(device);
        let renderer = Self { pipeline, points: buffer.handle(), point_size: DEFAULT_POINT_SIZE };
        (renderer, buffer)
    }

    pub fn with_point_size(mut self, point_size: f32) -> Self {
        if point_size.is_finite() && point_size > 0.0 {
            self.point_size = point_size;
        }
        self
    }

    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    pub fn points(&self) -> &PointBufferHandle {
        &self.points
    }

    /// Write uniforms for the current buffer and return it for drawing.
    ///
    /// Returns `None` before the first snapshot has been bound.
    pub fn prepare(&self, queue: &Queue, camera: &CameraTransform, viewport: Viewport) -> Option<BoundPoints> {
        let frame = self.points.current()?;
        let uniforms = PointUniforms::new(camera, viewport, &frame.bounds, frame.intensity, self.point_size);
        self.pipeline.update(queue, &uniforms);
        trace!("Prepared frame for buffer {} ({} points)", frame.sequence, frame.count);
        Some(frame)
    }

    pub fn render<'a>(&'a self, pass: &mut RenderPass<'a>, frame: &'a BoundPoints) {
        self.pipeline.draw(pass, frame);
    }

    /// Clear `target` and draw the current buffer in one submitted pass.
    ///
    /// Returns the sequence of the buffer drawn, if any.
    pub fn encode_frame(
        &self,
        device: &Device,
        queue: &Queue,
        target: &TextureView,
        camera: &CameraTransform,
        viewport: Viewport,
    ) -> Option<u64> {
        let frame = self.prepare(queue, camera, viewport);
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor { label: Some("ORBIS Frame") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ORBIS Point Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(CLEAR_COLOR), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(frame) = &frame {
                self.render(&mut pass, frame);
            }
        }
        queue.submit(Some(encoder.finish()));
        frame.map(|f| f.sequence)
    }
}
