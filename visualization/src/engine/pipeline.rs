//! Point render pipeline
//!
//! One instanced draw per frame: six quad corners per point, the point buffer
//! stepping per instance. Uniforms carry the camera matrix plus the bounds and
//! intensity of whichever buffer is being drawn, so a snapshot swap changes
//! geometry and normalization in the same frame.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use bytemuck::{Pod, Zeroable};
use log::debug;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, Queue, RenderPass, RenderPipeline, TextureFormat,
    VertexBufferLayout, VertexStepMode,
};

use orbis_core::codec::STRIDE;
use orbis_core::ingest::Bounds;
use orbis_core::spatial::{CameraTransform, Viewport};

use super::buffer::BoundPoints;
use super::shader::{create_point_shader, FRAGMENT_ENTRY, VERTEX_ENTRY};

/// Vertices emitted per point instance
pub const QUAD_VERTICES: u32 = 6;

/// Default point diameter in pixels before shock scaling
pub const DEFAULT_POINT_SIZE: f32 = 6.0;

const POINT_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Uint32,
    1 => Uint32,
    2 => Float32x3,
    3 => Float32,
    4 => Float32,
];

/// Instance buffer layout matching the 28-byte Vertex Record
pub fn vertex_layout() -> VertexBufferLayout<'static> {
    VertexBufferLayout {
        array_stride: STRIDE as wgpu::BufferAddress,
        step_mode: VertexStepMode::Instance,
        attributes: &POINT_ATTRIBUTES,
    }
}

/// Uniform block, laid out as the WGSL `Uniforms` struct
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointUniforms {
    pub view: [[f32; 4]; 4],
    pub bounds_min: [f32; 2],
    pub bounds_span: [f32; 2],
    pub viewport: [f32; 2],
    pub point_size: f32,
    pub intensity: f32,
}

impl PointUniforms {
    pub fn new(camera: &CameraTransform, viewport: Viewport, bounds: &Bounds, intensity: f32, point_size: f32) -> Self {
        let size = viewport.size().max(glam::Vec2::ONE);
        Self {
            view: camera.view_matrix().to_cols_array_2d(),
            bounds_min: [bounds.min_x, bounds.min_y],
            bounds_span: [bounds.width().max(f32::EPSILON), bounds.height().max(f32::EPSILON)],
            viewport: [size.x, size.y],
            point_size,
            intensity: if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 },
        }
    }
}

pub struct PointPipeline {
    pipeline: RenderPipeline,
    uniform_buffer: Buffer,
    bind_group: BindGroup,
}

impl PointPipeline {
    pub fn new(device: &Device, format: TextureFormat) -> Self {
        let shader = create_point_shader(device);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ORBIS Point Uniforms"),
            contents: bytemuck::bytes_of(&PointUniforms::zeroed()),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let bind_group_layout = uniform_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ORBIS Point Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ORBIS Point Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ORBIS Point Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: VERTEX_ENTRY,
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: FRAGMENT_ENTRY,
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        debug!("Point pipeline created for {:?}", format);

        Self { pipeline, uniform_buffer, bind_group }
    }

    pub fn update(&self, queue: &Queue, uniforms: &PointUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn draw<'a>(&'a self, pass: &mut RenderPass<'a>, points: &'a BoundPoints) {
        if points.count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, points.buffer.slice(..));
        pass.draw(0..QUAD_VERTICES, 0..points.count);
    }
}

fn uniform_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ORBIS Point Uniform Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<PointUniforms>() as u64),
            },
            count: None,
        }],
    })
}
