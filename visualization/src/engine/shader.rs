//! Point shader generation
//!
//! The semantic decode functions are emitted from
//! [`orbis_core::semantic::SEMANTIC_FIELDS`], so the shader reads exactly the
//! bits the CPU tooltip path reads. Each field `f` yields
//! `semantic_f_raw(word) -> u32` and `semantic_f(word) -> f32`.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::borrow::Cow;
use std::fmt::Write;

use log::debug;
use orbis_core::semantic::{FieldLayout, SEMANTIC_FIELDS};
use wgpu::{Device, ShaderModule, ShaderModuleDescriptor, ShaderSource};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// WGSL for one field's decode pair
pub fn field_decoder(field: &FieldLayout) -> String {
    format!(
        "fn semantic_{name}_raw(word: u32) -> u32 {{\n    return (word >> {shift}u) & {mask}u;\n}}\n\n\
         fn semantic_{name}(word: u32) -> f32 {{\n    return f32(semantic_{name}_raw(word)) / {max}.0;\n}}\n",
        name = field.name,
        shift = field.shift,
        mask = field.mask(),
        max = field.max_value(),
    )
}

/// Decode functions for every semantic field
pub fn semantic_decoders() -> String {
    let mut out = String::from("// Generated from the semantic field layout\n\n");
    for field in SEMANTIC_FIELDS.iter() {
        let _ = writeln!(out, "{}", field_decoder(field));
    }
    out
}

const PRELUDE: &str = r#"struct Uniforms {
    view: mat4x4<f32>,
    bounds_min: vec2<f32>,
    bounds_span: vec2<f32>,
    viewport: vec2<f32>,
    point_size: f32,
    intensity: f32,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct PointInput {
    @location(0) id: u32,
    @location(1) word: u32,
    @location(2) position: vec3<f32>,
    @location(3) risk: f32,
    @location(4) shock: f32,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) corner: vec2<f32>,
};

fn is_finite(v: f32) -> bool {
    return v == v && abs(v) <= 3.4028235e38;
}

fn normalize_axis(v: f32, lo: f32, span: f32) -> f32 {
    if (!is_finite(v)) {
        return 0.5;
    }
    return clamp((v - lo) / span, 0.0, 1.0);
}
"#;

const BODY: &str = r#"
fn point_color(word: u32) -> vec4<f32> {
    let trend = semantic_trend_raw(word);
    var base = vec3<f32>(0.62, 0.66, 0.72);
    if (trend == 1u) {
        base = vec3<f32>(0.22, 0.78, 0.45);
    } else if (trend == 2u) {
        base = vec3<f32>(0.90, 0.30, 0.28);
    }
    let heat = mix(base, vec3<f32>(1.0, 0.85, 0.35), semantic_risk(word) * 0.5);
    let alpha = 0.35 + 0.65 * semantic_vital(word);
    return vec4<f32>(heat, alpha);
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, point: PointInput) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index % 6u];

    let normalized = vec2<f32>(
        normalize_axis(point.position.x, uniforms.bounds_min.x, uniforms.bounds_span.x),
        normalize_axis(point.position.y, uniforms.bounds_min.y, uniforms.bounds_span.y),
    );
    let center = uniforms.view * vec4<f32>(normalized, 0.0, 1.0);
    let radius = uniforms.point_size * (1.0 + semantic_shock(point.word) * uniforms.intensity);

    var out: VertexOutput;
    out.clip = vec4<f32>(center.xy + corner * radius / uniforms.viewport, 0.0, 1.0);
    out.color = point_color(point.word);
    out.corner = corner;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let d = dot(input.corner, input.corner);
    if (d > 1.0) {
        discard;
    }
    return vec4<f32>(input.color.rgb, input.color.a * (1.0 - d * d));
}
"#;

/// Complete WGSL source of the point shader
pub fn point_shader_source() -> String {
    let mut source = String::with_capacity(PRELUDE.len() + BODY.len() + 1024);
    source.push_str(PRELUDE);
    source.push('\n');
    source.push_str(&semantic_decoders());
    source.push_str(BODY);
    source
}

pub fn create_point_shader(device: &Device) -> ShaderModule {
    let source = point_shader_source();
    debug!("Compiling point shader ({} bytes)", source.len());
    device.create_shader_module(ShaderModuleDescriptor {
        label: Some("ORBIS Point Shader"),
        source: ShaderSource::Wgsl(Cow::Owned(source)),
    })
}
