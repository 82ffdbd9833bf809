//! Lit model pipeline for the normalized scan.

use std::num::NonZeroU64;

use asset::{GeometryLimit, NormalizedSceneObject, material::{Material, srgb_hex}};
use bytemuck::{Pod, Zeroable};
use corelib::camera::Camera;
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::DEPTH_FORMAT;

/// Vertex: position + normal + material color.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4],
    };
}

/// Scene lighting. Colors are linear and pre-multiplied by intensity.
#[derive(Clone, Copy, Debug)]
pub struct Lighting {
    pub sky: [f32; 3],
    pub ground: [f32; 3],
    pub hemi_intensity: f32,
    /// Position the directional light shines from, towards the origin.
    pub sun_position: Vec3,
    pub sun_color: [f32; 3],
    pub sun_intensity: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        let rgb = |hex| {
            let c = srgb_hex(hex);
            [c[0], c[1], c[2]]
        };
        Self {
            sky: rgb(0xffffff),
            ground: rgb(0xdcdcdc),
            hemi_intensity: 0.9,
            sun_position: Vec3::new(2.0, 3.0, 2.0),
            sun_color: rgb(0xffffff),
            sun_intensity: 0.8,
        }
    }
}

/// Uniform block; matches `Globals` in model.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalsUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    sky_color: [f32; 4],
    ground_color: [f32; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
}

impl GlobalsUniform {
    fn new(camera: &Camera, model: Mat4, lighting: &Lighting) -> Self {
        let scaled = |c: [f32; 3], k: f32| [c[0] * k, c[1] * k, c[2] * k, 1.0];
        let dir = lighting.sun_position.normalize_or_zero();
        Self {
            view_proj: camera.proj_view().to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            sky_color: scaled(lighting.sky, lighting.hemi_intensity),
            ground_color: scaled(lighting.ground, lighting.hemi_intensity),
            light_dir: [dir.x, dir.y, dir.z, 0.0],
            light_color: scaled(lighting.sun_color, lighting.sun_intensity),
        }
    }
}

/// Flatten every mesh into one vertex/index stream, baking material color
/// into the vertices.
pub fn build_geometry(object: &NormalizedSceneObject) -> (Vec<Vertex>, Vec<u32>) {
    let object = object.object();
    let fallback = Material::default_matte();
    let mut vertices = Vec::with_capacity(object.vertex_count());
    let mut indices = Vec::with_capacity(object.triangle_count() * 3);

    for mesh in &object.meshes {
        let color = mesh.material.single().unwrap_or(&fallback).base_color;
        let base = vertices.len() as u32;
        vertices.extend(mesh.data.vertices.iter().map(|v| Vertex {
            pos: v.position,
            normal: v.normal,
            color,
        }));
        indices.extend(mesh.data.indices.iter().map(|&i| base + i));
    }
    (vertices, indices)
}

/// How much merged geometry fits in buffers of at most `max_buffer_size`
/// bytes, with indices kept addressable as `u32`.
pub fn geometry_limit(max_buffer_size: u64) -> GeometryLimit {
    let fit = |elem: usize| (max_buffer_size / elem as u64).min(u32::MAX as u64) as usize;
    GeometryLimit {
        max_vertices: fit(std::mem::size_of::<Vertex>()),
        max_indices: fit(std::mem::size_of::<u32>()),
    }
}

pub(crate) struct ModelPipeline {
    pipeline: wgpu::RenderPipeline,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    pub(crate) lighting: Lighting,
}

pub(crate) struct ModelGpu {
    vertex_buf: wgpu::Buffer,
    index_buf: wgpu::Buffer,
    index_count: u32,
    model: Mat4,
}

impl ModelPipeline {
    pub(crate) fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Model WGSL"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<GlobalsUniform>() as u64),
                },
                count: None,
            }],
        });

        let globals_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals UBO"),
            contents: bytemuck::bytes_of(&GlobalsUniform::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals BG"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Model PipelineLayout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Model Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // Scan winding is unreliable; draw both sides.
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            globals_buf,
            globals_bg,
            lighting: Lighting::default(),
        }
    }

    pub(crate) fn upload(&self, device: &wgpu::Device, object: &NormalizedSceneObject) -> ModelGpu {
        let (vertices, indices) = build_geometry(object);
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scan VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scan IB"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        log::info!(
            "Uploaded scan: {} vertices, {} triangles",
            vertices.len(),
            indices.len() / 3
        );
        ModelGpu {
            vertex_buf,
            index_buf,
            index_count: indices.len() as u32,
            model: object.object().transform.matrix(),
        }
    }

    pub(crate) fn prepare(&self, queue: &wgpu::Queue, camera: &Camera, model: &ModelGpu) {
        let globals = GlobalsUniform::new(camera, model.model, &self.lighting);
        queue.write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&globals));
    }

    pub(crate) fn draw(&self, rpass: &mut wgpu::RenderPass<'_>, model: &ModelGpu) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.globals_bg, &[]);
        rpass.set_vertex_buffer(0, model.vertex_buf.slice(..));
        rpass.set_index_buffer(model.index_buf.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..model.index_count, 0, 0..1);
    }
}
