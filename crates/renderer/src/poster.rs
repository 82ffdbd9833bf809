//! Poster fallback: aspect-preserving layout and the textured-quad pipeline.

use std::num::NonZeroU64;

use asset::TextureData;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::DEPTH_FORMAT;

/// Placement of the image inside the surface, in pixels from the top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PosterRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PosterRect {
    /// As `[x0, y_bottom, x1, y_top]` in normalized device coordinates.
    pub fn to_ndc(&self, surface_w: u32, surface_h: u32) -> [f32; 4] {
        let sw = surface_w.max(1) as f32;
        let sh = surface_h.max(1) as f32;
        [
            self.x / sw * 2.0 - 1.0,
            1.0 - (self.y + self.height) / sh * 2.0,
            (self.x + self.width) / sw * 2.0 - 1.0,
            1.0 - self.y / sh * 2.0,
        ]
    }
}

/// Largest rectangle with the image's aspect ratio that fits the surface,
/// centered on both axes.
pub fn fit_contain(image_w: u32, image_h: u32, surface_w: u32, surface_h: u32) -> PosterRect {
    let (iw, ih) = (image_w.max(1) as f32, image_h.max(1) as f32);
    let (sw, sh) = (surface_w as f32, surface_h as f32);
    let ratio = (sw / iw).min(sh / ih);
    let (width, height) = (iw * ratio, ih * ratio);
    PosterRect {
        x: (sw - width) / 2.0,
        y: (sh - height) / 2.0,
        width,
        height,
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadUniform {
    rect: [f32; 4],
}

pub(crate) struct PosterPipeline {
    pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

/// Uploaded poster image plus its quad placement buffer.
pub(crate) struct PosterGpu {
    width: u32,
    height: u32,
    quad_buf: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PosterPipeline {
    pub(crate) fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Poster WGSL"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/poster.wgsl").into()),
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Poster BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<QuadUniform>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Poster PipelineLayout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Poster Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            // Shares the main pass, which always carries a depth attachment.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Poster Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            bgl,
            sampler,
        }
    }

    pub(crate) fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &TextureData,
    ) -> PosterGpu {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Poster Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(TextureData::BYTES_PER_PIXEL * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let quad_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Poster Quad UBO"),
            contents: bytemuck::bytes_of(&QuadUniform {
                rect: [-1.0, -1.0, 1.0, 1.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Poster BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: quad_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        PosterGpu {
            width: image.width,
            height: image.height,
            quad_buf,
            bind_group,
        }
    }

    pub(crate) fn draw(&self, rpass: &mut wgpu::RenderPass<'_>, poster: &PosterGpu) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &poster.bind_group, &[]);
        rpass.draw(0..6, 0..1);
    }
}

impl PosterGpu {
    /// Re-derive the quad from the current surface size.
    pub(crate) fn layout(&self, queue: &wgpu::Queue, surface_w: u32, surface_h: u32) {
        let rect = fit_contain(self.width, self.height, surface_w, surface_h);
        let quad = QuadUniform {
            rect: rect.to_ndc(surface_w, surface_h),
        };
        queue.write_buffer(&self.quad_buf, 0, bytemuck::bytes_of(&quad));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wide_image_is_letterboxed() {
        let r = fit_contain(200, 100, 400, 400);
        assert_eq!(r, PosterRect { x: 0.0, y: 100.0, width: 400.0, height: 200.0 });
    }

    #[test]
    fn tall_image_is_pillarboxed() {
        let r = fit_contain(100, 300, 900, 600);
        assert_relative_eq!(r.width, 200.0);
        assert_relative_eq!(r.height, 600.0);
        assert_relative_eq!(r.x, 350.0);
        assert_relative_eq!(r.y, 0.0);
    }

    #[test]
    fn aspect_is_preserved_and_centered() {
        for (iw, ih, sw, sh) in [(640, 480, 1280, 720), (37, 91, 333, 777), (1, 1, 5, 3)] {
            let r = fit_contain(iw, ih, sw, sh);
            assert_relative_eq!(r.width / r.height, iw as f32 / ih as f32, epsilon = 1e-4);
            assert!(r.width <= sw as f32 + 1e-3 && r.height <= sh as f32 + 1e-3);
            assert_relative_eq!(r.x * 2.0 + r.width, sw as f32, epsilon = 1e-3);
            assert_relative_eq!(r.y * 2.0 + r.height, sh as f32, epsilon = 1e-3);
        }
    }

    #[test]
    fn ndc_covers_full_surface_when_aspects_match() {
        let r = fit_contain(160, 90, 1280, 720);
        assert_eq!(r.to_ndc(1280, 720), [-1.0, -1.0, 1.0, 1.0]);
    }
}
