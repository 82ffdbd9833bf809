//! Renderer: wgpu surface + depth, the lit scan pipeline and the poster
//! fallback pipeline. wgpu = 26.x, winit = 0.30.x

use std::sync::Arc;

use anyhow::{Context, Result};
use asset::{GeometryLimit, NormalizedSceneObject, TextureData};
use corelib::camera::Camera;
use wgpu::{
    CommandEncoderDescriptor, Device, DeviceDescriptor, Extent3d, Features, Instance,
    InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Surface, SurfaceConfiguration,
    SurfaceError, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};
use winit::{dpi::PhysicalSize, window::Window};

pub mod model;
pub mod poster;

pub use model::{Lighting, Vertex, build_geometry, geometry_limit};
pub use poster::{PosterRect, fit_contain};

use model::{ModelGpu, ModelPipeline};
use poster::{PosterGpu, PosterPipeline};

pub(crate) const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// White, like the page the scan sits on.
const BACKGROUND: wgpu::Color = wgpu::Color::WHITE;

/// What the surface currently shows.
enum Content {
    /// Nothing resolved yet: background only.
    Empty,
    Model(ModelGpu),
    /// `None` when the poster image could not be loaded.
    Poster(Option<PosterGpu>),
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Pipelines
    model_pipeline: ModelPipeline,
    poster_pipeline: PosterPipeline,
    content: Content,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> Result<Self> {
        Self::with_adapter(window, backends, false).await
    }

    /// Software adapter on any backend; enough to show the poster when no
    /// hardware context could be built.
    pub async fn new_software(window: Arc<Window>) -> Result<Self> {
        Self::with_adapter(window, wgpu::Backends::all(), true).await
    }

    async fn with_adapter(
        window: Arc<Window>,
        backends: wgpu::Backends,
        force_fallback_adapter: bool,
    ) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Scanview Device"),
                required_features: Features::empty(),
                required_limits: Limits {
                    max_buffer_size: adapter.limits().max_buffer_size,
                    ..Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
                },
                ..Default::default()
            })
            .await
            .context("request_device failed")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);
        let model_pipeline = ModelPipeline::new(&device, surface_format);
        let poster_pipeline = PosterPipeline::new(&device, surface_format);

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            model_pipeline,
            poster_pipeline,
            content: Content::Empty,
            depth_view,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize: reconfigure surface & recreate depth view. Only absolute
    /// sizes are used, so repeated calls with the same size are harmless.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    /// Largest scan `set_model` accepts on this device.
    pub fn geometry_limit(&self) -> GeometryLimit {
        model::geometry_limit(self.device.limits().max_buffer_size)
    }

    /// Upload the scan; from now on every frame draws it.
    pub fn set_model(&mut self, object: &NormalizedSceneObject) -> Result<()> {
        self.geometry_limit().check(object.object())?;
        let gpu = self.model_pipeline.upload(&self.device, object);
        self.content = Content::Model(gpu);
        Ok(())
    }

    /// Switch to the poster. Images larger than the device allows are
    /// downscaled first.
    pub fn set_poster(&mut self, poster: Option<TextureData>) {
        let max_dim = self.device.limits().max_texture_dimension_2d;
        let gpu = poster.and_then(|image| match image.fit_within(max_dim) {
            Ok(image) => Some(self.poster_pipeline.upload(&self.device, &self.queue, &image)),
            Err(e) => {
                log::warn!("Poster unusable: {:#}", e);
                None
            }
        });
        self.content = Content::Poster(gpu);
    }

    /// Render one frame of whatever the current content is.
    pub fn render(&mut self, camera: &Camera) -> Result<(), SurfaceError> {
        match &self.content {
            Content::Model(model) => self.model_pipeline.prepare(&self.queue, camera, model),
            Content::Poster(Some(poster)) => poster.layout(&self.queue, self.width, self.height),
            Content::Poster(None) | Content::Empty => {}
        }

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            match &self.content {
                Content::Model(model) => self.model_pipeline.draw(&mut rpass, model),
                Content::Poster(Some(poster)) => self.poster_pipeline.draw(&mut rpass, poster),
                Content::Poster(None) | Content::Empty => {}
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
