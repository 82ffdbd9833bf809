//! One viewer run: window, GPU, camera, loader thread and render loop.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use asset::{AssetResolver, DefaultSource, FormatLoader};
use corelib::{camera::Camera, orbit::OrbitController};
use renderer::GpuState;
use viewer::{BootOutcome, BootstrapConfig, ViewerBootstrap, ViewerState};
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, MouseScrollDelta},
    event_loop::{ActiveEventLoop, EventLoopProxy},
    window::{Window, WindowAttributes},
};

use crate::{
    ViewerConfig,
    events::{ProxyPresenter, ViewerEvent},
    title::TitleState,
};

/// Pixels of trackpad scroll per wheel step.
const PIXELS_PER_ZOOM_STEP: f64 = 50.0;

/// Counts frames and logs the rate once per second.
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed >= Duration::from_secs(1) {
            log::info!("FPS: {:.1}", self.frames as f64 / elapsed.as_secs_f64());
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

#[derive(Default)]
struct Pointer {
    dragging: bool,
    last: Option<PhysicalPosition<f64>>,
}

pub struct ViewerSession {
    window: Arc<Window>,
    /// `None` when neither a hardware nor a software adapter was available.
    gpu: Option<GpuState>,
    camera: Camera,
    orbit: OrbitController,
    title: TitleState,
    pointer: Pointer,
    fps: Option<FpsCounter>,
    stop: Arc<AtomicBool>,
    loader: Option<JoinHandle<()>>,
}

/// Work handed to the loader thread.
enum LoaderJob {
    Resolve,
    /// The rendering context failed; go straight to the poster.
    Poster(anyhow::Error),
}

/// Only a ready scan is redrawn every frame, and only until the session is
/// stopped. The poster is drawn on demand (first show, resize, expose).
fn wants_next_frame(state: ViewerState, stopped: bool) -> bool {
    state == ViewerState::Ready && !stopped
}

impl ViewerSession {
    /// Create the window, enter `Loading`, build the rendering context and
    /// hand the blocking part of the bootstrap to a loader thread.
    pub fn start(
        event_loop: &ActiveEventLoop,
        config: &ViewerConfig,
        proxy: EventLoopProxy<ViewerEvent>,
    ) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.caption.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );

        let stop = Arc::new(AtomicBool::new(false));
        let resolver = AssetResolver::new(DefaultSource::new(config.http_timeout), FormatLoader);
        let mut bootstrap = ViewerBootstrap::new(
            resolver,
            BootstrapConfig::new(config.manifest.clone(), config.caption.clone()),
        )
        .with_stop_flag(stop.clone());
        let mut title = TitleState::new(config.caption.clone());
        bootstrap.begin(&mut title);
        window.set_title(&title.compose());

        let (gpu, job) = match pollster::block_on(GpuState::new(window.clone(), config.backends)) {
            Ok(gpu) => {
                bootstrap.limit_geometry(gpu.geometry_limit());
                (Some(gpu), LoaderJob::Resolve)
            }
            Err(err) => {
                let gpu = match pollster::block_on(GpuState::new_software(window.clone())) {
                    Ok(gpu) => Some(gpu),
                    Err(e) => {
                        log::error!("No adapter for the poster either: {:#}", e);
                        None
                    }
                };
                (gpu, LoaderJob::Poster(err))
            }
        };

        let PhysicalSize { width, height } = window.inner_size();
        let camera = Camera::scan_viewer(width.max(1) as f32 / height.max(1) as f32);
        let orbit = OrbitController::for_camera(&camera);
        log::info!("Window created: {}x{}", width, height);

        let loader = {
            let stop = stop.clone();
            std::thread::Builder::new()
                .name("scan-loader".into())
                .spawn(move || {
                    let mut presenter = ProxyPresenter::new(proxy);
                    let outcome = match job {
                        LoaderJob::Resolve => bootstrap.resolve(&mut presenter),
                        LoaderJob::Poster(err) => Some(bootstrap.fall_back(&mut presenter, err)),
                    };
                    match outcome {
                        Some(outcome) if !stop.load(Ordering::Acquire) => presenter.finish(outcome),
                        _ => log::debug!("Session stopped; load result discarded"),
                    }
                })
                .context("Failed to spawn loader thread")?
        };

        Ok(Self {
            window,
            gpu,
            camera,
            orbit,
            title,
            pointer: Pointer::default(),
            fps: config.show_fps.then(FpsCounter::new),
            stop,
            loader: Some(loader),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn state(&self) -> ViewerState {
        self.title.state()
    }

    fn animating(&self) -> bool {
        wants_next_frame(self.state(), self.stop.load(Ordering::Acquire))
    }

    pub fn handle_event(&mut self, event: ViewerEvent) {
        if let Some(outcome) = event.apply(&mut self.title) {
            self.finish(outcome);
        }
        self.window.set_title(&self.title.compose());
    }

    fn finish(&mut self, outcome: BootOutcome) {
        match outcome {
            BootOutcome::Ready(object) => {
                let o = object.object();
                log::info!(
                    "Scan ready: {} meshes, {} vertices, {} triangles",
                    o.meshes.len(),
                    o.vertex_count(),
                    o.triangle_count()
                );
                if let Some(gpu) = self.gpu.as_mut() {
                    if let Err(e) = gpu.set_model(&object) {
                        log::error!("Scan upload failed: {:#}", e);
                    }
                }
            }
            BootOutcome::PosterFallback { poster } => {
                log::info!("Showing poster fallback");
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.set_poster(poster);
                }
            }
        }
        self.window.request_redraw();
    }

    /// Re-read the window size; repeated calls converge to the same state.
    pub fn resize(&mut self) {
        let PhysicalSize { width, height } = self.window.inner_size();
        if width == 0 || height == 0 {
            return;
        }
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(width, height);
        }
        self.camera.set_viewport(width, height);
        self.window.request_redraw();
    }

    pub fn about_to_wait(&self) {
        if self.animating() {
            self.window.request_redraw();
        }
    }

    pub fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.animating() {
            self.orbit.update();
            self.orbit.apply(&mut self.camera);
        }

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        if let Err(err) = gpu.render(&self.camera) {
            if GpuState::is_surface_lost(&err) {
                gpu.recreate_surface();
            } else if matches!(err, wgpu::SurfaceError::OutOfMemory) {
                log::error!("Surface out of memory; exiting");
                event_loop.exit();
            } else {
                log::warn!("Render error: {:?}", err);
            }
            return;
        }

        if let Some(fps) = self.fps.as_mut() {
            fps.tick();
        }
    }

    pub fn mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.pointer.dragging = state == ElementState::Pressed;
        }
    }

    pub fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        if let (true, Some(last)) = (self.pointer.dragging, self.pointer.last) {
            if self.state() == ViewerState::Ready {
                let height = self.window.inner_size().height;
                self.orbit.rotate(
                    (position.x - last.x) as f32,
                    (position.y - last.y) as f32,
                    height,
                );
            }
        }
        self.pointer.last = Some(position);
    }

    pub fn cursor_left(&mut self) {
        self.pointer.dragging = false;
        self.pointer.last = None;
    }

    pub fn mouse_wheel(&mut self, delta: MouseScrollDelta) {
        if self.state() != ViewerState::Ready {
            return;
        }
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_ZOOM_STEP) as f32,
        };
        self.orbit.zoom(steps);
    }

    /// Stop the render loop and ask the loader to give up at its next
    /// checkpoint. The window stays until `dispose`.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop, then wait for the loader thread.
    pub fn dispose(mut self) {
        self.stop();
        if let Some(loader) = self.loader.take() {
            if loader.join().is_err() {
                log::error!("Loader thread panicked");
            }
        }
        log::info!("Viewer session disposed");
    }
}
