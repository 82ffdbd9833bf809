//! Platform layer: window, event loop and the viewer session (winit 0.30).

use std::time::Duration;

use anyhow::Result;
use asset::AssetManifest;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::WindowId,
};

mod events;
mod session;
mod title;

pub use events::{ProxyPresenter, ViewerEvent};
pub use session::ViewerSession;
pub use title::TitleState;

/// Everything fixed at launch.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub manifest: AssetManifest,
    pub caption: String,
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub show_fps: bool,
    /// Applies to HTTP probes and fetches.
    pub http_timeout: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            manifest: AssetManifest::default(),
            caption: "Rubble scan".to_owned(),
            backends: wgpu::Backends::all(),
            width: 1280,
            height: 720,
            show_fps: false,
            http_timeout: Duration::from_secs(5),
        }
    }
}

struct ViewerApp {
    config: ViewerConfig,
    proxy: EventLoopProxy<ViewerEvent>,
    session: Option<ViewerSession>,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    /// Stop rendering now; the session is disposed in `exiting`.
    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.as_ref() {
            session.stop();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() || self.error.is_some() {
            return;
        }
        match ViewerSession::start(event_loop, &self.config, self.proxy.clone()) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                log::error!("Viewer init failed: {:#}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        if let Some(session) = self.session.as_mut() {
            session.handle_event(event);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.window().id() != id {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.close(event_loop);
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => session.resize(),
            WindowEvent::RedrawRequested => session.redraw(event_loop),
            WindowEvent::MouseInput { state, button, .. } => session.mouse_button(button, state),
            WindowEvent::CursorMoved { position, .. } => session.cursor_moved(position),
            WindowEvent::CursorLeft { .. } => session.cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => session.mouse_wheel(delta),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.as_ref() {
            session.about_to_wait();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.take() {
            session.dispose();
        }
    }
}

/// Open the viewer window and run until it is closed.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create event loop: {e}"))?;
    let mut app = ViewerApp {
        proxy: event_loop.create_proxy(),
        config,
        session: None,
        error: None,
    };

    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    if let Some(session) = app.session.take() {
        session.dispose();
    }
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
