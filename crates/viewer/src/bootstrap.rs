//! Startup sequence: resolve and load the scan, or fall back to the poster.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use asset::{
    AssetError, AssetManifest, AssetResolver, AssetSource, GeometryLimit, ModelLoader,
    NormalizedSceneObject, TextureData, normalize,
};

use crate::{presenter::Presenter, state::ViewerState};

pub const LOADING_TEXT: &str = "Loading scan…";

/// Fixed inputs for one bootstrap run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub manifest: AssetManifest,
    pub caption: String,
    pub loading_text: String,
    pub fallback_caption: String,
    /// Scans above this go to the poster instead of the renderer.
    pub geometry_limit: Option<GeometryLimit>,
}

impl BootstrapConfig {
    pub fn new(manifest: AssetManifest, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        Self {
            manifest,
            fallback_caption: format!("{caption} (image fallback)"),
            loading_text: LOADING_TEXT.to_owned(),
            caption,
            geometry_limit: None,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::new(AssetManifest::default(), "Rubble scan")
    }
}

/// Where the sequence ended up.
#[derive(Debug)]
pub enum BootOutcome {
    Ready(NormalizedSceneObject),
    /// `poster` is `None` when the image itself could not be loaded; the
    /// surface then shows only the background.
    PosterFallback { poster: Option<TextureData> },
}

impl BootOutcome {
    pub fn state(&self) -> ViewerState {
        match self {
            Self::Ready(_) => ViewerState::Ready,
            Self::PosterFallback { .. } => ViewerState::PosterFallback,
        }
    }
}

/// Drives `Loading` to exactly one terminal state.
///
/// Split in two so the caller can show the indicator before building its
/// rendering context, then run the blocking part elsewhere:
/// [`begin`](Self::begin) enters `Loading`, [`resolve`](Self::resolve)
/// probes, loads, normalizes and consumes the bootstrap.
pub struct ViewerBootstrap<S, L> {
    resolver: AssetResolver<S, L>,
    config: BootstrapConfig,
    state: ViewerState,
    stop: Option<Arc<AtomicBool>>,
}

/// Why the 3D path did not produce a scan.
enum Interrupted {
    Stopped,
    Failed(AssetError),
}

impl From<AssetError> for Interrupted {
    fn from(err: AssetError) -> Self {
        Self::Failed(err)
    }
}

impl<S: AssetSource, L: ModelLoader> ViewerBootstrap<S, L> {
    pub fn new(resolver: AssetResolver<S, L>, config: BootstrapConfig) -> Self {
        Self {
            resolver,
            config,
            state: ViewerState::Loading,
            stop: None,
        }
    }

    /// `resolve` checks `stop` between phases and gives up once it is set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn limit_geometry(&mut self, limit: GeometryLimit) {
        self.config.geometry_limit = Some(limit);
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn begin(&mut self, presenter: &mut dyn Presenter) {
        presenter.set_caption(&self.config.caption);
        presenter.show_loading(&self.config.loading_text);
        presenter.state_changed(self.state);
    }

    /// Any failure on the 3D path goes straight to the poster; nothing is
    /// retried and no lower-priority format is tried after a failed load.
    /// Returns `None`, without further presenter calls, once the stop flag
    /// is seen.
    pub fn resolve(mut self, presenter: &mut dyn Presenter) -> Option<BootOutcome> {
        match self.load_model() {
            Ok(object) => {
                presenter.hide_loading();
                self.enter(ViewerState::Ready, presenter);
                Some(BootOutcome::Ready(object))
            }
            Err(Interrupted::Stopped) => {
                log::debug!("Bootstrap stopped before completion");
                None
            }
            Err(Interrupted::Failed(err)) => {
                log::warn!("3D load failed: {:#}", anyhow::Error::from(err));
                Some(self.show_poster(presenter))
            }
        }
    }

    /// Skip the 3D path, e.g. when no rendering context could be built.
    pub fn fall_back(mut self, presenter: &mut dyn Presenter, reason: anyhow::Error) -> BootOutcome {
        log::warn!("3D view unavailable: {:#}", reason);
        self.show_poster(presenter)
    }

    /// `begin` then `resolve` on the calling thread.
    pub fn run(mut self, presenter: &mut dyn Presenter) -> Option<BootOutcome> {
        self.begin(presenter);
        self.resolve(presenter)
    }

    fn show_poster(&mut self, presenter: &mut dyn Presenter) -> BootOutcome {
        presenter.hide_loading();
        self.enter(ViewerState::PosterFallback, presenter);

        let poster = match self.resolver.load_poster(&self.config.manifest.poster) {
            Ok(poster) => Some(poster),
            Err(err) => {
                log::warn!("{:#}", anyhow::Error::from(err));
                None
            }
        };
        presenter.set_caption(&self.config.fallback_caption);
        BootOutcome::PosterFallback { poster }
    }

    fn checkpoint(&self) -> Result<(), Interrupted> {
        match &self.stop {
            Some(stop) if stop.load(Ordering::Acquire) => Err(Interrupted::Stopped),
            _ => Ok(()),
        }
    }

    fn load_model(&self) -> Result<NormalizedSceneObject, Interrupted> {
        self.checkpoint()?;
        let (format, location) = self
            .resolver
            .resolve_first_available(&self.config.manifest)?;
        self.checkpoint()?;
        let object = self.resolver.load(&location, format)?;
        self.checkpoint()?;
        if let Some(limit) = &self.config.geometry_limit {
            limit.check(&object).map_err(|source| AssetError::Load {
                location: location.clone(),
                format,
                source,
            })?;
        }
        let object = normalize(object);
        self.checkpoint()?;
        Ok(object)
    }

    fn enter(&mut self, to: ViewerState, presenter: &mut dyn Presenter) {
        match self.state.transition(to) {
            Ok(next) => {
                self.state = next;
                presenter.state_changed(next);
            }
            Err(e) => log::error!("{}", e),
        }
    }
}
