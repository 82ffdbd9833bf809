//! Loader thread -> event loop messages.

use viewer::{BootOutcome, Presenter, ViewerState};
use winit::event_loop::EventLoopProxy;

/// User events delivered to the winit loop.
#[derive(Debug)]
pub enum ViewerEvent {
    ShowLoading(String),
    HideLoading,
    Caption(String),
    State(ViewerState),
    /// Sent once, after every presenter update of the run.
    Finished(BootOutcome),
}

impl ViewerEvent {
    /// Replay a presenter update. Returns the outcome for `Finished`.
    pub fn apply(self, presenter: &mut dyn Presenter) -> Option<BootOutcome> {
        match self {
            Self::ShowLoading(text) => presenter.show_loading(&text),
            Self::HideLoading => presenter.hide_loading(),
            Self::Caption(text) => presenter.set_caption(&text),
            Self::State(state) => presenter.state_changed(state),
            Self::Finished(outcome) => return Some(outcome),
        }
        None
    }
}

/// Presenter for the loader thread: forwards every call to the event loop.
/// Once the loop is gone the calls are dropped.
pub struct ProxyPresenter {
    proxy: EventLoopProxy<ViewerEvent>,
}

impl ProxyPresenter {
    pub fn new(proxy: EventLoopProxy<ViewerEvent>) -> Self {
        Self { proxy }
    }

    pub fn finish(&self, outcome: BootOutcome) {
        self.send(ViewerEvent::Finished(outcome));
    }

    fn send(&self, event: ViewerEvent) {
        if self.proxy.send_event(event).is_err() {
            log::debug!("Event loop closed; viewer event dropped");
        }
    }
}

impl Presenter for ProxyPresenter {
    fn show_loading(&mut self, text: &str) {
        self.send(ViewerEvent::ShowLoading(text.to_owned()));
    }

    fn hide_loading(&mut self) {
        self.send(ViewerEvent::HideLoading);
    }

    fn set_caption(&mut self, text: &str) {
        self.send(ViewerEvent::Caption(text.to_owned()));
    }

    fn state_changed(&mut self, state: ViewerState) {
        self.send(ViewerEvent::State(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::TitleState;

    #[test]
    fn replayed_events_drive_the_title() {
        let mut title = TitleState::new("Rubble scan");
        let events = vec![
            ViewerEvent::ShowLoading("Loading scan…".into()),
            ViewerEvent::HideLoading,
            ViewerEvent::State(ViewerState::PosterFallback),
            ViewerEvent::Caption("Rubble scan (image fallback)".into()),
        ];
        for event in events {
            assert!(event.apply(&mut title).is_none());
        }
        assert_eq!(title.compose(), "Rubble scan (image fallback)");
        assert_eq!(title.state(), ViewerState::PosterFallback);
    }

    #[test]
    fn finished_yields_outcome() {
        let mut title = TitleState::new("x");
        let outcome = ViewerEvent::Finished(BootOutcome::PosterFallback { poster: None })
            .apply(&mut title)
            .map(|o| o.state());
        assert_eq!(outcome, Some(ViewerState::PosterFallback));
    }
}
