//! UI-side effects of the bootstrap sequence.

use crate::state::ViewerState;

/// Receives indicator, caption and state updates. Implementations must treat
/// every call as a no-op when their UI surface is gone.
pub trait Presenter {
    fn show_loading(&mut self, text: &str);
    fn hide_loading(&mut self);
    fn set_caption(&mut self, text: &str);
    fn state_changed(&mut self, _state: ViewerState) {}
}

/// Presenter that only logs; for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn show_loading(&mut self, text: &str) {
        log::info!("{}", text);
    }

    fn hide_loading(&mut self) {}

    fn set_caption(&mut self, text: &str) {
        log::info!("Caption: {}", text);
    }

    fn state_changed(&mut self, state: ViewerState) {
        log::info!("Viewer state: {}", state);
    }
}
