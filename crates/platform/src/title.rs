//! Window title as the caption region.

use viewer::{Presenter, ViewerState};

/// Caption plus optional loading indicator, rendered into one title string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TitleState {
    caption: String,
    loading: Option<String>,
    state: ViewerState,
}

impl TitleState {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn compose(&self) -> String {
        match &self.loading {
            Some(text) => format!("{} - {}", self.caption, text),
            None => self.caption.clone(),
        }
    }
}

impl Presenter for TitleState {
    fn show_loading(&mut self, text: &str) {
        self.loading = Some(text.to_owned());
    }

    fn hide_loading(&mut self) {
        self.loading = None;
    }

    fn set_caption(&mut self, text: &str) {
        self.caption = text.to_owned();
    }

    fn state_changed(&mut self, state: ViewerState) {
        if state == self.state {
            return;
        }
        match self.state.transition(state) {
            Ok(next) => self.state = next,
            Err(e) => log::warn!("Ignoring state update: {}", e),
        }
    }
}
