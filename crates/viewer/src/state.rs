//! Viewer lifecycle state.

use std::fmt;

use thiserror::Error;

/// `Loading` is the only non-terminal state. There is no retry: once `Ready`
/// or `PosterFallback` is reached the viewer stays there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViewerState {
    #[default]
    Loading,
    Ready,
    PosterFallback,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid viewer transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ViewerState,
    pub to: ViewerState,
}

impl ViewerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Loading)
    }

    pub fn transition(self, to: ViewerState) -> Result<ViewerState, InvalidTransition> {
        match (self, to) {
            (Self::Loading, Self::Ready | Self::PosterFallback) => Ok(to),
            _ => Err(InvalidTransition { from: self, to }),
        }
    }
}

impl fmt::Display for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::PosterFallback => "poster-fallback",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_reaches_either_terminal() {
        assert_eq!(ViewerState::Loading.transition(ViewerState::Ready), Ok(ViewerState::Ready));
        assert_eq!(
            ViewerState::Loading.transition(ViewerState::PosterFallback),
            Ok(ViewerState::PosterFallback)
        );
    }

    #[test]
    fn terminal_states_never_leave() {
        for from in [ViewerState::Ready, ViewerState::PosterFallback] {
            assert!(from.is_terminal());
            for to in [ViewerState::Loading, ViewerState::Ready, ViewerState::PosterFallback] {
                assert!(from.transition(to).is_err());
            }
        }
        assert!(ViewerState::Loading.transition(ViewerState::Loading).is_err());
    }
}
