//! Viewer bootstrap: lifecycle state, presenter seam and the ordered
//! load-or-poster sequence.

pub mod bootstrap;
pub mod presenter;
pub mod state;

pub use bootstrap::{BootOutcome, BootstrapConfig, LOADING_TEXT, ViewerBootstrap};
pub use presenter::{LogPresenter, Presenter};
pub use state::{InvalidTransition, ViewerState};
