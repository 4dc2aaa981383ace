//! Listening sessions: the per-block capture loop and the controller that
//! starts and stops it.

pub mod capture;
pub mod listener;

pub use capture::{CaptureLoop, ListenState, SessionContext, SessionSettings, run_session};
pub use listener::{Listener, SourceFactory};
