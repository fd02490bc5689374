//! Playback and visualization engine.
//!
//! Platform independent: the audio output, analysis node, frame scheduler,
//! drawing surface and preference store are all supplied by the caller
//! through the traits in [`media`], [`frame`], [`render`] and
//! `radio_proto::state`.

pub mod analyzer;
pub mod error;
pub mod fft;
pub mod frame;
pub mod media;
pub mod playback;
pub mod render;
pub mod session;
pub mod station;

pub use error::PlaybackError;
pub use frame::{FrameHandle, FrameScheduler, TimerScheduler};
pub use media::{FrequencySource, GraphActivation, GraphContext, MediaEvent, MediaOutput, ReadyState};
pub use playback::{Effect, PlaybackEngine};
pub use render::{BarSurface, Renderer, Surface};
pub use session::{Session, SessionEvent, SessionSettings};
pub use station::StationController;
