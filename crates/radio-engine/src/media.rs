//! Seams between the engine and the platform's audio stack.
//!
//! A platform supplies one `MediaOutput` (the audio element), which on first
//! use wires a graph `source → analyser → destination` and hands back the
//! graph's execution context plus the analyser node.

use std::future::Future;

use crate::error::PlaybackError;

/// Lifecycle notifications from the audio output, delivered in the order the
/// output emits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Playback started (the output is no longer paused).
    Play,
    /// Data is flowing again after buffering.
    Playing,
    /// A pause request completed.
    Pause,
    /// The current source reached its end.
    Ended,
    /// Decode or network failure.
    Error(String),
    /// Buffering is stuck.
    Stalled,
    /// Loading was aborted.
    Abort,
}

/// How much media the output has buffered, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// When the platform lets the audio graph be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphActivation {
    /// Any time, including at startup.
    Immediate,
    /// Only from a user-initiated play.
    UserGesture,
}

/// A frequency-domain analysis node.
pub trait FrequencySource: Send {
    /// Number of frequency bins (half the analysis window).
    fn bin_count(&self) -> usize;

    /// Write current magnitudes, byte scaled (0–255), into `out`.
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

/// Execution context of the audio graph.
pub trait GraphContext: Send {
    fn is_suspended(&self) -> bool;

    fn resume(&mut self) -> impl Future<Output = Result<(), PlaybackError>> + Send;
}

/// The single audio output element.
pub trait MediaOutput: Send {
    type Context: GraphContext;
    type Analyser: FrequencySource;

    fn activation(&self) -> GraphActivation {
        GraphActivation::UserGesture
    }

    /// Wire `source → analyser → destination`.  Called at most once per
    /// successful construction.
    fn connect_graph(
        &mut self,
        fft_size: usize,
    ) -> Result<(Self::Context, Self::Analyser), PlaybackError>;

    /// Point the output at `src` and reset load state without playing.
    fn load(&mut self, src: &str) -> impl Future<Output = Result<(), PlaybackError>> + Send;

    /// Request playback.  Resolves once the output accepted or refused.
    fn play(&mut self) -> impl Future<Output = Result<(), PlaybackError>> + Send;

    /// Request a pause.  The outcome arrives as a `MediaEvent::Pause`.
    fn pause(&mut self) -> impl Future<Output = ()> + Send;

    fn set_volume(&mut self, volume: f32) -> impl Future<Output = ()> + Send;

    fn ready_state(&self) -> ReadyState;

    /// Release the output for good.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
