use serde::{Deserialize, Serialize};

/// One streamable audio source.  Immutable once the list is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Station {
    pub name: String,
    /// Stream URI.  Station files written for other players use `url`.
    #[serde(alias = "url")]
    pub src: String,
}

impl Station {
    pub fn new(name: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src: src.into(),
        }
    }
}

/// Playback state owned by the playback engine.
///
/// ```text
///   Idle ──play──▶ Loading ──started──▶ Playing ◀──▶ Paused
///                                         │  ▲
///                                 stalled ▼  │ recovered
///                                       Stalled ──grace expired──▶ Errored
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Stalled,
    Errored,
}

impl PlaybackState {
    /// True while the output is running, including a stall that has not yet
    /// been declared fatal.
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Stalled)
    }

    /// Short label for the status bar.
    pub fn label(self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stalled => "buffering",
            PlaybackState::Errored => "error",
        }
    }
}

/// Actions a presentation layer (keyboard, HTTP) can request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd")]
pub enum Command {
    TogglePlay,
    Next,
    Prev,
    SwitchStation { index: usize },
    Volume { value: f32 },
    VolumeUp,
    VolumeDown,
}

/// Read-only view of the session published after every processed event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Monotonic revision counter, bumped on every publish.
    pub rev: u64,
    pub state: PlaybackState,
    pub is_playing: bool,
    pub current_index: Option<usize>,
    pub current_station: Option<Station>,
    pub volume: f32,
}
