use radio_proto::protocol::PlaybackState;

/// Why a play request was rejected.
///
/// Never crosses the playback engine boundary: the engine folds it into a
/// state transition and logs it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The platform refused to start audio (autoplay or permission policy).
    #[error("playback not allowed: {0}")]
    NotAllowed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl PlaybackError {
    /// State the engine falls back to after a rejected play request.
    pub fn fallback_state(&self) -> PlaybackState {
        match self {
            PlaybackError::NotAllowed(_) => PlaybackState::Idle,
            _ => PlaybackState::Errored,
        }
    }
}

impl From<anyhow::Error> for PlaybackError {
    fn from(e: anyhow::Error) -> Self {
        PlaybackError::Backend(e.to_string())
    }
}
