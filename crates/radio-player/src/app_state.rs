//! AppState: shared read-only data passed to all components during render/event.
//!
//! The App event-loop is the only thing that writes to AppState.

use chrono::{DateTime, Local};

use radio_proto::protocol::{SessionSnapshot, Station};

use crate::widgets::status_bar::InputMode;

pub struct AppState {
    pub stations: Vec<Station>,
    /// Latest snapshot published by the session.
    pub snapshot: SessionSnapshot,
    pub input_mode: InputMode,
    /// Wall clock for the header, refreshed by a periodic tick.
    pub now: DateTime<Local>,
}

impl AppState {
    pub fn new(stations: Vec<Station>, snapshot: SessionSnapshot) -> Self {
        Self {
            stations,
            snapshot,
            input_mode: InputMode::Normal,
            now: Local::now(),
        }
    }

    pub fn is_current(&self, idx: usize) -> bool {
        self.snapshot.current_index == Some(idx)
    }
}
