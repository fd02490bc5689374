//! Shared data model for the radio player: stations, playback state,
//! commands, configuration and persisted preferences.

pub mod config;
pub mod platform;
pub mod protocol;
pub mod state;
pub mod stations;
