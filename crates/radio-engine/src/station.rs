//! Station controller: the ordered station list and the current index.

use radio_proto::protocol::Station;
use radio_proto::state::{save_station_index, PreferenceStore};
use tracing::{info, warn};

use crate::media::MediaOutput;
use crate::playback::{Effect, PlaybackEngine};

pub struct StationController {
    stations: Vec<Station>,
    current: Option<usize>,
}

impl StationController {
    pub fn new(stations: Vec<Station>) -> Self {
        let current = if stations.is_empty() { None } else { Some(0) };
        Self { stations, current }
    }

    /// Adopt a saved index; anything out of range keeps the default.
    pub fn restore(&mut self, saved: Option<usize>) {
        if let Some(idx) = saved.filter(|&i| i < self.stations.len()) {
            self.current = Some(idx);
        }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_station(&self) -> Option<&Station> {
        self.stations.get(self.current?)
    }

    pub fn next_index(&self) -> Option<usize> {
        let count = self.stations.len();
        if count == 0 {
            return None;
        }
        Some((self.current.unwrap_or(0) + 1) % count)
    }

    pub fn prev_index(&self) -> Option<usize> {
        let count = self.stations.len();
        if count == 0 {
            return None;
        }
        Some((self.current.unwrap_or(0) + count - 1) % count)
    }

    /// Make `index` current and load it, restarting playback only when it
    /// was wanted before the switch.  `None` when `index` names no station.
    pub async fn switch_station<O, P>(
        &mut self,
        index: usize,
        engine: &mut PlaybackEngine<O>,
        prefs: &mut P,
    ) -> Option<Vec<Effect>>
    where
        O: MediaOutput,
        P: PreferenceStore,
    {
        let station = self.stations.get(index)?.clone();
        let was_playing = engine.wants_playback();

        if self.current != Some(index) {
            self.current = Some(index);
            if let Err(e) = save_station_index(prefs, index) {
                warn!("Stations: failed to persist index {}: {}", index, e);
            }
        }
        info!("Stations: switching to {} '{}'", index, station.name);

        let mut effects = engine.load_station(&station).await;
        if was_playing {
            effects.extend(engine.play().await);
        }
        Some(effects)
    }

    pub async fn next_track<O, P>(
        &mut self,
        engine: &mut PlaybackEngine<O>,
        prefs: &mut P,
    ) -> Option<Vec<Effect>>
    where
        O: MediaOutput,
        P: PreferenceStore,
    {
        let index = self.next_index()?;
        self.switch_station(index, engine, prefs).await
    }

    pub async fn prev_track<O, P>(
        &mut self,
        engine: &mut PlaybackEngine<O>,
        prefs: &mut P,
    ) -> Option<Vec<Effect>>
    where
        O: MediaOutput,
        P: PreferenceStore,
    {
        let index = self.prev_index()?;
        self.switch_station(index, engine, prefs).await
    }
}
