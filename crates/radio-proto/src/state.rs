//! Persisted preferences: the last station index and the volume.
//!
//! Both live in a small synchronous key-value store as text, the same two
//! entries the player has always written: `lastStation` and `radioVolume`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

pub const STATION_KEY: &str = "lastStation";
pub const VOLUME_KEY: &str = "radioVolume";

/// Synchronous string key-value storage.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// JSON map on disk, rewritten on every `set`.
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store; a missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("prefs: ignoring unreadable {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-memory store for tests and for running without a writable data dir.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub entries: BTreeMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Saved station index, if it names one of `station_count` stations.
pub fn load_station_index(store: &impl PreferenceStore, station_count: usize) -> Option<usize> {
    store
        .get(STATION_KEY)?
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&idx| idx < station_count)
}

/// Saved volume clamped to `[0, 1]`; `None` when absent or not a number.
pub fn load_volume(store: &impl PreferenceStore) -> Option<f32> {
    store
        .get(VOLUME_KEY)?
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| !v.is_nan())
        .map(|v| v.clamp(0.0, 1.0))
}

pub fn save_station_index(store: &mut impl PreferenceStore, idx: usize) -> anyhow::Result<()> {
    store.set(STATION_KEY, &idx.to_string())
}

pub fn save_volume(store: &mut impl PreferenceStore, volume: f32) -> anyhow::Result<()> {
    store.set(VOLUME_KEY, &volume.to_string())
}
