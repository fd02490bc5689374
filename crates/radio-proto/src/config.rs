use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where the station list comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    /// Local path or `http(s)://` URL of a JSON, TOML or m3u station list.
    #[serde(default = "default_stations_source")]
    pub source: String,
}

/// Playback and visualization tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Volume used when no preference has been saved yet.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Analysis window; the visualizer sees `fft_size / 2` bins.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// How long a stalled stream may buffer before it is declared failed.
    #[serde(default = "default_stall_grace_ms")]
    pub stall_grace_ms: u64,
    /// Delay between scheduled render frames.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Surface pixels per terminal cell edge.
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Key-value file holding the last station and volume.
    #[serde(default = "default_prefs_file")]
    pub prefs_file: PathBuf,
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            source: default_stations_source(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            fft_size: default_fft_size(),
            stall_grace_ms: default_stall_grace_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            pixel_ratio: default_pixel_ratio(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prefs_file: default_prefs_file(),
        }
    }
}

fn default_stations_source() -> String {
    platform::config_dir()
        .join("stations.json")
        .display()
        .to_string()
}

fn default_volume() -> f32 {
    1.0
}

fn default_fft_size() -> usize {
    256
}

fn default_stall_grace_ms() -> u64 {
    5000
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_pixel_ratio() -> f32 {
    2.0
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_prefs_file() -> PathBuf {
    platform::data_dir().join("prefs.json")
}

impl Config {
    /// Load the config at the default location, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config.sanitized())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Pull hand-edited values back into ranges the player can use.
    fn sanitized(mut self) -> Self {
        let p = &mut self.player;
        p.default_volume = p.default_volume.clamp(0.0, 1.0);
        // the analyser needs a power of two with at least two bars per side
        p.fft_size = p.fft_size.clamp(32, 32768).next_power_of_two();
        p.frame_interval_ms = p.frame_interval_ms.max(1);
        if !(p.pixel_ratio.is_finite() && p.pixel_ratio >= 1.0) {
            p.pixel_ratio = 1.0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.http.enabled);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert_eq!(config.player.fft_size, 256);
        assert_eq!(config.player.stall_grace_ms, 5000);
        assert_eq!(config.player.default_volume, 1.0);
        assert!(config.stations.source.ends_with("stations.json"));
        assert!(config.paths.prefs_file.ends_with("radio/prefs.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [player]
            fft_size = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.player.fft_size, 512);
        assert_eq!(config.player.stall_grace_ms, 5000);
        assert_eq!(config.http.port, 8990);
    }

    #[test]
    fn test_sanitized_clamps_player_values() {
        let mut config = Config::default();
        config.player.default_volume = 3.0;
        config.player.fft_size = 300;
        config.player.pixel_ratio = 0.0;
        let config = config.sanitized();
        assert_eq!(config.player.default_volume, 1.0);
        assert_eq!(config.player.fft_size, 512);
        assert_eq!(config.player.pixel_ratio, 1.0);
    }

    #[test]
    fn test_load_from_writes_defaults_on_first_run() {
        let dir = std::env::temp_dir().join(format!("radio-config-test-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_file(&path);
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.player.fft_size, 256);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
