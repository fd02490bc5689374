//! Station list loading.
//!
//! The canonical format is a JSON array of `{ "name", "src" }` records.  TOML
//! `[[station]]` tables and extended m3u playlists are accepted too, picked by
//! file extension (or content sniffing for URLs without one).

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::protocol::Station;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Json,
    Toml,
    M3u,
}

impl ListFormat {
    /// Guess the format from a path or URL, falling back to the content.
    pub fn detect(source: &str, content: &str) -> Self {
        let lower = source.to_ascii_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or_default();
        if lower.ends_with(".json") {
            ListFormat::Json
        } else if lower.ends_with(".toml") {
            ListFormat::Toml
        } else if lower.ends_with(".m3u") || lower.ends_with(".m3u8") {
            ListFormat::M3u
        } else {
            let trimmed = content.trim_start();
            if trimmed.starts_with('[') && !trimmed.starts_with("[[") {
                ListFormat::Json
            } else if trimmed.starts_with("[[") {
                ListFormat::Toml
            } else {
                ListFormat::M3u
            }
        }
    }
}

pub fn parse_stations(format: ListFormat, content: &str) -> anyhow::Result<Vec<Station>> {
    match format {
        ListFormat::Json => parse_stations_from_json_str(content),
        ListFormat::Toml => parse_stations_from_toml_str(content),
        ListFormat::M3u => parse_m3u_from_str(content),
    }
}

pub fn parse_stations_from_json_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let stations: Vec<Station> = serde_json::from_str(content)?;
    Ok(stations)
}

pub fn parse_m3u_from_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let mut stations = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let src = line.to_string();
        let name = pending_name.take().unwrap_or_else(|| src.clone());
        stations.push(Station { name, src });
    }

    Ok(stations)
}

#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    station: Vec<Station>,
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let file: TomlStationFile = toml::from_str(content)?;
    Ok(file.station)
}

pub fn load_stations_from_file(path: &Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations(ListFormat::detect(&path.to_string_lossy(), &content), &content)
}

async fn fetch_stations_url(url: &str) -> anyhow::Result<Vec<Station>> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    let text = response.text().await?;
    parse_stations(ListFormat::detect(url, &text), &text)
}

/// Load a list from a path or `http(s)://` URL.
pub async fn load_stations_from(source: &str) -> anyhow::Result<Vec<Station>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_stations_url(source).await
    } else {
        load_stations_from_file(Path::new(source))
    }
}

/// Resolve the station list once at startup.
///
/// Tries each configured source in order, then the working-directory
/// fallbacks.  An empty list is a valid outcome; every station operation
/// becomes a no-op.
pub async fn load_stations(sources: &[String]) -> Vec<Station> {
    for source in sources {
        let is_url = source.starts_with("http://") || source.starts_with("https://");
        if !is_url && !Path::new(source).exists() {
            continue;
        }
        match load_stations_from(source).await {
            Ok(s) => {
                info!("Loaded {} stations from {}", s.len(), source);
                return s;
            }
            Err(e) => warn!("Failed to load stations from {}: {}", source, e),
        }
    }

    for filename in ["stations.json", "stations.toml", "radios.m3u"] {
        let path = PathBuf::from(filename);
        if !path.exists() {
            continue;
        }
        match load_stations_from_file(&path) {
            Ok(s) => {
                info!("Loaded {} stations from local fallback {}", s.len(), filename);
                return s;
            }
            Err(e) => warn!("Failed to read {}: {}", filename, e),
        }
    }

    info!("No station source available, starting with empty list");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_list_keeps_order() {
        let stations = parse_stations_from_json_str(
            r#"[{"name":"A","src":"http://a"},{"name":"B","src":"http://b"},{"name":"C","url":"http://c"}]"#,
        )
        .unwrap();
        let names: Vec<_> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(stations[2].src, "http://c");
    }

    #[test]
    fn test_parse_m3u_uses_extinf_names() {
        let m3u = "#EXTM3U\n#EXTINF:-1,Radio One\nhttp://one\n\nhttp://two\n";
        let stations = parse_m3u_from_str(m3u).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0], Station::new("Radio One", "http://one"));
        assert_eq!(stations[1].name, "http://two");
    }

    #[test]
    fn test_parse_toml_tables() {
        let toml = r#"
            [[station]]
            name = "A"
            src = "http://a"

            [[station]]
            name = "B"
            url = "http://b"
        "#;
        let stations = parse_stations_from_toml_str(toml).unwrap();
        assert_eq!(stations, vec![Station::new("A", "http://a"), Station::new("B", "http://b")]);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ListFormat::detect("js/tracks.json", ""), ListFormat::Json);
        assert_eq!(ListFormat::detect("x.TOML", ""), ListFormat::Toml);
        assert_eq!(ListFormat::detect("https://h/list.m3u?dl=1", ""), ListFormat::M3u);
        assert_eq!(ListFormat::detect("https://h/list", " [{\"name\":1}]"), ListFormat::Json);
        assert_eq!(ListFormat::detect("https://h/list", "[[station]]"), ListFormat::Toml);
        assert_eq!(ListFormat::detect("https://h/list", "#EXTM3U"), ListFormat::M3u);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(parse_stations_from_json_str("[{\"name\":\"A\"}]").is_err());
    }

    #[tokio::test]
    async fn test_load_stations_skips_missing_sources() {
        let dir = std::env::temp_dir().join(format!("radio-stations-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("list.json");
        std::fs::write(&good, r#"[{"name":"A","src":"http://a"}]"#).unwrap();

        let sources = vec![
            dir.join("missing.json").display().to_string(),
            good.display().to_string(),
        ];
        let stations = load_stations(&sources).await;
        assert_eq!(stations, vec![Station::new("A", "http://a")]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
