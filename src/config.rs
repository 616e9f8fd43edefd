use crate::dj::{DjScheduler, Persona, DEFAULT_EVENING_HOUR, DEFAULT_MORNING_HOUR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Explicit station configuration. Everything the core needs is supplied
/// here — no implicit global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Filesystem tree searched for pre-generated announcement audio.
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,
    /// Pre-built song catalog (JSON).
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    /// Hour the morning persona takes over.
    #[serde(default = "default_morning_hour")]
    pub morning_hour: u32,
    /// Hour the evening persona takes over.
    #[serde(default = "default_evening_hour")]
    pub evening_hour: u32,
    #[serde(default = "default_morning_persona")]
    pub morning_persona: String,
    #[serde(default = "default_evening_persona")]
    pub evening_persona: String,
    /// Weather cache time-to-live in seconds.
    #[serde(default = "default_weather_ttl")]
    pub weather_ttl_secs: u64,
    /// Keep at least this many items queued during steady-state operation.
    #[serde(default = "default_queue_low_water")]
    pub queue_low_water: usize,
}

fn default_content_root() -> PathBuf {
    PathBuf::from("content")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

fn default_morning_hour() -> u32 {
    DEFAULT_MORNING_HOUR
}

fn default_evening_hour() -> u32 {
    DEFAULT_EVENING_HOUR
}

fn default_morning_persona() -> String {
    "Persona A".to_string()
}

fn default_evening_persona() -> String {
    "Persona B".to_string()
}

fn default_weather_ttl() -> u64 {
    30 * 60
}

fn default_queue_low_water() -> usize {
    4
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            content_root: default_content_root(),
            catalog_path: default_catalog_path(),
            morning_hour: default_morning_hour(),
            evening_hour: default_evening_hour(),
            morning_persona: default_morning_persona(),
            evening_persona: default_evening_persona(),
            weather_ttl_secs: default_weather_ttl(),
            queue_low_water: default_queue_low_water(),
        }
    }
}

impl StationConfig {
    /// Load configuration from JSON, falling back to defaults if the file
    /// is missing or corrupt.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("Warning: corrupt config file, using defaults: {}", e),
                },
                Err(e) => eprintln!("Warning: could not read config file: {}", e),
            }
        }
        StationConfig::default()
    }

    /// Persist configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Create dir error: {}", e))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| format!("Serialize error: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Write error: {}", e))?;
        Ok(())
    }

    /// Default config location under the user's config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aircast")
            .join("config.json")
    }

    /// Build the DJ scheduler described by this configuration.
    pub fn scheduler(&self) -> DjScheduler {
        DjScheduler::new(
            self.morning_hour,
            self.evening_hour,
            Persona::new(&self.morning_persona),
            Persona::new(&self.evening_persona),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scheduler_boundaries() {
        let config = StationConfig::default();
        assert_eq!(config.morning_hour, 6);
        assert_eq!(config.evening_hour, 19);
        assert_eq!(config.queue_low_water, 4);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = StationConfig::load(Path::new("/nonexistent/config.json"));
        assert_eq!(config.morning_persona, "Persona A");
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: StationConfig =
            serde_json::from_str(r#"{"morning_hour": 5, "morning_persona": "Dawn"}"#).unwrap();
        assert_eq!(config.morning_hour, 5);
        assert_eq!(config.morning_persona, "Dawn");
        assert_eq!(config.evening_hour, 19);
        assert_eq!(config.weather_ttl_secs, 30 * 60);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = StationConfig::default();
        config.evening_persona = "Nightowl".to_string();
        config.save(&path).unwrap();

        let loaded = StationConfig::load(&path);
        assert_eq!(loaded.evening_persona, "Nightowl");
    }

    #[test]
    fn scheduler_uses_configured_personas() {
        let mut config = StationConfig::default();
        config.morning_persona = "Dawn".to_string();
        let scheduler = config.scheduler();
        assert_eq!(scheduler.morning_persona().name, "Dawn");
    }
}
