use crate::matcher::AliasTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "autodj_config.json";

/// Station configuration. Relative paths resolve against `base_dir`, so a
/// whole station can live in one directory next to its queue, pools, and
/// log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub base_dir: PathBuf,
    pub library_listing: PathBuf,
    pub queue_file: PathBuf,
    pub signal_file: PathBuf,
    pub log_file: PathBuf,
    pub history_file: PathBuf,
    pub history_limit: usize,
    pub wishlist_file: PathBuf,
    pub state_file: PathBuf,
    pub schedule_file: PathBuf,
    pub pools_dir: PathBuf,
    /// Pool used when the active show doesn't bind one.
    pub default_pool: Option<String>,
    pub charts_file: PathBuf,
    pub listener_request_file: PathBuf,
    pub aliases: AliasTable,
    /// External brain command; the request and response file paths are
    /// appended as its last two arguments.
    pub brain_command: Vec<String>,
    pub brain_request_file: PathBuf,
    pub brain_response_file: PathBuf,
    pub brain_timeout_secs: u64,
    /// External TTS command; text and audio output paths are appended.
    pub tts_command: Vec<String>,
    pub tts_timeout_secs: u64,
    /// External weather scraper; the result file path is appended.
    pub weather_command: Option<Vec<String>>,
    pub weather_result_file: PathBuf,
    /// External news manager, driven via `headlines` / `next_story` / `mark`.
    pub news_command: Option<Vec<String>>,
    pub news_timeout_secs: u64,
    pub max_attempts: u32,
    pub offer_cap: usize,
    pub poll_interval_secs: u64,
    /// `{"listeners": n}`, maintained by the external streamer.
    pub listener_count_file: PathBuf,
    /// Below this many listeners the cycle runs in power-save mode
    /// (consumed pool entries rotate back instead of depleting). 0 disables.
    pub power_save_threshold: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        let base_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autodj");
        StationConfig {
            base_dir,
            library_listing: PathBuf::from("music.playlist"),
            queue_file: PathBuf::from("queue.txt"),
            signal_file: PathBuf::from("queue_low.signal"),
            log_file: PathBuf::from("orchestrator.log"),
            history_file: PathBuf::from("history.json"),
            history_limit: 10,
            wishlist_file: PathBuf::from("wishlist.txt"),
            state_file: PathBuf::from("state.json"),
            schedule_file: PathBuf::from("shows_schedule.json"),
            pools_dir: PathBuf::from("."),
            default_pool: Some("suggestion_pool.txt".to_string()),
            charts_file: PathBuf::from("charts_in_library.json"),
            listener_request_file: PathBuf::from("listener_request.txt"),
            aliases: AliasTable::default(),
            brain_command: Vec::new(),
            brain_request_file: PathBuf::from("dj_request.json"),
            brain_response_file: PathBuf::from("dj_response.json"),
            brain_timeout_secs: 120,
            tts_command: Vec::new(),
            tts_timeout_secs: 60,
            weather_command: None,
            weather_result_file: PathBuf::from("weather_result.json"),
            news_command: None,
            news_timeout_secs: 30,
            max_attempts: crate::cycle::DEFAULT_MAX_ATTEMPTS,
            offer_cap: crate::cycle::DEFAULT_OFFER_CAP,
            poll_interval_secs: 2,
            listener_count_file: PathBuf::from("listeners.json"),
            power_save_threshold: 0,
        }
    }
}

impl StationConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autodj")
            .join(CONFIG_FILE)
    }

    /// Load configuration from JSON, or fall back to defaults when the file
    /// is missing or corrupt.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("Warning: corrupt config file, using defaults: {}", e),
                },
                Err(e) => eprintln!("Warning: could not read config file: {}", e),
            }
        }
        StationConfig::default()
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Could not create config dir: {}", e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Serialize error: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Write error: {}", e))
    }

    /// Resolve a configured path against `base_dir` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
