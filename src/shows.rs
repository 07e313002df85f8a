use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-show configuration overrides. Unset fields fall back to the schedule
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShowOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dj_personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_pool: Option<String>,
    /// Fixed opening track, force-queued on show transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_enabled: Option<bool>,
}

/// Wall-clock window; `start > end` wraps across midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowWindow {
    pub start: String,
    pub end: String,
}

impl ShowWindow {
    /// Whether `time` falls inside this window, handling midnight wraparound.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let (start, end) = match (parse_time(&self.start), parse_time(&self.end)) {
            (Ok(s), Ok(e)) => (s, e),
            _ => return false,
        };
        if start <= end {
            time >= start && time < end
        } else {
            time >= start || time < end
        }
    }
}

/// A scheduled program segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub name: String,
    pub schedule: ShowWindow,
    #[serde(default)]
    pub overrides: ShowOverrides,
}

/// The full show schedule plus station-wide defaults. Read-only during a
/// cycle, looked up fresh each cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShowSchedule {
    #[serde(default)]
    pub shows: Vec<Show>,
    #[serde(default)]
    pub defaults: ShowOverrides,
}

/// Show settings with overrides resolved against defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveShow {
    pub id: String,
    pub name: String,
    pub music_style: Option<String>,
    pub dj_personality: Option<String>,
    pub suggestion_pool: Option<String>,
    pub signation: Option<String>,
    pub news_enabled: bool,
}

impl ShowSchedule {
    /// Load the schedule from JSON, falling back to an empty schedule on a
    /// missing or corrupt file.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(schedule) => schedule,
                Err(e) => {
                    eprintln!("Warning: corrupt schedule file, using empty schedule: {}", e);
                    ShowSchedule::default()
                }
            },
            Err(_) => ShowSchedule::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Serialize error: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Write error: {}", e))
    }

    /// The first show whose window contains `time`.
    pub fn active_at(&self, time: NaiveTime) -> Option<&Show> {
        self.shows.iter().find(|s| s.schedule.contains(time))
    }

    /// Resolve the effective settings for the active show (or the station
    /// defaults when no show is scheduled).
    pub fn effective_at(&self, time: NaiveTime) -> EffectiveShow {
        let show = self.active_at(time);
        let ov = show.map(|s| &s.overrides);
        let pick = |f: fn(&ShowOverrides) -> Option<String>| {
            ov.and_then(f).or_else(|| f(&self.defaults))
        };
        EffectiveShow {
            id: show.map(|s| s.id.clone()).unwrap_or_else(|| "default".to_string()),
            name: show
                .map(|s| s.name.clone())
                .unwrap_or_else(|| "Station default".to_string()),
            music_style: pick(|o| o.music_style.clone()),
            dj_personality: pick(|o| o.dj_personality.clone()),
            suggestion_pool: pick(|o| o.suggestion_pool.clone()),
            signation: ov.and_then(|o| o.signation.clone()),
            news_enabled: ov
                .and_then(|o| o.news_enabled)
                .or(self.defaults.news_enabled)
                .unwrap_or(true),
        }
    }
}

/// Parse a time string in HH:MM or HH:MM:SS format.
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("Invalid time '{}'. Expected HH:MM or HH:MM:SS", s))
}
