use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateEntry {
    value: Value,
    stored_at: String,
}

impl StateEntry {
    fn age(&self, now: DateTime<Local>) -> Option<Duration> {
        let parsed = NaiveDateTime::parse_from_str(&self.stored_at, TIMESTAMP_FORMAT).ok()?;
        let stored = Local.from_local_datetime(&parsed).single()?;
        (now - stored).to_std().ok()
    }
}

/// Shared scratchpad for cross-cycle state (cached weather, news timing,
/// pending deep-dive ids, the last active show). Loaded on every access and
/// saved after every mutation so concurrent tools see each other's writes.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: &Path) -> Self {
        StateStore {
            path: path.to_path_buf(),
        }
    }

    fn load(&self) -> BTreeMap<String, StateEntry> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }

    fn save(&self, entries: &BTreeMap<String, StateEntry>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Serialize error: {}", e))?;
        std::fs::write(&self.path, json).map_err(|e| format!("Write error: {}", e))
    }

    /// Get a value regardless of age.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.load().get(key).map(|e| e.value.clone())
    }

    /// Get a value only if it was stored less than `ttl` ago.
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<Value> {
        self.get_fresh_at(key, ttl, Local::now())
    }

    pub fn get_fresh_at(&self, key: &str, ttl: Duration, now: DateTime<Local>) -> Option<Value> {
        let entries = self.load();
        let entry = entries.get(key)?;
        if entry.age(now)? < ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), String> {
        self.set_at(key, value, Local::now())
    }

    pub fn set_at(&self, key: &str, value: Value, now: DateTime<Local>) -> Result<(), String> {
        let mut entries = self.load();
        entries.insert(
            key.to_string(),
            StateEntry {
                value,
                stored_at: now.format(TIMESTAMP_FORMAT).to_string(),
            },
        );
        self.save(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), String> {
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)?.as_str().map(|s| s.to_string())
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), String> {
        self.set(key, Value::String(value.to_string()))
    }
}
