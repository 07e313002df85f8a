use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One accepted track, as the brain named it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track: String,
    /// Timestamp in "YYYY-MM-DD HH:MM:SS" format.
    pub at: String,
}

/// Rolling recently-played list used to forbid immediate repeats.
///
/// Backed by a JSON array; loads on each operation and saves after
/// mutations. Pruned to `limit` entries on write.
pub struct History {
    path: PathBuf,
    limit: usize,
}

impl History {
    pub fn new(path: &Path, limit: usize) -> Self {
        History {
            path: path.to_path_buf(),
            limit,
        }
    }

    pub fn load(&self) -> Vec<HistoryEntry> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// The recency ban: true when `text` equals (case-insensitive, trimmed)
    /// any of the last `limit` entries. Checked before the matcher runs, so
    /// a banned suggestion never reaches it.
    pub fn contains(&self, text: &str) -> bool {
        let wanted = text.trim().to_lowercase();
        let entries = self.load();
        let start = entries.len().saturating_sub(self.limit);
        entries[start..]
            .iter()
            .any(|e| e.track.trim().to_lowercase() == wanted)
    }

    /// Append one entry and prune to the size limit.
    pub fn push(&self, track: &str) {
        let mut entries = self.load();
        entries.push(HistoryEntry {
            track: track.to_string(),
            at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }
        self.save(&entries);
    }

    /// The last `n` track names, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let entries = self.load();
        let start = entries.len().saturating_sub(n);
        entries[start..].iter().map(|e| e.track.clone()).collect()
    }

    fn save(&self, entries: &[HistoryEntry]) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string(entries) {
            let _ = std::fs::write(&self.path, json);
        }
    }
}
