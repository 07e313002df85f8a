use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The orchestrator's append-only text log. Every entry is timestamped;
/// multi-line messages keep their embedded newlines, which is how offered
/// track listings end up as raw lines the report engine can scan.
///
/// Logging is best-effort: a failed write never disturbs a cycle.
#[derive(Debug, Clone)]
pub struct StationLog {
    path: PathBuf,
}

impl StationLog {
    pub fn new(path: &Path) -> Self {
        StationLog {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, msg: &str) {
        let line = format!("[{}] {}\n", Local::now().format(TIMESTAMP_FORMAT), msg);
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }

    /// Visual divider between process or cycle runs.
    pub fn divider(&self) {
        self.log(&"=".repeat(60));
    }

    // Structured events. These strings are the contract the report engine
    // parses, so they live here rather than scattered through the cycle.

    pub fn active_show(&self, name: &str) {
        self.log(&format!("Active show: {}", name));
    }

    pub fn show_transition(&self, old_name: &str, new_id: &str, new_name: &str) {
        self.log(&format!(
            "SHOW TRANSITION: '{}' -> '{}' ({})",
            old_name, new_id, new_name
        ));
    }

    pub fn attempt(&self, attempt: u32, max: u32) {
        self.log(&format!("--- DJ Attempt {}/{} ---", attempt, max));
    }

    pub fn suggestion(&self, text: &str) {
        self.log(&format!("DJ Suggestion: {}", text));
    }

    pub fn success(&self, track_name: &str) {
        self.log(&format!("SUCCESS: Found track: {}", track_name));
    }

    pub fn rejected_history(&self, text: &str) {
        self.log(&format!(
            "DJ Suggestion REJECTED: '{}' is in recent history",
            text
        ));
    }

    pub fn not_found(&self, text: &str) {
        self.log(&format!("Track NOT FOUND or REJECTED: {}", text));
    }

    pub fn removed_from_pool(&self, pool_name: &str, track_name: &str) {
        self.log(&format!("Removed from pool {}: {}", pool_name, track_name));
    }

    pub fn offering(&self, count: usize) {
        self.log(&format!("Offering {} tracks from suggestion pool", count));
    }
}
