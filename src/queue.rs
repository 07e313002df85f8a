use crate::lockfile::FileLock;
use crate::track;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// The file-backed playback queue. The orchestrator only ever appends; an
/// external streamer consumes from the head.
#[derive(Debug, Clone)]
pub struct PlayQueue {
    path: PathBuf,
}

impl PlayQueue {
    pub fn new(path: &Path) -> Self {
        PlayQueue {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single entry to the queue.
    pub fn append(&self, entry: &Path) -> Result<(), String> {
        self.append_lines(&[entry])
    }

    /// Append an announcement/track pair as one write. The announcement
    /// precedes the track so it plays first; when TTS failed the track is
    /// queued alone.
    pub fn append_pair(&self, announcement: Option<&Path>, track: &Path) -> Result<(), String> {
        match announcement {
            Some(a) => self.append_lines(&[a, track]),
            None => self.append_lines(&[track]),
        }
    }

    fn append_lines(&self, entries: &[&Path]) -> Result<(), String> {
        let _lock = FileLock::acquire(&self.path, LOCK_TIMEOUT)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("Failed to open queue file: {}", e))?;
        let mut block = String::new();
        for entry in entries {
            block.push_str(&entry.to_string_lossy());
            block.push('\n');
        }
        file.write_all(block.as_bytes())
            .map_err(|e| format!("Failed to append to queue file: {}", e))
    }

    /// The filename of the last queued entry, if it looks like an audio
    /// track. Announcement artifacts and junk lines return `None`.
    pub fn last_track_name(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let last = content.lines().rev().find(|l| !l.trim().is_empty())?;
        let path = Path::new(last.trim());
        let ext = path.extension()?.to_str()?.to_lowercase();
        if !track::AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            return None;
        }
        path.file_name().map(|n| n.to_string_lossy().to_string())
    }
}

/// The queue-low marker file. Its existence means "queue needs
/// replenishing"; content is ignored.
#[derive(Debug, Clone)]
pub struct SignalFile {
    path: PathBuf,
}

impl SignalFile {
    pub fn new(path: &Path) -> Self {
        SignalFile {
            path: path.to_path_buf(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the signal file. Used by external collaborators and tests.
    pub fn raise(&self) -> Result<(), String> {
        std::fs::write(&self.path, b"")
            .map_err(|e| format!("Failed to create signal file: {}", e))
    }

    /// Atomically claim the signal via rename-then-delete. Returns `false`
    /// when another instance claimed it first, which the caller treats as
    /// "no cycle to run".
    pub fn claim(&self) -> bool {
        let claimed = self.path.with_extension("claimed");
        if std::fs::rename(&self.path, &claimed).is_err() {
            return false;
        }
        let _ = std::fs::remove_file(&claimed);
        true
    }
}
