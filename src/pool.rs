use crate::lockfile::FileLock;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Annotation prefix marking a pool entry as relevant to a current news story.
pub const NEWS_ANNOTATION_PREFIX: &str = "matches news quote:";

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Text encoding of a pool file, detected once and reused for every rewrite
/// so non-ASCII artist names survive a consume/rotate round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEncoding {
    Utf8,
    /// UTF-8 with a byte order mark, preserved on rewrite.
    Utf8Bom,
    Latin1,
}

impl PoolEncoding {
    /// Detect the encoding of a file's bytes. Pure-ASCII content is tagged
    /// Latin-1 (either tag would re-encode identically, and legacy pool files
    /// default to Latin-1).
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return PoolEncoding::Utf8Bom;
        }
        match std::str::from_utf8(bytes) {
            Ok(_) if bytes.iter().any(|&b| b > 127) => PoolEncoding::Utf8,
            Ok(_) => PoolEncoding::Latin1,
            Err(_) => PoolEncoding::Latin1,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            PoolEncoding::Utf8 => String::from_utf8_lossy(bytes).to_string(),
            PoolEncoding::Utf8Bom => {
                String::from_utf8_lossy(bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes))
                    .to_string()
            }
            PoolEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            PoolEncoding::Utf8 => text.as_bytes().to_vec(),
            PoolEncoding::Utf8Bom => {
                let mut out = vec![0xEF, 0xBB, 0xBF];
                out.extend_from_slice(text.as_bytes());
                out
            }
            PoolEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

/// One pool line: a track name plus an optional annotation after `" | "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub track: String,
    pub annotation: Option<String>,
}

impl PoolEntry {
    pub fn parse(line: &str) -> Self {
        match line.split_once(" | ") {
            Some((track, annotation)) => PoolEntry {
                track: track.trim().to_string(),
                annotation: Some(annotation.trim().to_string()),
            },
            None => PoolEntry {
                track: line.trim().to_string(),
                annotation: None,
            },
        }
    }

    /// The raw file line this entry serializes to.
    pub fn line(&self) -> String {
        match &self.annotation {
            Some(a) => format!("{} | {}", self.track, a),
            None => self.track.clone(),
        }
    }

    /// How the entry appears in an offered-tracks listing.
    pub fn offer_line(&self) -> String {
        match &self.annotation {
            Some(a) => format!("{} ({})", self.track, a),
            None => self.track.clone(),
        }
    }

    pub fn is_news_relevant(&self) -> bool {
        self.annotation
            .as_deref()
            .is_some_and(|a| a.starts_with(NEWS_ANNOTATION_PREFIX))
    }
}

/// Ordered fallback list of curated tracks for one show, backed by a text
/// file (top = highest priority). Consumed entries are removed from the
/// file; under power-save they are rotated back to the end instead of
/// depleting the pool.
pub struct SuggestionPool {
    path: PathBuf,
    encoding: PoolEncoding,
}

impl SuggestionPool {
    /// Open a pool file, detecting its encoding once. A missing file is an
    /// empty UTF-8 pool.
    pub fn open(path: &Path) -> Self {
        let encoding = match std::fs::read(path) {
            Ok(bytes) => PoolEncoding::detect(&bytes),
            Err(_) => PoolEncoding::Utf8,
        };
        SuggestionPool {
            path: path.to_path_buf(),
            encoding,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pool file stem, used in "Removed from pool" log lines.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "pool".to_string())
    }

    pub fn encoding(&self) -> PoolEncoding {
        self.encoding
    }

    /// All entries in file order, blank lines skipped.
    pub fn entries(&self) -> Vec<PoolEntry> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(_) => return Vec::new(),
        };
        self.encoding
            .decode(&bytes)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PoolEntry::parse)
            .collect()
    }

    /// Up to `n` entries from the top, without mutation.
    pub fn peek(&self, n: usize) -> Vec<PoolEntry> {
        self.entries().into_iter().take(n).collect()
    }

    /// Entries annotated as news-relevant.
    pub fn news_entries(&self) -> Vec<PoolEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.is_news_relevant())
            .collect()
    }

    /// Remove exactly the first line equal to `entry`'s serialized form.
    /// An exact-line comparison, not a fuzzy re-match, so a similar
    /// neighboring entry is never deleted by mistake. Returns whether a
    /// line was removed.
    pub fn consume(&self, entry: &PoolEntry) -> Result<bool, String> {
        let _lock = FileLock::acquire(&self.path, LOCK_TIMEOUT)?;
        let bytes = std::fs::read(&self.path)
            .map_err(|e| format!("Cannot read pool '{}': {}", self.path.display(), e))?;
        let content = self.encoding.decode(&bytes);
        let wanted = entry.line();

        let mut removed = false;
        let mut kept = Vec::new();
        for line in content.lines() {
            if !removed && line.trim() == wanted {
                removed = true;
                continue;
            }
            kept.push(line);
        }
        if removed {
            self.write_lines(&kept)?;
        }
        Ok(removed)
    }

    /// Re-append a consumed entry to the end of the file (power-save
    /// rotation, so low-listener hours don't run the station out of
    /// offerable tracks).
    pub fn rotate(&self, entry: &PoolEntry) -> Result<(), String> {
        let _lock = FileLock::acquire(&self.path, LOCK_TIMEOUT)?;
        let existing = match std::fs::read(&self.path) {
            Ok(bytes) => self.encoding.decode(&bytes),
            Err(_) => String::new(),
        };
        let mut lines: Vec<&str> = existing.lines().collect();
        let line = entry.line();
        lines.push(&line);
        self.write_lines(&lines)
    }

    fn write_lines(&self, lines: &[&str]) -> Result<(), String> {
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        std::fs::write(&self.path, self.encoding.encode(&text))
            .map_err(|e| format!("Cannot write pool '{}': {}", self.path.display(), e))
    }
}
