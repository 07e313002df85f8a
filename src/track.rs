use lofty::file::TaggedFileExt;
use lofty::tag::Accessor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Audio extensions considered part of the music library.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a"];

/// A single library track, identified by its filesystem path.
///
/// Artist and title are derived by splitting the file stem on the first
/// `" - "` separator. Tracks are enumerated at cycle start from the library
/// listing and are immutable for the duration of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub path: PathBuf,
    pub artist: String,
    pub title: String,
}

impl Track {
    /// Build a track from a library path, parsing artist/title from the stem.
    pub fn from_library_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (artist, title) = match stem.split_once(" - ") {
            Some((a, t)) => (a.trim().to_string(), t.trim().to_string()),
            None => ("Unknown".to_string(), stem.clone()),
        };
        Track {
            path: path.to_path_buf(),
            artist,
            title,
        }
    }

    /// Fill in artist/title from embedded tags when the filename carries no
    /// `"Artist - Title"` separator. Used by the library scanner only; the
    /// live cycle never touches audio files.
    pub fn from_path_with_tags(path: &Path) -> Self {
        let mut track = Track::from_library_path(path);
        if track.artist != "Unknown" {
            return track;
        }
        if let Ok(tagged) = lofty::read_from_path(path) {
            let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
            if let Some(tag) = tag {
                if let Some(artist) = tag.artist() {
                    track.artist = artist.to_string();
                }
                if let Some(title) = tag.title() {
                    track.title = title.to_string();
                }
            }
        }
        track
    }

    /// The file name including extension, as it appears in the listing.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// `"Artist - Title"` display form.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// Key used for loose comparisons: punctuation stripped, case folded.
    pub fn normalized_key(&self) -> String {
        normalize(&self.display_name())
    }
}

/// Normalize text for matching: lowercase, punctuation dropped,
/// whitespace collapsed.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// The track library, loaded from a listing file (one path per line).
#[derive(Debug, Clone, Default)]
pub struct Library {
    pub tracks: Vec<Track>,
}

impl Library {
    /// Load the library from a listing file. A missing or unreadable listing
    /// is the one condition that aborts a cycle, so this returns an error
    /// instead of an empty library.
    pub fn load_listing(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read library listing '{}': {}", path.display(), e))?;
        let tracks = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| Track::from_library_path(Path::new(l)))
            .collect();
        Ok(Library { tracks })
    }

    /// Scan a music directory recursively for audio files, reading tags for
    /// files without an `"Artist - Title"` name. Returns tracks sorted by path.
    pub fn scan_dir(dir: &Path) -> Result<Self, String> {
        let mut paths = Vec::new();
        collect_audio_files(dir, &mut paths)?;
        paths.sort();
        let tracks = paths
            .iter()
            .map(|p| Track::from_path_with_tags(p))
            .collect();
        Ok(Library { tracks })
    }

    /// Write the listing file (one path per line).
    pub fn write_listing(&self, path: &Path) -> Result<(), String> {
        let mut out = String::new();
        for track in &self.tracks {
            out.push_str(&track.path.to_string_lossy());
            out.push('\n');
        }
        std::fs::write(path, out)
            .map_err(|e| format!("Cannot write listing '{}': {}", path.display(), e))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All tracks whose file name contains `text` (case-insensitive).
    pub fn find_containing(&self, text: &str) -> Vec<&Track> {
        let needle = text.to_lowercase();
        self.tracks
            .iter()
            .filter(|t| t.file_name().to_lowercase().contains(&needle))
            .collect()
    }

    /// All tracks by the given artist (case-insensitive exact artist match).
    pub fn tracks_by_artist(&self, artist: &str) -> Vec<&Track> {
        let wanted = artist.to_lowercase();
        self.tracks
            .iter()
            .filter(|t| t.artist.to_lowercase() == wanted)
            .collect()
    }

    /// Whether any file name contains `text` (case-insensitive).
    pub fn contains(&self, text: &str) -> bool {
        !self.find_containing(text).is_empty()
    }
}

fn collect_audio_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("Cannot read directory '{}': {}", dir.display(), e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_audio_files(&path, out)?;
            continue;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_artist_and_title_from_stem() {
        let t = Track::from_library_path(Path::new("/music/Fleetwood Mac - Dreams.mp3"));
        assert_eq!(t.artist, "Fleetwood Mac");
        assert_eq!(t.title, "Dreams");
        assert_eq!(t.file_name(), "Fleetwood Mac - Dreams.mp3");
    }

    #[test]
    fn splits_on_first_separator_only() {
        let t = Track::from_library_path(Path::new("/music/Daft Punk - Harder - Better.mp3"));
        assert_eq!(t.artist, "Daft Punk");
        assert_eq!(t.title, "Harder - Better");
    }

    #[test]
    fn missing_separator_falls_back_to_unknown_artist() {
        let t = Track::from_library_path(Path::new("/music/jingle.mp3"));
        assert_eq!(t.artist, "Unknown");
        assert_eq!(t.title, "jingle");
    }

    #[test]
    fn normalize_strips_punctuation_and_folds_case() {
        assert_eq!(normalize("P!nk - So What?"), "p nk so what");
        assert_eq!(normalize("  ABBA -- Waterloo  "), "abba waterloo");
    }

    #[test]
    fn load_listing_reads_non_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let listing = dir.path().join("music.playlist");
        fs::write(
            &listing,
            "/music/ABBA - Waterloo.mp3\n\n/music/Blur - Song 2.mp3\n",
        )
        .unwrap();

        let lib = Library::load_listing(&listing).unwrap();
        assert_eq!(lib.len(), 2);
        assert_eq!(lib.tracks[0].artist, "ABBA");
        assert_eq!(lib.tracks[1].title, "Song 2");
    }

    #[test]
    fn load_listing_missing_file_is_an_error() {
        assert!(Library::load_listing(Path::new("/nonexistent/music.playlist")).is_err());
    }

    #[test]
    fn find_containing_is_case_insensitive() {
        let lib = Library {
            tracks: vec![
                Track::from_library_path(Path::new("/m/Fleetwood Mac - Dreams.mp3")),
                Track::from_library_path(Path::new("/m/Blur - Song 2.mp3")),
            ],
        };
        assert_eq!(lib.find_containing("fleetwood mac - dreams").len(), 1);
        assert!(lib.contains("BLUR"));
        assert!(!lib.contains("Oasis"));
    }

    #[test]
    fn tracks_by_artist_matches_exactly() {
        let lib = Library {
            tracks: vec![
                Track::from_library_path(Path::new("/m/Blur - Song 2.mp3")),
                Track::from_library_path(Path::new("/m/Blur - Girls & Boys.mp3")),
                Track::from_library_path(Path::new("/m/Blurred Vision - Dear John.mp3")),
            ],
        };
        assert_eq!(lib.tracks_by_artist("blur").len(), 2);
    }

    #[test]
    fn scan_dir_collects_audio_files_and_writes_listing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ABBA - Waterloo.mp3"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("Blur - Song 2.ogg"), b"x").unwrap();

        let lib = Library::scan_dir(dir.path()).unwrap();
        assert_eq!(lib.len(), 2);

        let listing = dir.path().join("music.playlist");
        lib.write_listing(&listing).unwrap();
        let reloaded = Library::load_listing(&listing).unwrap();
        assert_eq!(reloaded.len(), 2);
    }
}
