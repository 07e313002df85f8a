use crate::state_store::StateStore;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// How long a scraped forecast stays usable.
pub const WEATHER_TTL: Duration = Duration::from_secs(1800);
/// Minimum spacing between full headline bulletins.
pub const HEADLINES_INTERVAL: Duration = Duration::from_secs(3600);

const WEATHER_KEY: &str = "weather.forecast";
const HEADLINES_DONE_KEY: &str = "news.headlines_done";
const DEEP_DIVE_KEY: &str = "news.deep_dive";
const DEEP_DIVE_PENDING: &str = "PENDING";

/// Weather context source. A fresh cached forecast is reused; a stale one
/// triggers the external scraper command, which writes `{"forecast": ...}`
/// to its result file. Any failure simply yields no blurb.
#[derive(Debug, Clone)]
pub struct WeatherDesk {
    store: StateStore,
    command: Option<Vec<String>>,
    result_file: PathBuf,
    timeout: Duration,
}

#[derive(Deserialize)]
struct WeatherResult {
    forecast: Option<String>,
}

impl WeatherDesk {
    pub fn new(
        store: StateStore,
        command: Option<Vec<String>>,
        result_file: &Path,
        timeout: Duration,
    ) -> Self {
        WeatherDesk {
            store,
            command,
            result_file: result_file.to_path_buf(),
            timeout,
        }
    }

    pub fn blurb(&self) -> Option<String> {
        if let Some(cached) = self.store.get_fresh(WEATHER_KEY, WEATHER_TTL) {
            return cached.as_str().map(|s| s.to_string());
        }
        let forecast = self.fetch()?;
        let _ = self.store.set_string(WEATHER_KEY, &forecast);
        Some(forecast)
    }

    fn fetch(&self) -> Option<String> {
        let command = self.command.as_ref()?;
        let program = command.first()?;
        let mut child = Command::new(program)
            .args(&command[1..])
            .arg(&self.result_file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;
        let started = std::time::Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => break,
                Ok(Some(_)) => return None,
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(_) => return None,
            }
        }
        let raw = std::fs::read_to_string(&self.result_file).ok()?;
        let result: WeatherResult = serde_json::from_str(&raw).ok()?;
        result.forecast
    }
}

/// A headline bulletin from the news source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Headlines {
    #[serde(default)]
    pub breaking: Option<String>,
    #[serde(default)]
    pub top: Vec<String>,
    #[serde(default)]
    pub regular: Vec<String>,
    #[serde(default)]
    pub quick: Vec<String>,
}

impl Headlines {
    pub fn is_empty(&self) -> bool {
        self.breaking.is_none()
            && self.top.is_empty()
            && self.regular.is_empty()
            && self.quick.is_empty()
    }
}

/// A single story suitable for an in-depth segment.
#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    pub id: String,
    pub headline: String,
    pub story: String,
}

/// Fetch mechanics for news content. The cycle never sees how stories are
/// obtained, only blurbs and story ids.
pub trait NewsProvider {
    fn headlines(&self) -> Option<Headlines>;
    fn next_story(&self) -> Option<Story>;
    fn mark_presented(&self, id: &str) -> Result<(), String>;
}

/// One news instruction for a cycle, plus the story id to mark presented
/// once the cycle actually succeeds.
#[derive(Debug, Clone)]
pub struct NewsSegment {
    pub text: String,
    pub deep_dive_id: Option<String>,
}

/// Decides what news, if any, goes into this cycle's prompt: a full
/// headline bulletin on the hourly cadence, otherwise a deep dive into the
/// next unpresented story. A deep dive stays pending until a successful
/// cycle marks it presented, so a failed cycle retries the same story.
pub struct NewsDesk {
    provider: Box<dyn NewsProvider>,
    store: StateStore,
}

impl NewsDesk {
    pub fn new(provider: Box<dyn NewsProvider>, store: StateStore) -> Self {
        NewsDesk { provider, store }
    }

    pub fn segment(&self) -> Option<NewsSegment> {
        if self
            .store
            .get_fresh(HEADLINES_DONE_KEY, HEADLINES_INTERVAL)
            .is_none()
        {
            if let Some(headlines) = self.provider.headlines() {
                if !headlines.is_empty() {
                    let _ = self.store.set_string(HEADLINES_DONE_KEY, "done");
                    let _ = self.store.remove(DEEP_DIVE_KEY);
                    return Some(NewsSegment {
                        text: headline_text(&headlines),
                        deep_dive_id: None,
                    });
                }
            }
        }

        // a previously presented id means we can look for a fresh story
        if let Some(id) = self.store.get_string(DEEP_DIVE_KEY) {
            if id != DEEP_DIVE_PENDING {
                let _ = self.store.remove(DEEP_DIVE_KEY);
            }
        }

        match self.provider.next_story() {
            Some(story) => {
                let _ = self.store.set_string(DEEP_DIVE_KEY, DEEP_DIVE_PENDING);
                Some(NewsSegment {
                    text: deep_dive_text(&story),
                    deep_dive_id: Some(story.id),
                })
            }
            None => {
                if self.store.get_string(DEEP_DIVE_KEY).as_deref() == Some(DEEP_DIVE_PENDING) {
                    let _ = self.store.remove(DEEP_DIVE_KEY);
                }
                None
            }
        }
    }

    /// Record that a deep-dive story made it to air.
    pub fn mark_presented(&self, id: &str) {
        let _ = self.provider.mark_presented(id);
        let _ = self.store.set_string(DEEP_DIVE_KEY, id);
    }
}

fn headline_text(headlines: &Headlines) -> String {
    let mut parts = Vec::new();
    if let Some(breaking) = &headlines.breaking {
        parts.push(format!("BREAKING NEWS: {}", breaking));
    }
    if !headlines.top.is_empty() {
        parts.push(format!("Top stories: {}", headlines.top.join("; ")));
    }
    if !headlines.regular.is_empty() {
        let shown: Vec<&str> = headlines.regular.iter().take(5).map(|s| s.as_str()).collect();
        parts.push(format!("Also in the news: {}", shown.join("; ")));
    }
    if !headlines.quick.is_empty() {
        let shown: Vec<&str> = headlines.quick.iter().take(5).map(|s| s.as_str()).collect();
        parts.push(format!("In brief: {}", shown.join("; ")));
    }
    format!(
        "NEWS SEGMENT: It's time for the hourly news update! Here are the current headlines:\n\n\
         {}\n\n\
         Please present these headlines to the listeners as a news bulletin in your own words. \
         Cover the top stories first, then briefly mention a few of the other headlines. \
         After the news, suggest and introduce a song that fits the overall mood of today's news.",
        parts.join("\n")
    )
}

fn deep_dive_text(story: &Story) -> String {
    format!(
        "NEWS DEEP DIVE: Please present the following news story to the listeners in your own words.\n\n\
         Headline: {}\n\
         Story: {}\n\n\
         Summarize this story engagingly for the radio audience, then suggest and introduce \
         a song that fits the topic or mood of this story.",
        story.headline, story.story
    )
}

/// News provider that shells out to an external manager command with the
/// subcommands `headlines`, `next_story`, and `mark <id>`, reading JSON from
/// its stdout.
#[derive(Debug, Clone)]
pub struct CommandNews {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandNews {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        CommandNews { command, timeout }
    }

    fn run(&self, args: &[&str]) -> Option<String> {
        let program = self.command.first()?;
        let mut child = Command::new(program)
            .args(&self.command[1..])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;
        let started = std::time::Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => break,
                Ok(Some(_)) => return None,
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(_) => return None,
            }
        }
        let mut out = String::new();
        use std::io::Read;
        child.stdout.take()?.read_to_string(&mut out).ok()?;
        Some(out)
    }
}

impl NewsProvider for CommandNews {
    fn headlines(&self) -> Option<Headlines> {
        let raw = self.run(&["headlines"])?;
        serde_json::from_str(&raw).ok()
    }

    fn next_story(&self) -> Option<Story> {
        let raw = self.run(&["next_story"])?;
        serde_json::from_str(&raw).ok()
    }

    fn mark_presented(&self, id: &str) -> Result<(), String> {
        self.run(&["mark", id])
            .map(|_| ())
            .ok_or_else(|| format!("news command failed to mark story '{}'", id))
    }
}

/// Chart positions for library tracks, keyed by track filename. Produced by
/// an external charts scraper; consumed here for on-air trivia.
#[derive(Debug, Clone, Default)]
pub struct ChartsDesk {
    positions: HashMap<String, u32>,
}

impl ChartsDesk {
    pub fn load(path: &Path) -> Self {
        let positions = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        ChartsDesk { positions }
    }

    pub fn trivia_for(&self, track_name: &str) -> Option<String> {
        let position = self.positions.get(track_name)?;
        Some(format!(
            "Chart trivia: '{}' currently sits at number {} in the Austrian Singles Top 75. \
             Feel free to mention that on air.",
            track_name, position
        ))
    }
}
