//! The DJ decision cycle: gather context, ask the brain, validate and match
//! its answer, retry with escalating fallback instructions, and commit
//! exactly one result to the play queue (or fall back to the pool).

use crate::brain::{Brain, BrainError, BrainRequest, BrainReply};
use crate::context::{ChartsDesk, NewsDesk, WeatherDesk};
use crate::history::History;
use crate::instructions::{
    self, InstructionKind, InstructionSet, RetryTier,
};
use crate::logfile::StationLog;
use crate::matcher::{AliasTable, TrackMatcher};
use crate::pool::{PoolEntry, SuggestionPool};
use crate::queue::PlayQueue;
use crate::shows::{EffectiveShow, ShowSchedule};
use crate::state_store::StateStore;
use crate::track::{Library, Track};
use crate::tts::Announcer;
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_OFFER_CAP: usize = 5;

const LAST_SHOW_ID_KEY: &str = "show.last_id";
const LAST_SHOW_NAME_KEY: &str = "show.last_name";

/// How a cycle ended. Failures never escape; they degrade into one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A brain suggestion was matched and queued.
    Queued { track: PathBuf, announced: bool },
    /// Attempts were exhausted; a pool entry was queued without narration.
    PoolFallback { track: PathBuf },
    /// Nothing usable anywhere; the queue's repeat behavior covers the gap.
    NothingQueued,
    /// The library listing could not be read. The polling loop should sleep
    /// and retry; the process itself keeps running.
    LibraryUnavailable,
}

/// Everything one cycle needs, injected so cycles run against fakes in
/// tests. Collaborator failures degrade tier by tier instead of erroring
/// out of `run`.
pub struct DjCycle<'a> {
    pub brain: &'a dyn Brain,
    pub announcer: &'a dyn Announcer,
    pub queue: &'a PlayQueue,
    pub log: &'a StationLog,
    pub history: &'a History,
    pub schedule: &'a ShowSchedule,
    pub store: &'a StateStore,
    pub weather: Option<&'a WeatherDesk>,
    pub news: Option<&'a NewsDesk>,
    pub charts: &'a ChartsDesk,
    pub aliases: &'a AliasTable,
    pub library_listing: &'a Path,
    pub pools_dir: &'a Path,
    pub default_pool: Option<&'a str>,
    pub wishlist_path: &'a Path,
    pub max_attempts: u32,
    pub offer_cap: usize,
    /// Low-engagement mode: consumed pool entries are rotated back so the
    /// pool never depletes while nobody is listening.
    pub power_save: bool,
}

impl<'a> DjCycle<'a> {
    pub fn run(&self, listener_input: Option<&str>, now: DateTime<Local>) -> CycleOutcome {
        let library = match Library::load_listing(self.library_listing) {
            Ok(lib) => lib,
            Err(e) => {
                self.log.log(&format!("CRITICAL: {}", e));
                return CycleOutcome::LibraryUnavailable;
            }
        };

        let last_track = self
            .queue
            .last_track_name()
            .unwrap_or_else(|| "Unknown track (Queue may have been empty)".to_string());

        let show = self.schedule.effective_at(now.time());
        self.log.active_show(&show.name);
        let transitioned = self.detect_transition(&show, &library);

        let pool = show
            .suggestion_pool
            .as_deref()
            .or(self.default_pool)
            .map(|name| SuggestionPool::open(&self.pools_dir.join(name)));

        let mut deep_dive_id: Option<String> = None;
        let mut set = InstructionSet::new();
        if transitioned {
            set.push(
                InstructionKind::ShowTransition,
                format!(
                    "A new show is starting: '{}'. Welcome the listeners to it in your announcement.",
                    show.name
                ),
            );
        }
        // listener requests and show transitions take prompt priority over
        // ambient weather/news context
        if !transitioned && listener_input.is_none() {
            if let Some(weather) = self.weather {
                if let Some(blurb) = weather.blurb() {
                    set.push(
                        InstructionKind::Weather,
                        format!("Current weather you can mention on air: {}", blurb),
                    );
                }
            }
            if show.news_enabled {
                if let Some(news) = self.news {
                    if let Some(segment) = news.segment() {
                        deep_dive_id = segment.deep_dive_id;
                        set.push(InstructionKind::News, segment.text);
                    }
                }
            }
        }
        if let Some(style) = &show.music_style {
            set.push(
                InstructionKind::MusicStyle,
                format!("Music style for this show: {}.", style),
            );
        }
        if let Some(personality) = &show.dj_personality {
            set.push(
                InstructionKind::Personality,
                format!("Your DJ personality for this show: {}.", personality),
            );
        }
        if let Some(trivia) = self.charts.trivia_for(&last_track) {
            set.push(InstructionKind::ChartTrivia, trivia);
        }

        let matcher = TrackMatcher::new(self.aliases);

        for attempt in 1..=self.max_attempts {
            self.log.attempt(attempt, self.max_attempts);
            let request = BrainRequest {
                last_track: last_track.clone(),
                listener_input: listener_input.map(|s| s.to_string()),
                instructions: set.render(),
            };
            let reply = match self.brain.suggest(&request) {
                Ok(reply) => reply,
                Err(BrainError::Unavailable(e)) => {
                    self.log.log(&format!("DJ Brain unavailable: {}", e));
                    break;
                }
                Err(BrainError::Malformed(e)) => {
                    // same as "suggestion not found": retry, don't abort
                    self.log.log(&format!("DJ Brain reply malformed: {}", e));
                    self.escalate(&mut set, None, pool.as_ref(), &library, listener_input, &show);
                    continue;
                }
            };

            let suggestion = reply.track.trim().to_string();
            self.log.suggestion(&suggestion);

            // history ban comes before matching; a banned suggestion is
            // "not found" even when the library has it
            if self.history.contains(&suggestion) {
                self.log.rejected_history(&suggestion);
                self.push_wishlist(&suggestion);
                self.escalate(
                    &mut set,
                    Some(&suggestion),
                    pool.as_ref(),
                    &library,
                    listener_input,
                    &show,
                );
                continue;
            }

            match matcher.find(&library, &suggestion) {
                Some(track) => {
                    let track = track.clone();
                    return self.commit(&track, &reply, pool.as_ref(), deep_dive_id.take());
                }
                None => {
                    self.log.not_found(&suggestion);
                    self.push_wishlist(&suggestion);
                    self.escalate(
                        &mut set,
                        Some(&suggestion),
                        pool.as_ref(),
                        &library,
                        listener_input,
                        &show,
                    );
                }
            }
        }

        self.pool_fallback(pool.as_ref(), &library)
    }

    /// Compare the active show against the one stored last cycle. On a
    /// change, log the transition and force-queue the new show's signation.
    fn detect_transition(&self, show: &EffectiveShow, library: &Library) -> bool {
        let prev_id = self.store.get_string(LAST_SHOW_ID_KEY);
        let prev_name = self.store.get_string(LAST_SHOW_NAME_KEY);
        let _ = self.store.set_string(LAST_SHOW_ID_KEY, &show.id);
        let _ = self.store.set_string(LAST_SHOW_NAME_KEY, &show.name);

        let Some(prev_id) = prev_id else {
            return false;
        };
        if prev_id == show.id {
            return false;
        }
        self.log.show_transition(
            prev_name.as_deref().unwrap_or(&prev_id),
            &show.id,
            &show.name,
        );
        if let Some(signation) = &show.signation {
            let matcher = TrackMatcher::new(self.aliases);
            match matcher.find(library, signation) {
                Some(track) => {
                    if self.queue.append(&track.path).is_ok() {
                        self.log
                            .log(&format!("Queued signation: {}", track.file_name()));
                    }
                }
                None => {
                    self.log
                        .log(&format!("Signation not found in library: {}", signation));
                }
            }
        }
        true
    }

    /// Successful match: narrate, queue, consume from the pool, record
    /// history, and settle any pending news deep dive.
    fn commit(
        &self,
        track: &Track,
        reply: &BrainReply,
        pool: Option<&SuggestionPool>,
        deep_dive_id: Option<String>,
    ) -> CycleOutcome {
        self.log.success(&track.file_name());

        let announcement = match self.announcer.synthesize(&reply.announcement) {
            Ok(path) => Some(path),
            Err(e) => {
                // the song still plays, just without narration
                self.log.log(&format!("TTS failed, queueing track alone: {}", e));
                None
            }
        };
        if let Err(e) = self.queue.append_pair(announcement.as_deref(), &track.path) {
            self.log.log(&format!("Failed to append to queue: {}", e));
            return CycleOutcome::NothingQueued;
        }

        if let Some(pool) = pool {
            if let Some(entry) = self.pool_entry_for(pool, &reply.track, track) {
                match pool.consume(&entry) {
                    Ok(true) => {
                        self.log.removed_from_pool(&pool.name(), &track.file_name());
                        if self.power_save {
                            let _ = pool.rotate(&entry);
                        }
                    }
                    Ok(false) => {}
                    Err(e) => self.log.log(&format!("Pool update failed: {}", e)),
                }
            }
        }

        self.history.push(&track.display_name());

        if let (Some(id), Some(news)) = (deep_dive_id, self.news) {
            news.mark_presented(&id);
        }

        CycleOutcome::Queued {
            track: track.path.clone(),
            announced: announcement.is_some(),
        }
    }

    fn pool_entry_for(
        &self,
        pool: &SuggestionPool,
        suggestion: &str,
        track: &Track,
    ) -> Option<PoolEntry> {
        let suggestion = suggestion.trim().to_lowercase();
        let file_name = track.file_name().to_lowercase();
        pool.entries().into_iter().find(|e| {
            let entry = e.track.to_lowercase();
            entry == suggestion || file_name.contains(&entry)
        })
    }

    /// Pick the retry instruction for the next attempt, most specific tier
    /// first: concrete pool offers, then same-artist alternatives, then a
    /// listener-request redirect, then abandoning the artist.
    fn escalate(
        &self,
        set: &mut InstructionSet,
        suggestion: Option<&str>,
        pool: Option<&SuggestionPool>,
        library: &Library,
        listener_input: Option<&str>,
        show: &EffectiveShow,
    ) {
        if let Some(pool) = pool {
            let entries = pool.entries();
            let regular: Vec<String> = entries
                .iter()
                .filter(|e| !e.is_news_relevant())
                .take(self.offer_cap)
                .map(|e| e.offer_line())
                .collect();
            let news: Vec<String> = if show.news_enabled {
                entries
                    .iter()
                    .filter(|e| e.is_news_relevant())
                    .take(self.offer_cap)
                    .map(|e| e.offer_line())
                    .collect()
            } else {
                Vec::new()
            };
            if !regular.is_empty() || !news.is_empty() {
                self.log.offering(regular.len() + news.len());
                let text = instructions::pool_offer_text(&regular, &news);
                self.log.log(&text);
                set.set_retry(RetryTier::PoolOffer, text);
                return;
            }
        }

        if let Some(suggestion) = suggestion {
            let artist = suggestion.split(" - ").next().unwrap_or(suggestion).trim();
            if !artist.is_empty() {
                let alternatives: Vec<String> = library
                    .tracks_by_artist(artist)
                    .iter()
                    .map(|t| t.display_name())
                    .filter(|name| !self.history.contains(name))
                    .collect();
                if !alternatives.is_empty() {
                    set.set_retry(
                        RetryTier::SameArtist,
                        instructions::same_artist_text(artist, &alternatives),
                    );
                    return;
                }
            }
        }

        if listener_input.is_some() {
            let wanted = suggestion.unwrap_or("the requested track");
            set.set_retry(
                RetryTier::ListenerRedirect,
                instructions::listener_redirect_text(wanted),
            );
            return;
        }

        let failed = suggestion.unwrap_or("the last suggestion");
        set.set_retry(
            RetryTier::AbandonArtist,
            instructions::abandon_artist_text(failed),
        );
    }

    /// Exhausted: queue the first pool entry that exists in the library and
    /// is not history-banned, with no announcement.
    fn pool_fallback(&self, pool: Option<&SuggestionPool>, library: &Library) -> CycleOutcome {
        let Some(pool) = pool else {
            self.log.log("No suggestion pool bound. Nothing queued this cycle.");
            return CycleOutcome::NothingQueued;
        };
        self.log
            .log("All attempts exhausted. Falling back to suggestion pool.");
        for entry in pool.entries() {
            if self.history.contains(&entry.track) {
                continue;
            }
            let Some(track) = library.find_containing(&entry.track).first().map(|t| (*t).clone())
            else {
                continue;
            };
            self.log.success(&track.file_name());
            if let Err(e) = self.queue.append(&track.path) {
                self.log.log(&format!("Failed to append to queue: {}", e));
                return CycleOutcome::NothingQueued;
            }
            match pool.consume(&entry) {
                Ok(true) => {
                    self.log.removed_from_pool(&pool.name(), &track.file_name());
                    if self.power_save {
                        let _ = pool.rotate(&entry);
                    }
                }
                Ok(false) => {}
                Err(e) => self.log.log(&format!("Pool update failed: {}", e)),
            }
            self.history.push(&track.display_name());
            return CycleOutcome::PoolFallback { track: track.path };
        }
        self.log.log("Suggestion pool exhausted too. Nothing queued this cycle.");
        CycleOutcome::NothingQueued
    }

    fn push_wishlist(&self, suggestion: &str) {
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.wishlist_path)
        {
            let line = format!(
                "[{}] {}\n",
                Local::now().format(crate::logfile::TIMESTAMP_FORMAT),
                suggestion
            );
            let _ = file.write_all(line.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::BrainReply;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    // --- test doubles ---

    /// Brain that replays scripted replies and records each request.
    struct ScriptedBrain {
        replies: RefCell<Vec<Result<BrainReply, BrainError>>>,
        requests: RefCell<Vec<BrainRequest>>,
    }

    impl ScriptedBrain {
        fn new(replies: Vec<Result<BrainReply, BrainError>>) -> Self {
            ScriptedBrain {
                replies: RefCell::new(replies),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn suggesting(track: &str) -> Self {
            Self::new(vec![Ok(BrainReply {
                track: track.to_string(),
                announcement: "Here comes a great one.".to_string(),
            })])
        }
    }

    impl Brain for ScriptedBrain {
        fn suggest(&self, request: &BrainRequest) -> Result<BrainReply, BrainError> {
            self.requests.borrow_mut().push(request.clone());
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                Err(BrainError::Unavailable("script ran out".to_string()))
            } else {
                replies.remove(0)
            }
        }
    }

    struct FakeTts {
        fail: bool,
        dir: PathBuf,
    }

    impl Announcer for FakeTts {
        fn synthesize(&self, _text: &str) -> Result<PathBuf, String> {
            if self.fail {
                return Err("synth backend down".to_string());
            }
            let path = self.dir.join("announcement.mp3");
            std::fs::write(&path, b"audio").map_err(|e| e.to_string())?;
            Ok(path)
        }
    }

    // --- fixture ---

    struct Fixture {
        dir: TempDir,
        listing: PathBuf,
        queue: PlayQueue,
        log: StationLog,
        history: History,
        schedule: ShowSchedule,
        store: StateStore,
        charts: ChartsDesk,
        aliases: AliasTable,
        wishlist: PathBuf,
        tts: FakeTts,
    }

    impl Fixture {
        fn new(tracks: &[&str]) -> Self {
            let dir = tempdir().unwrap();
            let listing = dir.path().join("library.txt");
            let lines: Vec<String> = tracks
                .iter()
                .map(|t| format!("/music/{}", t))
                .collect();
            std::fs::write(&listing, lines.join("\n") + "\n").unwrap();
            Fixture {
                queue: PlayQueue::new(&dir.path().join("queue.txt")),
                log: StationLog::new(&dir.path().join("orchestrator.log")),
                history: History::new(&dir.path().join("history.json"), 10),
                schedule: ShowSchedule::default(),
                store: StateStore::new(&dir.path().join("state.json")),
                charts: ChartsDesk::default(),
                aliases: AliasTable::default(),
                wishlist: dir.path().join("wishlist.txt"),
                tts: FakeTts {
                    fail: false,
                    dir: dir.path().to_path_buf(),
                },
                listing,
                dir,
            }
        }

        fn write_pool(&self, name: &str, lines: &[&str]) {
            std::fs::write(
                self.dir.path().join(name),
                lines.join("\n") + "\n",
            )
            .unwrap();
        }

        fn cycle<'a>(&'a self, brain: &'a ScriptedBrain, pool: Option<&'a str>) -> DjCycle<'a> {
            DjCycle {
                brain,
                announcer: &self.tts,
                queue: &self.queue,
                log: &self.log,
                history: &self.history,
                schedule: &self.schedule,
                store: &self.store,
                weather: None,
                news: None,
                charts: &self.charts,
                aliases: &self.aliases,
                library_listing: &self.listing,
                pools_dir: self.dir.path(),
                default_pool: pool,
                wishlist_path: &self.wishlist,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                offer_cap: DEFAULT_OFFER_CAP,
                power_save: false,
            }
        }

        fn queue_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.queue.path())
                .unwrap_or_default()
                .lines()
                .map(|l| l.to_string())
                .collect()
        }

        fn log_text(&self) -> String {
            std::fs::read_to_string(self.log.path()).unwrap_or_default()
        }
    }

    fn now() -> DateTime<Local> {
        Local::now()
    }

    // --- cycle tests ---

    #[test]
    fn matched_suggestion_is_announced_and_queued() {
        let fx = Fixture::new(&["Fleetwood Mac - Dreams.mp3"]);
        let brain = ScriptedBrain::suggesting("Fleetwood Mac - Dreams");
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert!(matches!(
            outcome,
            CycleOutcome::Queued { announced: true, .. }
        ));
        let lines = fx.queue_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("announcement.mp3"));
        assert!(lines[1].ends_with("Fleetwood Mac - Dreams.mp3"));
        // history gained exactly one entry
        assert_eq!(fx.history.recent(10), vec!["Fleetwood Mac - Dreams"]);
    }

    #[test]
    fn tts_failure_still_queues_bare_track() {
        let mut fx = Fixture::new(&["Fleetwood Mac - Dreams.mp3"]);
        fx.tts.fail = true;
        let brain = ScriptedBrain::suggesting("Fleetwood Mac - Dreams");
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert!(matches!(
            outcome,
            CycleOutcome::Queued { announced: false, .. }
        ));
        assert_eq!(fx.queue_lines().len(), 1);
    }

    #[test]
    fn history_ban_rejects_before_matching() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        fx.history.push("ABBA - Waterloo");
        let brain = ScriptedBrain::new(vec![
            Ok(BrainReply {
                track: "ABBA - Waterloo".to_string(),
                announcement: "a".to_string(),
            }),
            Ok(BrainReply {
                track: "ABBA - Waterloo".to_string(),
                announcement: "a".to_string(),
            }),
        ]);
        let outcome = fx.cycle(&brain, None).run(None, now());
        // both attempts banned, no pool -> nothing queued
        assert_eq!(outcome, CycleOutcome::NothingQueued);
        assert!(fx.queue_lines().is_empty());
        assert!(fx
            .log_text()
            .contains("DJ Suggestion REJECTED: 'ABBA - Waterloo' is in recent history"));
        // attempt counter went to 2 before the script ran out
        assert!(fx.log_text().contains("--- DJ Attempt 2/5 ---"));
        // rejected suggestions land on the wishlist, timestamped
        let wishlist = std::fs::read_to_string(&fx.wishlist).unwrap();
        let lines: Vec<&str> = wishlist.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with('[') && l.ends_with("] ABBA - Waterloo")));
    }

    #[test]
    fn retry_offers_pool_tracks_first() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3", "Queen - Under Pressure.mp3"]);
        fx.write_pool(
            "pool.txt",
            &[
                "Queen - Under Pressure",
                "ABBA - Money Money Money | matches news quote: inflation rises",
            ],
        );
        let brain = ScriptedBrain::new(vec![
            Ok(BrainReply {
                track: "Nonexistent Band - Nothing".to_string(),
                announcement: "a".to_string(),
            }),
            Ok(BrainReply {
                track: "Queen - Under Pressure".to_string(),
                announcement: "b".to_string(),
            }),
        ]);
        let outcome = fx.cycle(&brain, Some("pool.txt")).run(None, now());
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        // second request carried the pool offer
        let requests = brain.requests.borrow();
        assert!(requests[0].instructions.is_none());
        let retry = requests[1].instructions.as_ref().unwrap();
        assert!(retry.contains(instructions::OTHER_RECOMMENDED_HEADER));
        assert!(retry.contains("Queen - Under Pressure"));
        assert!(retry.contains(instructions::NEWS_RELEVANT_HEADER));
        // the offer block is recorded for the report engine
        assert!(fx.log_text().contains("Offering 2 tracks from suggestion pool"));
        // the picked entry was consumed from the pool file
        let pool_left = std::fs::read_to_string(fx.dir.path().join("pool.txt")).unwrap();
        assert!(!pool_left.contains("Queen - Under Pressure"));
        assert!(pool_left.contains("ABBA - Money Money Money"));
        assert!(fx
            .log_text()
            .contains("Removed from pool pool: Queen - Under Pressure.mp3"));
    }

    #[test]
    fn retry_escalates_to_same_artist_without_pool() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3", "ABBA - SOS.mp3"]);
        let brain = ScriptedBrain::new(vec![
            Ok(BrainReply {
                track: "ABBA - Imaginary Song".to_string(),
                announcement: "a".to_string(),
            }),
            Ok(BrainReply {
                track: "ABBA - SOS".to_string(),
                announcement: "b".to_string(),
            }),
        ]);
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        let requests = brain.requests.borrow();
        let retry = requests[1].instructions.as_ref().unwrap();
        assert!(retry.contains("same artist"));
        assert!(retry.contains("ABBA - SOS"));
    }

    #[test]
    fn listener_request_redirect_keeps_intent() {
        let fx = Fixture::new(&["Queen - Under Pressure.mp3"]);
        let brain = ScriptedBrain::new(vec![
            Ok(BrainReply {
                track: "Nonexistent Band - Nothing".to_string(),
                announcement: "a".to_string(),
            }),
            Ok(BrainReply {
                track: "Queen - Under Pressure".to_string(),
                announcement: "b".to_string(),
            }),
        ]);
        let outcome = fx
            .cycle(&brain, None)
            .run(Some("play something romantic"), now());
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        let requests = brain.requests.borrow();
        assert_eq!(
            requests[0].listener_input.as_deref(),
            Some("play something romantic")
        );
        let retry = requests[1].instructions.as_ref().unwrap();
        assert!(retry.contains("Acknowledge the listener's"));
    }

    #[test]
    fn abandon_artist_is_last_resort() {
        let fx = Fixture::new(&["Queen - Under Pressure.mp3"]);
        let brain = ScriptedBrain::new(vec![
            Ok(BrainReply {
                track: "Nonexistent Band - Nothing".to_string(),
                announcement: "a".to_string(),
            }),
            Ok(BrainReply {
                track: "Queen - Under Pressure".to_string(),
                announcement: "b".to_string(),
            }),
        ]);
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        let requests = brain.requests.borrow();
        let retry = requests[1].instructions.as_ref().unwrap();
        assert!(retry.contains("completely different track"));
    }

    #[test]
    fn brain_unavailable_falls_back_to_pool() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        fx.write_pool("pool.txt", &["ABBA - Waterloo"]);
        let brain = ScriptedBrain::new(vec![Err(BrainError::Unavailable(
            "api down".to_string(),
        ))]);
        let outcome = fx.cycle(&brain, Some("pool.txt")).run(None, now());
        assert!(matches!(outcome, CycleOutcome::PoolFallback { .. }));
        // queued alone, no announcement
        let lines = fx.queue_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("ABBA - Waterloo.mp3"));
        // consumed from the pool
        let pool_left = std::fs::read_to_string(fx.dir.path().join("pool.txt")).unwrap();
        assert!(pool_left.trim().is_empty());
    }

    #[test]
    fn exhausted_with_empty_pool_queues_nothing() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        let brain = ScriptedBrain::new(vec![Err(BrainError::Unavailable(
            "api down".to_string(),
        ))]);
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert_eq!(outcome, CycleOutcome::NothingQueued);
        assert!(fx.queue_lines().is_empty());
    }

    #[test]
    fn malformed_reply_folds_into_retry() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        let brain = ScriptedBrain::new(vec![
            Err(BrainError::Malformed("extra keys".to_string())),
            Ok(BrainReply {
                track: "ABBA - Waterloo".to_string(),
                announcement: "b".to_string(),
            }),
        ]);
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        assert!(fx.log_text().contains("--- DJ Attempt 2/5 ---"));
    }

    #[test]
    fn attempt_cap_is_respected() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        let reply = || {
            Ok(BrainReply {
                track: "Nonexistent Band - Nothing".to_string(),
                announcement: "a".to_string(),
            })
        };
        let brain = ScriptedBrain::new(vec![
            reply(),
            reply(),
            reply(),
            reply(),
            reply(),
            reply(),
            reply(),
        ]);
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert_eq!(outcome, CycleOutcome::NothingQueued);
        assert_eq!(brain.requests.borrow().len(), 5);
        assert!(fx.log_text().contains("--- DJ Attempt 5/5 ---"));
        assert!(!fx.log_text().contains("--- DJ Attempt 6/5 ---"));
    }

    #[test]
    fn missing_library_listing_aborts_cycle_only() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        std::fs::remove_file(&fx.listing).unwrap();
        let brain = ScriptedBrain::suggesting("ABBA - Waterloo");
        let outcome = fx.cycle(&brain, None).run(None, now());
        assert_eq!(outcome, CycleOutcome::LibraryUnavailable);
        // the brain was never consulted
        assert!(brain.requests.borrow().is_empty());
    }

    #[test]
    fn show_transition_queues_signation_and_skips_context() {
        let mut fx = Fixture::new(&[
            "Morning Show - Opening Theme.mp3",
            "ABBA - Waterloo.mp3",
        ]);
        // previous cycle ran under a different show id
        fx.store.set_string("show.last_id", "night").unwrap();
        fx.store.set_string("show.last_name", "Night Owls").unwrap();

        fx.schedule.shows.push(crate::shows::Show {
            id: "morning".to_string(),
            name: "Good morning Vienna!".to_string(),
            schedule: crate::shows::ShowWindow {
                start: "00:00".to_string(),
                end: "23:59".to_string(),
            },
            overrides: crate::shows::ShowOverrides {
                signation: Some("Morning Show - Opening Theme".to_string()),
                ..Default::default()
            },
        });

        let brain = ScriptedBrain::suggesting("ABBA - Waterloo");
        let noon = chrono::TimeZone::with_ymd_and_hms(&Local, 2026, 2, 22, 12, 0, 0).unwrap();
        let outcome = fx.cycle(&brain, None).run(None, noon);
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        let lines = fx.queue_lines();
        // signation first, then announcement and track
        assert!(lines[0].ends_with("Morning Show - Opening Theme.mp3"));
        assert!(fx.log_text().contains(
            "SHOW TRANSITION: 'Night Owls' -> 'morning' (Good morning Vienna!)"
        ));
        // the transition announcement reached the brain
        let requests = brain.requests.borrow();
        assert!(requests[0]
            .instructions
            .as_ref()
            .unwrap()
            .contains("Good morning Vienna!"));
    }

    #[test]
    fn power_save_rotates_consumed_pool_entry() {
        let fx = Fixture::new(&["ABBA - Waterloo.mp3"]);
        fx.write_pool("pool.txt", &["ABBA - Waterloo", "Queen - Under Pressure"]);
        let brain = ScriptedBrain::suggesting("ABBA - Waterloo");
        let mut cycle = fx.cycle(&brain, Some("pool.txt"));
        cycle.power_save = true;
        let outcome = cycle.run(None, now());
        assert!(matches!(outcome, CycleOutcome::Queued { .. }));
        let pool_left = std::fs::read_to_string(fx.dir.path().join("pool.txt")).unwrap();
        let lines: Vec<&str> = pool_left.lines().collect();
        // consumed from the front, rotated to the back
        assert_eq!(lines, vec!["Queen - Under Pressure", "ABBA - Waterloo"]);
    }
}
