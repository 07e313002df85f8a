use crate::brain::CommandBrain;
use crate::config::StationConfig;
use crate::context::{ChartsDesk, CommandNews, NewsDesk, WeatherDesk};
use crate::cycle::{CycleOutcome, DjCycle};
use crate::history::History;
use crate::logfile::StationLog;
use crate::queue::{PlayQueue, SignalFile};
use crate::shows::ShowSchedule;
use crate::state_store::StateStore;
use crate::tts::CommandTts;
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;

/// Extra pause after a failed library read before the loop polls again.
const LIBRARY_RETRY_PAUSE: Duration = Duration::from_secs(10);

/// The orchestrator process: a single-threaded polling loop that claims the
/// queue-low signal and runs at most one cycle to completion per wakeup.
pub struct Station {
    config: StationConfig,
    queue: PlayQueue,
    signal: SignalFile,
    log: StationLog,
    history: History,
    store: StateStore,
    listener_request_file: PathBuf,
}

impl Station {
    pub fn new(config: StationConfig) -> Self {
        let queue = PlayQueue::new(&config.resolve(&config.queue_file));
        let signal = SignalFile::new(&config.resolve(&config.signal_file));
        let log = StationLog::new(&config.resolve(&config.log_file));
        let history = History::new(
            &config.resolve(&config.history_file),
            config.history_limit,
        );
        let store = StateStore::new(&config.resolve(&config.state_file));
        let listener_request_file = config.resolve(&config.listener_request_file);
        Station {
            config,
            queue,
            signal,
            log,
            history,
            store,
            listener_request_file,
        }
    }

    pub fn log(&self) -> &StationLog {
        &self.log
    }

    /// Poll for the signal file and run cycles until the process is killed.
    pub fn run(&self) {
        self.log.divider();
        self.log.log("DJ Orchestrator starting up.");
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        loop {
            if self.signal.exists() {
                if self.signal.claim() {
                    self.log.log("Signal detected. Starting DJ cycle.");
                    let listener = self.take_listener_request();
                    if self.run_cycle(listener.as_deref()) == CycleOutcome::LibraryUnavailable {
                        std::thread::sleep(LIBRARY_RETRY_PAUSE);
                    }
                } else {
                    // another instance won the rename race
                    self.log.log("Signal claimed by another instance. Backing off.");
                }
            }
            std::thread::sleep(interval);
        }
    }

    /// Run one cycle immediately. Collaborators are rebuilt per cycle so
    /// schedule and chart edits on disk take effect without a restart.
    pub fn run_cycle(&self, listener_input: Option<&str>) -> CycleOutcome {
        let config = &self.config;
        let schedule = ShowSchedule::load(&config.resolve(&config.schedule_file));
        let charts = ChartsDesk::load(&config.resolve(&config.charts_file));

        let brain = CommandBrain::new(
            config.brain_command.clone(),
            &config.resolve(&config.brain_request_file),
            &config.resolve(&config.brain_response_file),
            Duration::from_secs(config.brain_timeout_secs),
        );
        let announcer = CommandTts::new(
            config.tts_command.clone(),
            &config.base_dir,
            Duration::from_secs(config.tts_timeout_secs),
        );
        let weather = config.weather_command.clone().map(|command| {
            WeatherDesk::new(
                self.store.clone(),
                Some(command),
                &config.resolve(&config.weather_result_file),
                Duration::from_secs(30),
            )
        });
        let news = config.news_command.clone().map(|command| {
            NewsDesk::new(
                Box::new(CommandNews::new(
                    command,
                    Duration::from_secs(config.news_timeout_secs),
                )),
                self.store.clone(),
            )
        });

        let library_listing = config.resolve(&config.library_listing);
        let pools_dir = config.resolve(&config.pools_dir);
        let wishlist = config.resolve(&config.wishlist_file);
        let cycle = DjCycle {
            brain: &brain,
            announcer: &announcer,
            queue: &self.queue,
            log: &self.log,
            history: &self.history,
            schedule: &schedule,
            store: &self.store,
            weather: weather.as_ref(),
            news: news.as_ref(),
            charts: &charts,
            aliases: &config.aliases,
            library_listing: &library_listing,
            pools_dir: &pools_dir,
            default_pool: config.default_pool.as_deref(),
            wishlist_path: &wishlist,
            max_attempts: config.max_attempts,
            offer_cap: config.offer_cap,
            power_save: self.power_save_active(),
        };
        cycle.run(listener_input, Local::now())
    }

    /// Power save kicks in when the streamer reports fewer listeners than
    /// the configured threshold. A missing or unreadable count means a
    /// normal cycle.
    fn power_save_active(&self) -> bool {
        if self.config.power_save_threshold == 0 {
            return false;
        }
        let path = self.config.resolve(&self.config.listener_count_file);
        let Some(count) = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|v| v.get("listeners").and_then(|n| n.as_u64()))
        else {
            return false;
        };
        (count as u32) < self.config.power_save_threshold
    }

    /// Read and consume a pending listener request, if one was dropped off.
    fn take_listener_request(&self) -> Option<String> {
        let text = std::fs::read_to_string(&self.listener_request_file).ok()?;
        let _ = std::fs::remove_file(&self.listener_request_file);
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> StationConfig {
        StationConfig {
            base_dir: dir.to_path_buf(),
            ..StationConfig::default()
        }
    }

    #[test]
    fn listener_request_is_consumed_once() {
        let dir = tempdir().unwrap();
        let station = Station::new(config_in(dir.path()));
        std::fs::write(dir.path().join("listener_request.txt"), "play ABBA\n").unwrap();
        assert_eq!(
            station.take_listener_request().as_deref(),
            Some("play ABBA")
        );
        assert!(station.take_listener_request().is_none());
    }

    #[test]
    fn cycle_without_library_listing_reports_unavailable() {
        let dir = tempdir().unwrap();
        let station = Station::new(config_in(dir.path()));
        assert_eq!(
            station.run_cycle(None),
            CycleOutcome::LibraryUnavailable
        );
    }

    #[test]
    fn power_save_follows_listener_count() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.power_save_threshold = 3;
        let station = Station::new(config);

        // no count file yet: normal cycle
        assert!(!station.power_save_active());

        std::fs::write(dir.path().join("listeners.json"), r#"{"listeners": 1}"#).unwrap();
        assert!(station.power_save_active());

        std::fs::write(dir.path().join("listeners.json"), r#"{"listeners": 7}"#).unwrap();
        assert!(!station.power_save_active());
    }

    #[test]
    fn cycle_with_unreachable_brain_and_pool_falls_back() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.brain_command = vec!["false".to_string()];
        std::fs::write(dir.path().join("music.playlist"), "/music/ABBA - Waterloo.mp3\n")
            .unwrap();
        std::fs::write(dir.path().join("suggestion_pool.txt"), "ABBA - Waterloo\n").unwrap();
        let station = Station::new(config);
        match station.run_cycle(None) {
            CycleOutcome::PoolFallback { track } => {
                assert!(track.ends_with("ABBA - Waterloo.mp3"));
            }
            other => panic!("expected pool fallback, got {:?}", other),
        }
    }
}
