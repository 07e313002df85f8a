//! autodj: an automated internet-radio DJ orchestrator.
//!
//! A single-threaded polling loop watches for a queue-low signal, asks an
//! external generative "brain" for the next track, validates and matches the
//! suggestion against the music library, narrates it via TTS, and appends
//! the result to a file-backed play queue. A report engine replays the
//! orchestrator's own log to grade the DJ's track choices.

pub mod brain;
pub mod config;
pub mod context;
pub mod cycle;
pub mod history;
pub mod instructions;
pub mod lockfile;
pub mod logfile;
pub mod matcher;
pub mod pool;
pub mod queue;
pub mod report;
pub mod shows;
pub mod state_store;
pub mod station;
pub mod track;
pub mod tts;
