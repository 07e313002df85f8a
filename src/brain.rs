use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// One request to the generative DJ. `instructions` is the rendered
/// instruction set, `listener_input` a verbatim listener request if any.
#[derive(Debug, Clone, Serialize)]
pub struct BrainRequest {
    pub last_track: String,
    pub listener_input: Option<String>,
    pub instructions: Option<String>,
}

/// A validated brain reply: a free-text track suggestion plus the
/// announcement to read on air.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainReply {
    pub track: String,
    pub announcement: String,
}

#[derive(Debug, Error)]
pub enum BrainError {
    /// The brain process or API could not be reached at all.
    #[error("brain unavailable: {0}")]
    Unavailable(String),
    /// The brain answered, but not with the required JSON shape.
    #[error("brain reply malformed: {0}")]
    Malformed(String),
}

/// The external suggestion collaborator. One call per attempt; the
/// transport behind it is pluggable so cycles are testable without a
/// subprocess.
pub trait Brain {
    fn suggest(&self, request: &BrainRequest) -> Result<BrainReply, BrainError>;
}

/// Validate a raw reply. The contract is strict: a JSON object with exactly
/// the keys `track` and `announcement`, both strings. An `error` key means
/// the brain reported its own failure.
pub fn parse_reply(raw: &str) -> Result<BrainReply, BrainError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| BrainError::Malformed(format!("invalid JSON: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| BrainError::Malformed("reply is not a JSON object".to_string()))?;
    if let Some(err) = obj.get("error") {
        return Err(BrainError::Unavailable(format!(
            "brain reported error: {}",
            err
        )));
    }
    if obj.len() != 2 || !obj.contains_key("track") || !obj.contains_key("announcement") {
        return Err(BrainError::Malformed(format!(
            "expected exactly the keys 'track' and 'announcement', got: {:?}",
            obj.keys().collect::<Vec<_>>()
        )));
    }
    let track = obj
        .get("track")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BrainError::Malformed("'track' is not a string".to_string()))?;
    let announcement = obj
        .get("announcement")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BrainError::Malformed("'announcement' is not a string".to_string()))?;
    Ok(BrainReply {
        track: track.to_string(),
        announcement: announcement.to_string(),
    })
}

/// Brain transport that shells out to an external command. The request JSON
/// is written to a file, the command is invoked with the request and
/// response paths as its last two arguments, and the response file is read
/// back after the process exits.
#[derive(Debug, Clone)]
pub struct CommandBrain {
    command: Vec<String>,
    request_file: PathBuf,
    response_file: PathBuf,
    timeout: Duration,
}

impl CommandBrain {
    pub fn new(
        command: Vec<String>,
        request_file: &Path,
        response_file: &Path,
        timeout: Duration,
    ) -> Self {
        CommandBrain {
            command,
            request_file: request_file.to_path_buf(),
            response_file: response_file.to_path_buf(),
            timeout,
        }
    }

    fn run_command(&self) -> Result<(), BrainError> {
        let program = self
            .command
            .first()
            .ok_or_else(|| BrainError::Unavailable("empty brain command".to_string()))?;
        let mut child = Command::new(program)
            .args(&self.command[1..])
            .arg(&self.request_file)
            .arg(&self.response_file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BrainError::Unavailable(format!("failed to spawn '{}': {}", program, e)))?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        return Ok(());
                    }
                    return Err(BrainError::Unavailable(format!(
                        "brain command exited with {}",
                        status
                    )));
                }
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(BrainError::Unavailable(format!(
                            "brain command timed out after {:?}",
                            self.timeout
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(BrainError::Unavailable(format!(
                        "failed to wait for brain command: {}",
                        e
                    )));
                }
            }
        }
    }
}

impl Brain for CommandBrain {
    fn suggest(&self, request: &BrainRequest) -> Result<BrainReply, BrainError> {
        let json = serde_json::to_string_pretty(request)
            .map_err(|e| BrainError::Unavailable(format!("failed to encode request: {}", e)))?;
        std::fs::write(&self.request_file, json)
            .map_err(|e| BrainError::Unavailable(format!("failed to write request: {}", e)))?;
        // a stale response must never satisfy a new request
        let _ = std::fs::remove_file(&self.response_file);

        self.run_command()?;

        let raw = std::fs::read_to_string(&self.response_file)
            .map_err(|e| BrainError::Unavailable(format!("failed to read response: {}", e)))?;
        parse_reply(&raw)
    }
}
