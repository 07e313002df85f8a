use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Turns announcement text into a playable audio artifact. Failure is
/// non-fatal for a cycle; the track is queued without narration.
pub trait Announcer {
    fn synthesize(&self, text: &str) -> Result<PathBuf, String>;
}

/// Announcer that shells out to an external TTS command. The text is
/// written to a scratch file and the command is invoked with the text path
/// and the desired audio output path as its last two arguments.
#[derive(Debug, Clone)]
pub struct CommandTts {
    command: Vec<String>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl CommandTts {
    pub fn new(command: Vec<String>, work_dir: &Path, timeout: Duration) -> Self {
        CommandTts {
            command,
            work_dir: work_dir.to_path_buf(),
            timeout,
        }
    }
}

impl Announcer for CommandTts {
    fn synthesize(&self, text: &str) -> Result<PathBuf, String> {
        let tag = format!("{:08x}", fastrand::u32(..));
        let text_file = self.work_dir.join(format!("announce_{}.txt", tag));
        let audio_file = self.work_dir.join(format!("announce_{}.mp3", tag));
        std::fs::write(&text_file, text)
            .map_err(|e| format!("Failed to write announcement text: {}", e))?;

        let result = run_with_timeout(&self.command, &text_file, &audio_file, self.timeout);
        let _ = std::fs::remove_file(&text_file);
        result?;

        if !audio_file.exists() {
            return Err("TTS command produced no audio file".to_string());
        }
        Ok(audio_file)
    }
}

fn run_with_timeout(
    command: &[String],
    text_file: &Path,
    audio_file: &Path,
    timeout: Duration,
) -> Result<(), String> {
    let program = command.first().ok_or("empty TTS command")?;
    let mut child = Command::new(program)
        .args(&command[1..])
        .arg(text_file)
        .arg(audio_file)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("Failed to spawn '{}': {}", program, e))?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => return Err(format!("TTS command exited with {}", status)),
            Ok(None) => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("TTS command timed out after {:?}", timeout));
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(format!("Failed to wait for TTS command: {}", e)),
        }
    }
}
