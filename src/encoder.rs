//! Encoder invocation
//!
//! The scheduler only needs to know whether a job's encode succeeded, so the
//! engine is a trait with a single method. [`FfmpegEngine`] is the real
//! implementation; tests swap in an engine that writes files directly.

use crate::plan::ExtractionJob;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to start encoder: {0}")]
    Spawn(std::io::Error),
    #[error("Failed to wait for encoder: {0}")]
    Wait(std::io::Error),
    #[error("Encoder exited with {status}{}", stderr_suffix(.stderr))]
    Exit { status: ExitStatus, stderr: String },
    #[error("Encoder did not finish within {0:?}")]
    TimedOut(Duration),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Runs the encode/copy for one job
pub trait EncodingEngine: Send + Sync {
    /// Produce `job.output_path`; `Ok` only if the output was fully written
    fn encode(&self, job: &ExtractionJob) -> Result<(), EncodeError>;
}

/// Encodes by running an ffmpeg subprocess per job
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill an encode that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, job: &ExtractionJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .args(&job.encoder_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, EncodeError> {
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(EncodeError::Wait);
        };

        let started = Instant::now();
        loop {
            match child.try_wait().map_err(EncodeError::Wait)? {
                Some(status) => return Ok(status),
                None if started.elapsed() > timeout => {
                    warn!("Encoder exceeded {:?}, killing it", timeout);
                    if let Err(e) = child.kill() {
                        warn!("Failed to kill encoder: {}", e);
                    }
                    let _ = child.wait();
                    return Err(EncodeError::TimedOut(timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FFMPEG)
    }
}

impl EncodingEngine for FfmpegEngine {
    fn encode(&self, job: &ExtractionJob) -> Result<(), EncodeError> {
        debug!("Running {} {:?}", self.program.display(), job.encoder_args);
        let mut child = self.command(job).spawn().map_err(EncodeError::Spawn)?;

        // Drain stderr on its own thread so a chatty encoder cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = stderr.read_to_string(&mut buffer);
                buffer
            })
        });

        let status = self.wait(&mut child);
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let status = status?;
        if status.success() {
            Ok(())
        } else {
            Err(EncodeError::Exit { status, stderr })
        }
    }
}
