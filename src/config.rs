use crate::format::OutputFormat;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default cue sheet text encoding
pub const DEFAULT_CUE_ENCODING: &str = "utf-8";

/// Default encoder executable
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Process-level configuration
/// In debug builds: also loads a .env file from the working directory
#[derive(Clone, Debug)]
pub struct Config {
    /// Encoder executable (`CUESPLIT_FFMPEG`)
    pub ffmpeg_path: PathBuf,
    /// Worker count used when the user does not pass one (`CUESPLIT_JOBS`)
    pub default_jobs: usize,
    /// Per-job encode timeout (`CUESPLIT_TIMEOUT_SECS`), none by default
    pub encode_timeout: Option<Duration>,
    /// `RUST_LOG`, read after the .env file so a dev setting there applies
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG),
            default_jobs: available_parallelism(),
            encode_timeout: None,
            log_filter: None,
        }
    }
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                debug!("Config: loaded .env file");
            }
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let ffmpeg_path = var("CUESPLIT_FFMPEG")
            .map(PathBuf::from)
            .unwrap_or(defaults.ffmpeg_path);

        let default_jobs = match var("CUESPLIT_JOBS") {
            Some(v) => match v.parse::<usize>() {
                Ok(jobs) if jobs > 0 => jobs,
                _ => {
                    warn!("Config: ignoring invalid CUESPLIT_JOBS value '{}'", v);
                    defaults.default_jobs
                }
            },
            None => defaults.default_jobs,
        };

        let encode_timeout = var("CUESPLIT_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let log_filter = var("RUST_LOG").filter(|v| !v.trim().is_empty());

        debug!(
            "Config: encoder={}, jobs={}, timeout={:?}",
            ffmpeg_path.display(),
            default_jobs,
            encode_timeout
        );

        Self {
            ffmpeg_path,
            default_jobs,
            encode_timeout,
            log_filter,
        }
    }
}

/// Number of CPUs the process may use, at least 1
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Options for one split run
#[derive(Clone, Debug)]
pub struct SplitOptions {
    pub cue_path: PathBuf,
    /// Audio image shared by every track, overriding the cue's FILE lines
    pub audio_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    /// encoding_rs label for the cue text, or `auto`
    pub cue_encoding: String,
    pub overwrite: bool,
    pub no_metadata: bool,
    /// Requested worker count; WAV output always runs with one worker
    pub jobs: usize,
    pub track_offset: i64,
    /// Disc number to write, when disc tagging is requested
    pub disc_number: Option<u32>,
    pub encode_timeout: Option<Duration>,
}

impl SplitOptions {
    /// Options with the documented defaults for everything but the cue path
    pub fn new(cue_path: impl Into<PathBuf>) -> Self {
        Self {
            cue_path: cue_path.into(),
            audio_file: None,
            output_dir: PathBuf::from("."),
            format: OutputFormat::Flac,
            cue_encoding: DEFAULT_CUE_ENCODING.to_string(),
            overwrite: false,
            no_metadata: false,
            jobs: available_parallelism(),
            track_offset: 0,
            disc_number: None,
            encode_timeout: None,
        }
    }

    /// Worker pool width for this run
    pub fn pool_width(&self) -> usize {
        if self.format.supports_inline_metadata() {
            self.jobs.max(1)
        } else {
            1
        }
    }
}
