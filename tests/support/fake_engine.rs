use cuesplit::encoder::{EncodeError, EncodingEngine};
use cuesplit::plan::ExtractionJob;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::wave_bytes;

/// What the fake engine does for one track
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Write a fresh WAVE file and succeed
    Write,
    /// Write a partial file, then report failure
    Fail,
    /// Write bytes that are not a RIFF container and succeed
    Garbage,
}

/// Encoding engine that writes files directly instead of running ffmpeg
#[derive(Default)]
pub struct FakeEngine {
    behaviors: HashMap<u32, Behavior>,
    jobs: Mutex<Vec<ExtractionJob>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the behavior for one applied track number
    pub fn with(mut self, track_number: u32, behavior: Behavior) -> Self {
        self.behaviors.insert(track_number, behavior);
        self
    }

    /// Jobs seen so far, in the order they ran
    pub fn jobs(&self) -> Vec<ExtractionJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Highest number of encodes that ran at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl EncodingEngine for FakeEngine {
    fn encode(&self, job: &ExtractionJob) -> Result<(), EncodeError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());

        thread::sleep(Duration::from_millis(10));
        let behavior = self
            .behaviors
            .get(&job.track_number)
            .copied()
            .unwrap_or(Behavior::Write);
        let result = match behavior {
            Behavior::Write => fs::write(&job.output_path, wave_bytes()).map_err(EncodeError::Spawn),
            Behavior::Garbage => {
                fs::write(&job.output_path, b"definitely not riff").map_err(EncodeError::Spawn)
            }
            Behavior::Fail => {
                let partial = wave_bytes();
                let _ = fs::write(&job.output_path, &partial[..12]);
                Err(EncodeError::Spawn(io::Error::other("simulated encoder crash")))
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
