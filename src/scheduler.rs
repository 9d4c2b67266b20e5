//! Extraction scheduler
//!
//! Jobs run on a bounded rayon pool. The pool is joined before any deferred
//! tagging starts, so a tag rewrite can never overlap the encoder that is
//! still writing the same file. WAV output additionally runs with a single
//! worker (see [`crate::config::SplitOptions::pool_width`]).

use crate::encoder::{EncodeError, EncodingEngine};
use crate::plan::ExtractionJob;
use crate::tagger::{write_deferred_tags, TagWriteError, TagWriter};
use encoding_rs::Encoding;
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Lifecycle of a job inside the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// The resolved result of one job
#[derive(Debug)]
pub struct JobOutcome {
    pub job: ExtractionJob,
    pub encode: Result<(), EncodeError>,
    /// Set when the deferred tag step ran and failed
    pub tag_error: Option<TagWriteError>,
    /// True once the deferred tag step completed for this file
    pub tagged: bool,
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self.encode {
            Ok(()) => JobState::Succeeded,
            Err(_) => JobState::Failed,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state() == JobState::Succeeded
    }
}

/// Runs extraction jobs and the deferred tag pass
pub struct Scheduler {
    pool_width: usize,
    engine: Arc<dyn EncodingEngine>,
    tag_writer: Arc<dyn TagWriter>,
    encoding: &'static Encoding,
}

impl Scheduler {
    /// `encoding` is the text encoding used for INFO tag values
    pub fn new(
        pool_width: usize,
        engine: Arc<dyn EncodingEngine>,
        tag_writer: Arc<dyn TagWriter>,
        encoding: &'static Encoding,
    ) -> Self {
        Self {
            pool_width: pool_width.max(1),
            engine,
            tag_writer,
            encoding,
        }
    }

    pub fn pool_width(&self) -> usize {
        self.pool_width
    }

    /// Run every job, wait for all of them, then tag the successful ones.
    ///
    /// Outcomes are returned in job order, exactly one per job.
    pub fn run(&self, jobs: Vec<ExtractionJob>) -> Result<Vec<JobOutcome>, SchedulerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.pool_width)
            .thread_name(|i| format!("cuesplit-worker-{}", i))
            .build()?;

        info!(
            "Dispatching {} job(s) on {} worker(s)",
            jobs.len(),
            self.pool_width
        );
        for job in &jobs {
            debug!(
                "Track {:02} {:?}: {}",
                job.track_number,
                JobState::Queued,
                job.output_path.display()
            );
        }

        let mut outcomes: Vec<JobOutcome> =
            pool.install(|| jobs.into_par_iter().map(|job| self.run_job(job)).collect());

        self.run_deferred_tags(&mut outcomes);
        Ok(outcomes)
    }

    fn run_job(&self, job: ExtractionJob) -> JobOutcome {
        debug!(
            "Track {:02} {:?}: {}",
            job.track_number,
            JobState::Running,
            job.output_path.display()
        );

        let encode = self.engine.encode(&job);
        match &encode {
            Ok(()) => info!(
                "Track {:02} {:?}: {}",
                job.track_number,
                JobState::Succeeded,
                job.output_path.display()
            ),
            Err(e) => error!(
                "Track {:02} {:?}: {}: {}",
                job.track_number,
                JobState::Failed,
                job.output_path.display(),
                e
            ),
        }

        JobOutcome {
            job,
            encode,
            tag_error: None,
            tagged: false,
        }
    }

    /// Second pass, run only after every encode has finished
    fn run_deferred_tags(&self, outcomes: &mut [JobOutcome]) {
        for outcome in outcomes.iter_mut() {
            let Some(tags) = outcome.job.tag_payload.as_ref() else {
                continue;
            };
            if !outcome.job.requires_deferred_tag {
                continue;
            }
            if !outcome.succeeded() {
                debug!(
                    "Skipping tags for failed track {:02}",
                    outcome.job.track_number
                );
                continue;
            }

            let path = &outcome.job.output_path;
            match write_deferred_tags(path, tags, self.encoding, self.tag_writer.as_ref()) {
                Ok(()) => {
                    debug!("Tagged {}", path.display());
                    outcome.tagged = true;
                }
                Err(e) => {
                    warn!(
                        "Failed to tag track {:02} ({}): {}",
                        outcome.job.track_number,
                        path.display(),
                        e
                    );
                    outcome.tag_error = Some(e);
                }
            }
        }
    }
}
