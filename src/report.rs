use crate::encoder::EncodeError;
use crate::scheduler::JobOutcome;
use std::path::Path;
use tracing::{error, info, warn};

/// Aggregate view of a finished batch
#[derive(Debug)]
pub struct BatchReport {
    outcomes: Vec<JobOutcome>,
}

/// One failed job, as shown to the user
#[derive(Debug)]
pub struct JobFailure<'a> {
    pub track_number: u32,
    pub output_path: &'a Path,
    pub error: &'a EncodeError,
}

impl JobFailure<'_> {
    /// Short name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self.error {
            EncodeError::Spawn(_) => "spawn",
            EncodeError::Wait(_) => "wait",
            EncodeError::Exit { .. } => "exit",
            EncodeError::TimedOut(_) => "timeout",
        }
    }
}

impl BatchReport {
    pub fn new(outcomes: Vec<JobOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    /// True iff every job succeeded. Tag failures do not count.
    pub fn verdict(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::succeeded)
    }

    pub fn failures(&self) -> Vec<JobFailure<'_>> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome.encode.as_ref().err().map(|error| JobFailure {
                    track_number: outcome.job.track_number,
                    output_path: &outcome.job.output_path,
                    error,
                })
            })
            .collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn tag_failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.tag_error.is_some()).count()
    }

    /// Log one line per failure followed by a summary
    pub fn log_summary(&self) {
        for failure in self.failures() {
            error!(
                "Track {:02} failed ({}): {}: {}",
                failure.track_number,
                failure.kind(),
                failure.output_path.display(),
                failure.error
            );
        }
        for outcome in self.outcomes.iter() {
            if let Some(e) = &outcome.tag_error {
                warn!(
                    "Track {:02} written without tags: {}: {}",
                    outcome.job.track_number,
                    outcome.job.output_path.display(),
                    e
                );
            }
        }

        let total = self.outcomes.len();
        let succeeded = self.succeeded_count();
        if self.verdict() {
            info!("Split finished: {}/{} tracks written", succeeded, total);
        } else {
            error!(
                "Split finished with errors: {}/{} tracks written, {} failed",
                succeeded,
                total,
                total - succeeded
            );
        }
    }
}
