//! Top-level split run: read the cue sheet, plan every track, dispatch the
//! jobs and report.

use crate::config::SplitOptions;
use crate::cue::{CueError, CueSheet};
use crate::encoder::EncodingEngine;
use crate::plan::{build_plan, ExtractionJob, PlanError};
use crate::report::BatchReport;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::tagger::TagWriter;
use std::fs;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors that stop a run before any job is dispatched
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("Failed to read cue sheet: {0}")]
    Cue(#[from] CueError),
    #[error("Failed to plan tracks: {0}")]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Pool(#[from] SchedulerError),
    #[error("Failed to create output directory: {0}")]
    Io(#[from] std::io::Error),
}

/// A cue sheet together with the jobs planned for it
#[derive(Debug)]
pub struct SplitPlan {
    pub sheet: CueSheet,
    pub jobs: Vec<ExtractionJob>,
}

/// Parse the cue sheet and build every job without touching the output directory
pub fn plan_split(options: &SplitOptions) -> Result<SplitPlan, SplitError> {
    let sheet = CueSheet::from_file(&options.cue_path, &options.cue_encoding)?;
    info!(
        "Loaded {} track(s) from {}",
        sheet.tracks.len(),
        options.cue_path.display()
    );
    let jobs = build_plan(&sheet, options)?;
    Ok(SplitPlan { sheet, jobs })
}

/// Split the image described by `options.cue_path` into per-track files.
///
/// Planning errors are returned before anything is written. Once jobs are
/// dispatched, failures are recorded in the returned [`BatchReport`].
pub fn split_cue(
    options: &SplitOptions,
    engine: Arc<dyn EncodingEngine>,
    tag_writer: Arc<dyn TagWriter>,
) -> Result<BatchReport, SplitError> {
    let SplitPlan { sheet, jobs } = plan_split(options)?;

    fs::create_dir_all(&options.output_dir)?;

    let scheduler = Scheduler::new(options.pool_width(), engine, tag_writer, sheet.encoding);
    let outcomes = scheduler.run(jobs)?;
    Ok(BatchReport::new(outcomes))
}
