mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use cuesplit::config::{Config, SplitOptions};
use cuesplit::encoder::FfmpegEngine;
use cuesplit::split::{plan_split, split_cue};
use cuesplit::tagger::Id3Tagger;
use tracing::error;

use crate::cli::{build_cli, log_filter, split_options};

/// Exit status when a planning or parsing error stops the run
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let matches = build_cli().get_matches();

    // Loads .env first so a RUST_LOG set there is honored
    let config = Config::load();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config, matches.get_flag("verbose")))
        .with_writer(std::io::stderr)
        .init();

    let options = split_options(&matches, &config);

    if matches.get_flag("dry-run") {
        return match dry_run(&options) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::from(EXIT_FATAL)
            }
        };
    }

    let engine = FfmpegEngine::new(&config.ffmpeg_path).with_timeout(options.encode_timeout);
    let report = match split_cue(&options, Arc::new(engine), Arc::new(Id3Tagger::default())) {
        Ok(report) => report,
        Err(e) => {
            let e = anyhow::Error::new(e)
                .context(format!("failed to split '{}'", options.cue_path.display()));
            error!("{:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    report.log_summary();
    if report.verdict() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn dry_run(options: &SplitOptions) -> anyhow::Result<()> {
    let plan = plan_split(options)
        .with_context(|| format!("failed to plan '{}'", options.cue_path.display()))?;

    println!(
        "Dry run: would write {} track(s) to {} with {} worker(s):",
        plan.jobs.len(),
        options.output_dir.display(),
        options.pool_width()
    );
    for job in &plan.jobs {
        println!("  {}", job.output_path.display());
        println!("    ffmpeg {}", job.encoder_args.join(" "));
        if job.requires_deferred_tag {
            println!("    tags written after encode");
        }
    }
    Ok(())
}
