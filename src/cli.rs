use std::path::PathBuf;
use std::time::Duration;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, ArgMatches, Command};
use cuesplit::config::{Config, SplitOptions, DEFAULT_CUE_ENCODING};
use cuesplit::format::OutputFormat;

pub const DEFAULT_FORMAT: &str = "flac";

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_jobs(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(jobs) if jobs > 0 => Ok(jobs),
        _ => Err(format!("invalid job count '{value}', expected a positive integer")),
    }
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Split a cue sheet audio image into per-track files")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("cue")
                .value_name("CUE_FILE")
                .help("Path to the cue sheet")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("audio")
                .short('a')
                .long("audio")
                .value_name("AUDIO_FILE")
                .help("Audio image to split, overriding the FILE entries of the cue sheet")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Directory where the tracks will be written")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format: wav, mp3 or flac")
                .default_value(DEFAULT_FORMAT)
                .value_parser(ValueParser::new(parse_format)),
        )
        .arg(
            Arg::new("encoding")
                .short('e')
                .long("encoding")
                .value_name("ENCODING")
                .help("Text encoding of the cue sheet (e.g. utf-8, gbk, shift_jis, or auto)")
                .default_value(DEFAULT_CUE_ENCODING),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Overwrite existing files in the output directory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-metadata")
                .long("no-metadata")
                .help("Do not write any tags and name files after the audio image")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .help("Number of parallel encodes (WAV output always uses one)")
                .value_parser(ValueParser::new(parse_jobs)),
        )
        .arg(
            Arg::new("offset")
                .long("offset")
                .value_name("N")
                .help("Number added to every track number")
                .allow_negative_numbers(true)
                .default_value("0")
                .value_parser(value_parser!(i64)),
        )
        .arg(
            Arg::new("write-disc")
                .long("write-disc")
                .help("Write a disc number tag")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disc-number")
                .long("disc-number")
                .value_name("N")
                .help("Disc number written with --write-disc")
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Kill an encode that runs longer than this")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the planned tracks without encoding anything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
}

/// Turn parsed arguments into split options, filling gaps from `config`
pub fn split_options(matches: &ArgMatches, config: &Config) -> SplitOptions {
    let mut options = SplitOptions::new(
        matches
            .get_one::<PathBuf>("cue")
            .cloned()
            .unwrap_or_default(),
    );

    options.audio_file = matches.get_one::<PathBuf>("audio").cloned();
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        options.output_dir = output.clone();
    }
    if let Some(format) = matches.get_one::<OutputFormat>("format") {
        options.format = *format;
    }
    if let Some(encoding) = matches.get_one::<String>("encoding") {
        options.cue_encoding = encoding.clone();
    }
    options.overwrite = matches.get_flag("overwrite");
    options.no_metadata = matches.get_flag("no-metadata");
    options.jobs = matches
        .get_one::<usize>("jobs")
        .copied()
        .unwrap_or(config.default_jobs);
    options.track_offset = matches.get_one::<i64>("offset").copied().unwrap_or(0);
    if matches.get_flag("write-disc") {
        options.disc_number = matches.get_one::<u32>("disc-number").copied();
    }
    options.encode_timeout = matches
        .get_one::<u64>("timeout")
        .map(|secs| Duration::from_secs(*secs))
        .or(config.encode_timeout);

    options
}

/// Tracing filter: `RUST_LOG` wins, otherwise info, or debug with --verbose
pub fn log_filter(config: &Config, verbose: bool) -> String {
    match &config.log_filter {
        Some(filter) => filter.clone(),
        None if verbose => "debug".to_string(),
        None => "info".to_string(),
    }
}
