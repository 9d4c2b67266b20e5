//! Track plan: one fully resolved extraction job per cue track.
//!
//! Everything the scheduler needs is decided here (input file, time range,
//! output path, encoder arguments and the tags to write afterwards), so a bad
//! cue sheet fails the whole batch before any encoder is started.

use crate::config::SplitOptions;
use crate::cue::{CueSheet, DiscMetadata, TrackSpec};
use crate::format::OutputFormat;
use crate::riff::{InfoField, INFO_ALBUM, INFO_ARTIST, INFO_DISC, INFO_TITLE, INFO_TRACK};
use crate::time::format_seconds;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Title used in output filenames when the cue sheet has none
pub const UNKNOWN_TITLE: &str = "Unknown";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Cannot find start time for Track {track:02} in cue file")]
    MissingTiming { track: u32 },
    #[error("Cannot find audio file for Track {track:02}")]
    MissingSource { track: u32 },
    #[error("Input audio file {} for Track {track:02} does not exist", path.display())]
    SourceNotFound { track: u32, path: PathBuf },
    #[error("Track offset {offset} cannot be applied to Track {track:02}")]
    InvalidOffset { track: u32, offset: i64 },
    #[error("Track {track:02} would overwrite {} written by another track", path.display())]
    DuplicateOutput { track: u32, path: PathBuf },
    #[error("Path {} for Track {track:02} is not valid UTF-8", path.display())]
    NonUtf8Path { track: u32, path: PathBuf },
}

/// Final tag values for a file whose tags are written after encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Applied (offset-adjusted) track number
    pub track_number: u32,
    pub disc_number: Option<u32>,
}

impl TagSet {
    /// Non-empty fields in INFO sub-chunk order
    pub fn info_fields(&self) -> Vec<InfoField> {
        let mut fields = Vec::new();
        let text_fields = [
            (INFO_TITLE, &self.title),
            (INFO_ARTIST, &self.artist),
            (INFO_ALBUM, &self.album),
        ];
        for (id, text) in text_fields {
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                fields.push(InfoField::new(id, text));
            }
        }
        fields.push(InfoField::new(INFO_TRACK, self.track_number.to_string()));
        if let Some(disc) = self.disc_number {
            fields.push(InfoField::new(INFO_DISC, disc.to_string()));
        }
        fields
    }
}

/// Everything needed to run the encoder for one track
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    /// Applied track number, used for naming and logging
    pub track_number: u32,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub start_seconds: f64,
    pub duration_seconds: Option<f64>,
    /// Encoder arguments in order, ending with the output path
    pub encoder_args: Vec<String>,
    pub requires_deferred_tag: bool,
    pub tag_payload: Option<TagSet>,
}

/// Apply the user's track-number offset.
///
/// An offset that would take the number below 1, or past `u32::MAX`, is a
/// planning error rather than a silent fallback, since a fallback can give two
/// tracks the same number.
pub fn applied_track_number(raw: u32, offset: i64) -> Result<u32, PlanError> {
    i64::from(raw)
        .checked_add(offset)
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(PlanError::InvalidOffset { track: raw, offset })
}

/// Encoder arguments are strings, so a path must be valid UTF-8 to reach the
/// encoder unchanged
fn path_arg(path: &Path, track: u32) -> Result<String, PlanError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| PlanError::NonUtf8Path {
            track,
            path: path.to_path_buf(),
        })
}

/// Replace characters that cannot appear in a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn push_metadata(args: &mut Vec<String>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        args.push("-metadata".to_string());
        args.push(format!("{}={}", key, value));
    }
}

/// Builds [`ExtractionJob`]s from a parsed cue sheet and the user's options
pub struct TrackPlanBuilder<'a> {
    options: &'a SplitOptions,
    disc: &'a DiscMetadata,
    cue_dir: PathBuf,
}

impl<'a> TrackPlanBuilder<'a> {
    pub fn new(sheet: &'a CueSheet, options: &'a SplitOptions) -> Self {
        let cue_dir = options
            .cue_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            options,
            disc: &sheet.disc,
            cue_dir,
        }
    }

    fn format(&self) -> OutputFormat {
        self.options.format
    }

    fn inline_metadata(&self) -> bool {
        !self.options.no_metadata && self.format().supports_inline_metadata()
    }

    fn deferred_metadata(&self) -> bool {
        !self.options.no_metadata && !self.format().supports_inline_metadata()
    }

    /// Build one job per track, failing on the first track that cannot be
    /// located or that would share an output path with an earlier track
    pub fn build(&self, tracks: &[TrackSpec]) -> Result<Vec<ExtractionJob>, PlanError> {
        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(tracks.len());
        for track in tracks {
            let job = self.build_job(track)?;
            if !seen.insert(job.output_path.clone()) {
                return Err(PlanError::DuplicateOutput {
                    track: track.track_number,
                    path: job.output_path,
                });
            }
            jobs.push(job);
        }
        Ok(jobs)
    }

    fn resolve_source(&self, track: &TrackSpec) -> Result<PathBuf, PlanError> {
        let path = match (&self.options.audio_file, &track.source_file) {
            (Some(shared), _) => shared.clone(),
            (None, Some(name)) => self.cue_dir.join(name),
            (None, None) => {
                return Err(PlanError::MissingSource {
                    track: track.track_number,
                })
            }
        };
        if !path.exists() {
            return Err(PlanError::SourceNotFound {
                track: track.track_number,
                path,
            });
        }
        Ok(path)
    }

    fn output_path(&self, input_path: &Path, track: &TrackSpec, applied: u32) -> PathBuf {
        let ext = self.format().extension();
        let file_name = if self.options.no_metadata {
            let stem = input_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{}_{:02}.{}", stem, applied, ext)
        } else {
            let title = track.title.as_deref().unwrap_or(UNKNOWN_TITLE);
            format!("{:02} - {}.{}", applied, sanitize_filename(title), ext)
        };
        self.options.output_dir.join(file_name)
    }

    fn album_metadata_args(&self, args: &mut Vec<String>) {
        let disc = self.disc;
        push_metadata(args, "album_artist", disc.performer.as_deref());
        push_metadata(args, "album", disc.title.as_deref());
        push_metadata(args, "date", disc.date.as_deref());
    }

    fn track_metadata_args(&self, args: &mut Vec<String>, track: &TrackSpec, applied: u32) {
        let disc = self.disc;
        push_metadata(args, "title", track.title.as_deref());
        push_metadata(
            args,
            "artist",
            track.performer.as_deref().or(disc.performer.as_deref()),
        );
        push_metadata(
            args,
            "composer",
            track.composer.as_deref().or(disc.composer.as_deref()),
        );
        push_metadata(args, "track", Some(&applied.to_string()));
        push_metadata(
            args,
            "genre",
            track.genre.as_deref().or(disc.genre.as_deref()),
        );
        if let Some(disc_number) = self.options.disc_number {
            push_metadata(args, "disc", Some(&disc_number.to_string()));
        }
    }

    fn build_job(&self, track: &TrackSpec) -> Result<ExtractionJob, PlanError> {
        let start = track.start.ok_or(PlanError::MissingTiming {
            track: track.track_number,
        })?;
        let input_path = self.resolve_source(track)?;
        let applied = applied_track_number(track.track_number, self.options.track_offset)?;
        let output_path = self.output_path(&input_path, track, applied);
        let input_arg = path_arg(&input_path, track.track_number)?;
        let output_arg = path_arg(&output_path, track.track_number)?;

        let start_seconds = start.as_seconds();
        let duration_seconds = track.length.map(|length| length.as_seconds());

        let mut args = vec![
            "-i".to_string(),
            input_arg,
            if self.options.overwrite { "-y" } else { "-n" }.to_string(),
        ];
        args.extend(self.format().codec_args());
        if self.inline_metadata() {
            self.album_metadata_args(&mut args);
        }
        args.push("-ss".to_string());
        args.push(format_seconds(start_seconds));
        if let Some(duration) = duration_seconds {
            args.push("-t".to_string());
            args.push(format_seconds(duration));
        }
        if self.inline_metadata() {
            self.track_metadata_args(&mut args, track, applied);
        }
        args.push(output_arg);

        // WAV tags carry the album performer; per-track performers only reach inline tags
        let tag_payload = self.deferred_metadata().then(|| TagSet {
            title: track.title.clone(),
            artist: self.disc.performer.clone(),
            album: self.disc.title.clone(),
            track_number: applied,
            disc_number: self.options.disc_number,
        });

        debug!(
            "Planned track {:02}: {} [{}s, {:?}s] -> {}",
            applied,
            input_path.display(),
            format_seconds(start_seconds),
            duration_seconds,
            output_path.display()
        );

        Ok(ExtractionJob {
            track_number: applied,
            input_path,
            output_path,
            start_seconds,
            duration_seconds,
            encoder_args: args,
            requires_deferred_tag: tag_payload.is_some(),
            tag_payload,
        })
    }
}

/// Build the job list for every track of `sheet`
pub fn build_plan(sheet: &CueSheet, options: &SplitOptions) -> Result<Vec<ExtractionJob>, PlanError> {
    TrackPlanBuilder::new(sheet, options).build(&sheet.tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Msf;
    use std::fs;
    use tempfile::TempDir;

    fn sheet() -> CueSheet {
        CueSheet::parse(
            r#"PERFORMER "Artist"
TITLE "Album"
REM DATE 2001
FILE "image.wav" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Two/Three"
    PERFORMER "Guest"
    INDEX 01 02:30:37
  TRACK 03 AUDIO
    INDEX 01 05:00:00
"#,
        )
        .unwrap()
    }

    fn setup(format: OutputFormat) -> (TempDir, SplitOptions) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("image.wav"), b"RIFF").unwrap();
        let mut options = SplitOptions::new(temp_dir.path().join("album.cue"));
        options.output_dir = temp_dir.path().join("out");
        options.format = format;
        (temp_dir, options)
    }

    fn metadata_values(args: &[String]) -> Vec<&str> {
        args.windows(2)
            .filter(|w| w[0] == "-metadata")
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_applied_track_number() {
        assert_eq!(applied_track_number(3, 0).unwrap(), 3);
        assert_eq!(applied_track_number(3, 1).unwrap(), 4);
        assert_eq!(applied_track_number(3, -2).unwrap(), 1);
        assert!(matches!(
            applied_track_number(3, -3),
            Err(PlanError::InvalidOffset { track: 3, offset: -3 })
        ));
        assert!(applied_track_number(u32::MAX, 1).is_err());
        assert!(applied_track_number(1, i64::MAX).is_err());
    }

    #[test]
    fn test_offset_below_one_fails_the_plan() {
        let (_temp_dir, mut options) = setup(OutputFormat::Flac);
        options.no_metadata = true;
        options.track_offset = -2;

        let result = build_plan(&sheet(), &options);
        assert!(matches!(
            result,
            Err(PlanError::InvalidOffset { track: 1, offset: -2 })
        ));
    }

    #[test]
    fn test_duplicate_output_paths_are_rejected() {
        let (_temp_dir, mut options) = setup(OutputFormat::Flac);
        options.no_metadata = true;
        let sheet = CueSheet::parse(
            "FILE \"image.wav\" WAVE\nTRACK 01 AUDIO\nINDEX 01 00:00:00\nTRACK 01 AUDIO\nINDEX 01 01:00:00\n",
        )
        .unwrap();

        let result = build_plan(&sheet, &options);
        match result {
            Err(PlanError::DuplicateOutput { track, path }) => {
                assert_eq!(track, 1);
                assert_eq!(path, options.output_dir.join("image_01.flac"));
            }
            other => panic!("expected DuplicateOutput, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_output_dir_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (temp_dir, mut options) = setup(OutputFormat::Flac);
        options.output_dir = temp_dir.path().join(OsStr::from_bytes(b"out\xff"));

        let result = build_plan(&sheet(), &options);
        assert!(matches!(result, Err(PlanError::NonUtf8Path { track: 1, .. })));
    }

    #[test]
    fn test_wav_plan_defers_tags() {
        let (temp_dir, options) = setup(OutputFormat::Wav);
        let jobs = build_plan(&sheet(), &options).unwrap();

        assert_eq!(jobs.len(), 3);
        let first = &jobs[0];
        assert_eq!(first.input_path, temp_dir.path().join("image.wav"));
        assert_eq!(first.output_path, options.output_dir.join("01 - One.wav"));
        assert!(first.requires_deferred_tag);
        assert_eq!(
            first.tag_payload,
            Some(TagSet {
                title: Some("One".to_string()),
                artist: Some("Artist".to_string()),
                album: Some("Album".to_string()),
                track_number: 1,
                disc_number: None,
            })
        );
        assert!(metadata_values(&first.encoder_args).is_empty());
        assert_eq!(first.encoder_args[0], "-i");
        assert_eq!(first.encoder_args[2..7], ["-n", "-c", "copy", "-f", "wav"]);

        // Track 02 has its own PERFORMER; the WAV tags still use the album's
        let second = jobs[1].tag_payload.as_ref().unwrap();
        assert_eq!(second.artist.as_deref(), Some("Artist"));
    }

    #[test]
    fn test_time_range_arguments() {
        let (_temp_dir, options) = setup(OutputFormat::Flac);
        let jobs = build_plan(&sheet(), &options).unwrap();

        assert_eq!(jobs[1].start_seconds, 150.49);
        assert_eq!(jobs[1].duration_seconds, Some(Msf::new(2, 29, 38).as_seconds()));
        let args = &jobs[1].encoder_args;
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "150.49");
        assert_eq!(args[ss + 2], "-t");
        assert_eq!(args[ss + 3], "149.51");

        // Last track runs to the end of the image
        assert!(!jobs[2].encoder_args.contains(&"-t".to_string()));
        assert_eq!(jobs[2].duration_seconds, None);
    }

    #[test]
    fn test_inline_metadata_for_flac() {
        let (_temp_dir, mut options) = setup(OutputFormat::Flac);
        options.disc_number = Some(2);
        let jobs = build_plan(&sheet(), &options).unwrap();

        let second = &jobs[1];
        assert!(!second.requires_deferred_tag);
        assert!(second.tag_payload.is_none());
        assert_eq!(
            metadata_values(&second.encoder_args),
            vec![
                "album_artist=Artist",
                "album=Album",
                "date=2001",
                "title=Two/Three",
                "artist=Guest",
                "track=2",
                "disc=2",
            ]
        );
        assert_eq!(
            second.output_path,
            options.output_dir.join("02 - Two_Three.flac")
        );
        assert_eq!(second.encoder_args.last().unwrap(), &second.output_path.to_string_lossy());
    }

    #[test]
    fn test_no_metadata_naming() {
        let (_temp_dir, mut options) = setup(OutputFormat::Wav);
        options.no_metadata = true;
        options.overwrite = true;
        let jobs = build_plan(&sheet(), &options).unwrap();

        assert_eq!(jobs[2].output_path, options.output_dir.join("image_03.wav"));
        assert!(jobs.iter().all(|j| !j.requires_deferred_tag));
        assert!(jobs[0].encoder_args.contains(&"-y".to_string()));
    }

    #[test]
    fn test_untitled_track_is_unknown() {
        let (_temp_dir, options) = setup(OutputFormat::Mp3);
        let jobs = build_plan(&sheet(), &options).unwrap();
        assert_eq!(jobs[2].output_path, options.output_dir.join("03 - Unknown.mp3"));
    }

    #[test]
    fn test_offset_applies_to_names_and_tags() {
        let (_temp_dir, mut options) = setup(OutputFormat::Wav);
        options.track_offset = 1;
        let jobs = build_plan(&sheet(), &options).unwrap();

        let numbers: Vec<u32> = jobs.iter().map(|j| j.track_number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        let tagged: Vec<u32> = jobs
            .iter()
            .map(|j| j.tag_payload.as_ref().unwrap().track_number)
            .collect();
        assert_eq!(tagged, vec![2, 3, 4]);
        assert_eq!(jobs[0].output_path, options.output_dir.join("02 - One.wav"));
    }

    #[test]
    fn test_shared_audio_file_takes_precedence() {
        let (temp_dir, mut options) = setup(OutputFormat::Flac);
        let shared = temp_dir.path().join("other.flac");
        fs::write(&shared, b"fLaC").unwrap();
        options.audio_file = Some(shared.clone());

        let jobs = build_plan(&sheet(), &options).unwrap();
        assert!(jobs.iter().all(|j| j.input_path == shared));
    }

    #[test]
    fn test_missing_source_file() {
        let (temp_dir, options) = setup(OutputFormat::Flac);
        fs::remove_file(temp_dir.path().join("image.wav")).unwrap();
        let result = build_plan(&sheet(), &options);
        assert!(matches!(result, Err(PlanError::SourceNotFound { track: 1, .. })));
    }

    #[test]
    fn test_missing_timing() {
        let (_temp_dir, options) = setup(OutputFormat::Flac);
        let sheet = CueSheet::parse("FILE image.wav WAVE\nTRACK 01 AUDIO\n").unwrap();
        let result = build_plan(&sheet, &options);
        assert!(matches!(result, Err(PlanError::MissingTiming { track: 1 })));
    }

    #[test]
    fn test_track_without_file() {
        let (_temp_dir, options) = setup(OutputFormat::Flac);
        let sheet = CueSheet::parse("TRACK 01 AUDIO\nINDEX 01 00:00:00\n").unwrap();
        let result = build_plan(&sheet, &options);
        assert!(matches!(result, Err(PlanError::MissingSource { track: 1 })));
    }

    #[test]
    fn test_tag_set_info_fields() {
        let tags = TagSet {
            title: Some("T".to_string()),
            artist: None,
            album: Some(String::new()),
            track_number: 7,
            disc_number: Some(1),
        };
        let ids: Vec<[u8; 4]> = tags.info_fields().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![INFO_TITLE, INFO_TRACK, INFO_DISC]);
    }
}
