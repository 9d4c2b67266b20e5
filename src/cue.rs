//! Cue sheet reading
//!
//! Only the commands needed to locate and label tracks are understood:
//! `REM DATE|GENRE`, `PERFORMER`, `TITLE`, `SONGWRITER`, `FILE`, `TRACK` and
//! `INDEX 01`. Everything else (`FLAGS`, `ISRC`, `PREGAP`, `CATALOG`, ...) is
//! skipped line by line.

use crate::time::Msf;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{map, map_res, rest, value},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Encoding label that asks for detection instead of a fixed encoding
pub const AUTO_ENCODING: &str = "auto";

#[derive(Debug, Error)]
pub enum CueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CUE parsing error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
    #[error("CUE sheet contains no tracks")]
    NoTracks,
}

/// Album-level text shared by every track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscMetadata {
    pub performer: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
}

/// One `TRACK` entry of a cue sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSpec {
    pub track_number: u32,
    /// `INDEX 01` position inside `source_file`
    pub start: Option<Msf>,
    /// Distance to the next track in the same file; `None` runs to end of file
    pub length: Option<Msf>,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    /// Filename from the enclosing `FILE` command, relative to the cue sheet
    pub source_file: Option<String>,
}

/// A parsed cue sheet
#[derive(Debug, Clone)]
pub struct CueSheet {
    pub disc: DiscMetadata,
    pub tracks: Vec<TrackSpec>,
    /// Encoding the sheet was decoded with; tag text is written back in it
    pub encoding: &'static Encoding,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Rem(String, String),
    Performer(String),
    Title(String),
    Songwriter(String),
    File(String),
    Track(u32),
    Index(u32, Msf),
    Other,
}

impl CueSheet {
    /// Read and parse a cue sheet, decoding it with `encoding_label`
    pub fn from_file(cue_path: &Path, encoding_label: &str) -> Result<Self, CueError> {
        let bytes = fs::read(cue_path)?;
        let (content, encoding) = decode_text(&bytes, encoding_label)?;
        debug!(
            "Decoded {} as {}",
            cue_path.display(),
            encoding.name()
        );
        let mut sheet = Self::parse(&content)?;
        sheet.encoding = encoding;
        Ok(sheet)
    }

    /// Parse cue sheet text that has already been decoded
    pub fn parse(content: &str) -> Result<Self, CueError> {
        let mut disc = DiscMetadata::default();
        let mut tracks: Vec<TrackSpec> = Vec::new();
        let mut current_file: Option<String> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() {
                continue;
            }

            let command = match parse_command(line) {
                Ok((_, command)) => command,
                Err(e) => {
                    return Err(CueError::Parse {
                        line: idx + 1,
                        message: e.to_string(),
                    })
                }
            };

            match &command {
                Command::File(name) => {
                    current_file = Some(name.clone());
                    continue;
                }
                Command::Track(number) => {
                    tracks.push(TrackSpec {
                        track_number: *number,
                        source_file: current_file.clone(),
                        ..Default::default()
                    });
                    continue;
                }
                Command::Other if is_timing_line(line) => {
                    return Err(CueError::Parse {
                        line: idx + 1,
                        message: format!("malformed timing command '{}'", line),
                    });
                }
                _ => {}
            }

            match (command, tracks.last_mut()) {
                (Command::File(_), _) | (Command::Track(_), _) | (Command::Other, _) => {}
                (Command::Index(1, time), Some(track)) => {
                    track.start = Some(time);
                    // A FILE line inside a track belongs to its INDEX 01
                    track.source_file = current_file.clone();
                }
                (Command::Index(_, _), _) => {}
                (Command::Title(text), Some(track)) => track.title = Some(text),
                (Command::Title(text), None) => disc.title = Some(text),
                (Command::Performer(text), Some(track)) => track.performer = Some(text),
                (Command::Performer(text), None) => disc.performer = Some(text),
                (Command::Songwriter(text), Some(track)) => track.composer = Some(text),
                (Command::Songwriter(text), None) => disc.composer = Some(text),
                (Command::Rem(key, text), track) => match (key.as_str(), track) {
                    ("DATE", None) => disc.date = Some(text),
                    ("GENRE", Some(track)) => track.genre = Some(text),
                    ("GENRE", None) => disc.genre = Some(text),
                    _ => {}
                },
            }
        }

        if tracks.is_empty() {
            return Err(CueError::NoTracks);
        }
        fill_lengths(&mut tracks);

        Ok(CueSheet {
            disc,
            tracks,
            encoding: encoding_rs::UTF_8,
        })
    }
}

fn is_timing_line(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    upper.starts_with("INDEX ") || upper.starts_with("TRACK ")
}

/// Derive each track's length from the next track's start in the same file
fn fill_lengths(tracks: &mut [TrackSpec]) {
    for i in 0..tracks.len().saturating_sub(1) {
        let (current, next) = (&tracks[i], &tracks[i + 1]);
        if current.source_file != next.source_file {
            continue;
        }
        if let (Some(start), Some(next_start)) = (current.start, next.start) {
            let length = next_start.since(start);
            if length.is_none() {
                warn!(
                    "Track {:02} starts after track {:02}; leaving its length open",
                    current.track_number, next.track_number
                );
            }
            tracks[i].length = length;
        }
    }
}

/// Decode raw cue bytes with the named encoding, or detect it for `auto`
pub fn decode_text(bytes: &[u8], label: &str) -> Result<(String, &'static Encoding), CueError> {
    let encoding = if label.eq_ignore_ascii_case(AUTO_ENCODING) {
        let mut detector = EncodingDetector::new();
        detector.feed(bytes, true);
        detector.guess(None, true)
    } else {
        Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| CueError::UnknownEncoding(label.to_string()))?
    };

    // decode() honours a BOM over the requested encoding
    let (decoded, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            "Decoding errors occurred while reading cue sheet with encoding {}",
            used.name()
        );
    }
    Ok((decoded.into_owned(), used))
}

fn parse_command(input: &str) -> IResult<&str, Command> {
    alt((
        parse_rem,
        map(keyword_value("PERFORMER"), Command::Performer),
        map(keyword_value("TITLE"), Command::Title),
        map(keyword_value("SONGWRITER"), Command::Songwriter),
        parse_file,
        parse_track,
        parse_index,
        value(Command::Other, rest),
    ))(input)
}

fn keyword_value(keyword: &'static str) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input| preceded(tuple((tag_no_case(keyword), space1)), parse_value)(input)
}

fn parse_rem(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("REM")(input)?;
    let (input, _) = space1(input)?;
    let (input, key) = take_while1(|c: char| !c.is_whitespace())(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = parse_value(input)?;
    Ok((input, Command::Rem(key.to_ascii_uppercase(), text)))
}

fn parse_file(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("FILE")(input)?;
    let (input, _) = space1(input)?;
    let (input, name) = alt((
        parse_quoted_string,
        map(rest, |s: &str| {
            // Unquoted: drop the trailing file type (WAVE, MP3, BINARY, ...)
            let s = s.trim();
            s.rsplit_once(char::is_whitespace)
                .map(|(name, _)| name.trim_end())
                .unwrap_or(s)
                .to_string()
        }),
    ))(input)?;
    Ok((input, Command::File(name)))
}

fn parse_track(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("TRACK")(input)?;
    let (input, _) = space1(input)?;
    let (input, number) = map_res(digit1, |s: &str| s.parse::<u32>())(input)?;
    Ok((input, Command::Track(number)))
}

fn parse_index(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("INDEX")(input)?;
    let (input, _) = space1(input)?;
    let (input, number) = map_res(digit1, |s: &str| s.parse::<u32>())(input)?;
    let (input, _) = space1(input)?;
    let (input, time) = parse_time(input)?;
    Ok((input, Command::Index(number, time)))
}

/// Parse a value that is either quoted or runs to the end of the line
fn parse_value(input: &str) -> IResult<&str, String> {
    alt((
        parse_quoted_string,
        map(rest, |s: &str| s.trim().to_string()),
    ))(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_until("\""), char('"')),
        |s: &str| s.to_string(),
    )(input)
}

/// Parse MM:SS:FF
fn parse_time(input: &str) -> IResult<&str, Msf> {
    let number = || map_res(digit1, |s: &str| s.parse::<u32>());
    let (input, (minutes, _, seconds, _, frames)) =
        tuple((number(), tag(":"), number(), tag(":"), number()))(input)?;
    Ok((input, Msf::new(minutes, seconds, frames)))
}
