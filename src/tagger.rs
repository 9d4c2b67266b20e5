//! Post-encode tagging for formats the encoder cannot tag inline.
//!
//! A finished WAV file gets two tag blocks: the RIFF `LIST`/`INFO` chunk,
//! rewritten by [`crate::riff`], and an ID3v2 chunk written through a
//! [`TagWriter`] for players that ignore INFO.

use crate::plan::TagSet;
use crate::riff::{self, RiffError};
use encoding_rs::Encoding;
use id3::{Tag, TagLike, Version};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TagWriteError {
    #[error("RIFF INFO rewrite failed: {0}")]
    Riff(#[from] RiffError),
    #[error("ID3 write failed: {0}")]
    Id3(#[from] id3::Error),
}

/// Writes a frame-based tag container into a finished file
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<(), TagWriteError>;
}

/// Writes ID3v2 frames (TIT2, TPE1, TALB, TRCK, TPOS) into the `ID3 ` chunk of a WAV file
#[derive(Debug, Clone, Copy)]
pub struct Id3Tagger {
    version: Version,
}

impl Default for Id3Tagger {
    fn default() -> Self {
        Self {
            version: Version::Id3v24,
        }
    }
}

impl Id3Tagger {
    pub fn new(version: Version) -> Self {
        Self { version }
    }
}

impl TagWriter for Id3Tagger {
    fn write_tags(&self, path: &Path, tags: &TagSet) -> Result<(), TagWriteError> {
        let mut tag = match Tag::read_from_wav_path(path) {
            Ok(tag) => tag,
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => Tag::new(),
            Err(e) => return Err(e.into()),
        };

        if let Some(title) = &tags.title {
            tag.set_title(title.as_str());
        }
        if let Some(artist) = &tags.artist {
            tag.set_artist(artist.as_str());
        }
        if let Some(album) = &tags.album {
            tag.set_album(album.as_str());
        }
        tag.set_track(tags.track_number);
        if let Some(disc) = tags.disc_number {
            tag.set_disc(disc);
        }

        tag.write_to_wav_path(path, self.version)?;
        Ok(())
    }
}

/// Tag one successfully encoded file: INFO chunk first, then the tag writer.
///
/// A file that is not a well-formed WAVE container is left untouched and the
/// tag writer is not called.
pub fn write_deferred_tags(
    path: &Path,
    tags: &TagSet,
    encoding: &'static Encoding,
    tag_writer: &dyn TagWriter,
) -> Result<(), TagWriteError> {
    riff::write_info_tags(path, &tags.info_fields(), encoding)?;
    debug!("Wrote INFO chunk to {}", path.display());
    tag_writer.write_tags(path, tags)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::{read_info, INFO_DISC, INFO_TITLE, INFO_TRACK};
    use encoding_rs::UTF_8;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<TagSet>>,
    }

    impl TagWriter for RecordingWriter {
        fn write_tags(&self, _path: &Path, tags: &TagSet) -> Result<(), TagWriteError> {
            self.calls.lock().unwrap().push(tags.clone());
            Ok(())
        }
    }

    fn wave_bytes() -> Vec<u8> {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(b"WAVEdata");
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]);
        data
    }

    fn tags() -> TagSet {
        TagSet {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            album: Some("Record".to_string()),
            track_number: 3,
            disc_number: Some(1),
        }
    }

    #[test]
    fn test_deferred_tags_write_info_then_hand_off() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("03 - Song.wav");
        fs::write(&path, wave_bytes()).unwrap();

        let writer = RecordingWriter::default();
        write_deferred_tags(&path, &tags(), UTF_8, &writer).unwrap();

        let info = read_info(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(info.first(), Some(&(INFO_TITLE, b"Song".to_vec())));
        assert!(info.contains(&(INFO_TRACK, b"3".to_vec())));
        assert!(info.contains(&(INFO_DISC, b"1".to_vec())));
        assert_eq!(writer.calls.lock().unwrap().as_slice(), &[tags()]);
    }

    #[test]
    fn test_malformed_file_skips_tag_writer() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("broken.wav");
        fs::write(&path, b"not a wave file at all").unwrap();

        let writer = RecordingWriter::default();
        let result = write_deferred_tags(&path, &tags(), UTF_8, &writer);

        assert!(matches!(result, Err(TagWriteError::Riff(RiffError::Format(_)))));
        assert!(writer.calls.lock().unwrap().is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"not a wave file at all");
    }

    #[test]
    fn test_id3_tagger_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("03 - Song.wav");
        fs::write(&path, wave_bytes()).unwrap();

        Id3Tagger::default().write_tags(&path, &tags()).unwrap();

        let tag = Tag::read_from_wav_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Song"));
        assert_eq!(tag.artist(), Some("Band"));
        assert_eq!(tag.album(), Some("Record"));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.disc(), Some(1));
    }
}
