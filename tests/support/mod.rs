pub mod fake_engine;

pub use fake_engine::FakeEngine;

use std::fs;
use std::path::{Path, PathBuf};

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A tiny but well-formed WAVE file: `fmt ` chunk plus eight bytes of silence
pub fn wave_bytes() -> Vec<u8> {
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes()); // PCM
    fmt.extend_from_slice(&2u16.to_le_bytes()); // channels
    fmt.extend_from_slice(&44_100u32.to_le_bytes());
    fmt.extend_from_slice(&(44_100u32 * 4).to_le_bytes());
    fmt.extend_from_slice(&4u16.to_le_bytes()); // block align
    fmt.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    let mut body = b"WAVE".to_vec();
    body.extend_from_slice(b"fmt ");
    body.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
    body.extend_from_slice(&fmt);
    body.extend_from_slice(b"data");
    body.extend_from_slice(&8u32.to_le_bytes());
    body.extend_from_slice(&[0u8; 8]);

    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend_from_slice(&body);
    data
}

/// Write an album directory with `image.wav` and a cue sheet, returning the cue path
pub fn write_album(dir: &Path, cue: &[u8]) -> PathBuf {
    fs::write(dir.join("image.wav"), wave_bytes()).expect("Failed to write audio image");
    let cue_path = dir.join("album.cue");
    fs::write(&cue_path, cue).expect("Failed to write cue sheet");
    cue_path
}

pub const TWO_TRACK_CUE: &str = r#"REM DATE 1999
PERFORMER "Artist"
TITLE "Album"
FILE "image.wav" WAVE
  TRACK 01 AUDIO
    TITLE "T1"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "T2"
    INDEX 01 03:30:00
"#;

/// Number of `LIST` chunk headers in a RIFF file
pub fn count_list_chunks(data: &[u8]) -> usize {
    data.windows(8)
        .filter(|w| &w[..4] == b"LIST")
        .count()
}
