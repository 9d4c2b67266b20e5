use std::fmt;
use std::str::FromStr;

/// Target container for the split tracks.
///
/// Formats differ in one capability that drives the whole pipeline: whether
/// the encoder can embed tags from command-line arguments. WAV output is a
/// stream copy whose tags must be written after the encode has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Lossless stream copy into a WAVE container
    Wav,
    /// LAME encode at a fixed 320 kbit/s
    Mp3,
    /// FLAC at compression level 8
    Flac,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Wav, OutputFormat::Mp3, OutputFormat::Flac];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Flac => "flac",
        }
    }

    /// Whether `-metadata key=value` arguments reach the output file
    pub fn supports_inline_metadata(&self) -> bool {
        match self {
            OutputFormat::Wav => false,
            OutputFormat::Mp3 | OutputFormat::Flac => true,
        }
    }

    /// Codec and container arguments for the encoder
    pub fn codec_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            OutputFormat::Wav => &["-c", "copy", "-f", "wav"],
            OutputFormat::Mp3 => &["-c:a", "libmp3lame", "-b:a", "320k", "-id3v2_version", "3"],
            OutputFormat::Flac => &["-c:a", "flac", "-compression_level", "8"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            "flac" => Ok(OutputFormat::Flac),
            other => Err(format!(
                "unknown format '{}' (expected one of: wav, mp3, flac)",
                other
            )),
        }
    }
}
