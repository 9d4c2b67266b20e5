//! Cue sheet timestamps
//!
//! Cue sheets address audio in MM:SS:FF triples where FF counts 1/75 second
//! frames (the CD sector rate). Encoder arguments want fractional seconds.

use std::fmt;

/// Frames per second of the cue timing standard (CD audio sectors)
pub const FRAMES_PER_SECOND: u32 = 75;

/// Decimal digits kept by [`to_seconds`] unless a caller asks otherwise
pub const DEFAULT_PRECISION: u32 = 2;

/// Most decimal digits [`to_seconds`] rounds to; an f64 holds no more
pub const MAX_PRECISION: u32 = 15;

/// A frame-based timestamp or duration (minutes, seconds, frames)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Msf {
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
}

impl Msf {
    pub fn new(minutes: u32, seconds: u32, frames: u32) -> Self {
        Self {
            minutes,
            seconds,
            frames,
        }
    }

    /// Normalize a raw frame count into minutes/seconds/frames
    pub fn from_frames(total: u64) -> Self {
        let fps = FRAMES_PER_SECOND as u64;
        let frames = (total % fps) as u32;
        let total_seconds = total / fps;
        Self {
            minutes: (total_seconds / 60) as u32,
            seconds: (total_seconds % 60) as u32,
            frames,
        }
    }

    pub fn total_frames(&self) -> u64 {
        (self.minutes as u64 * 60 + self.seconds as u64) * FRAMES_PER_SECOND as u64
            + self.frames as u64
    }

    /// Distance from `earlier` to `self`, or `None` if `earlier` is later
    pub fn since(&self, earlier: Msf) -> Option<Msf> {
        self.total_frames()
            .checked_sub(earlier.total_frames())
            .map(Msf::from_frames)
    }

    /// Fractional seconds rounded to [`DEFAULT_PRECISION`] digits
    pub fn as_seconds(&self) -> f64 {
        to_seconds(self.minutes, self.seconds, self.frames, DEFAULT_PRECISION)
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.minutes, self.seconds, self.frames)
    }
}

/// Convert a frame-based timestamp to seconds, rounded to `precision` digits
///
/// `precision` is clamped to [`MAX_PRECISION`].
pub fn to_seconds(minutes: u32, seconds: u32, frames: u32, precision: u32) -> f64 {
    let raw = minutes as f64 * 60.0 + seconds as f64 + frames as f64 / FRAMES_PER_SECOND as f64;
    let scale = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (raw * scale).round() / scale
}

/// Render seconds the way the encoder expects them on its command line
pub fn format_seconds(value: f64) -> String {
    format!("{:.2}", value)
}
