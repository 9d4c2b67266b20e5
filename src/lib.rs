// Library exports for the cuesplit binary and integration tests

pub mod config;
pub mod cue;
pub mod encoder;
pub mod format;
pub mod plan;
pub mod report;
pub mod riff;
pub mod scheduler;
pub mod split;
pub mod tagger;
pub mod time;

pub use split::{split_cue, SplitError};
