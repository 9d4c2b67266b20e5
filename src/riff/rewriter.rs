//! On-disk INFO rewrite: build the new file next to the old one, then rename
//! it into place so readers only ever see the old or the new bytes.

use super::{rewrite_info, InfoField, RiffError};
use encoding_rs::Encoding;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TEMP_SUFFIX: &str = ".meta.tmp";

/// Sibling path used while the rewritten file is being written
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn remove_temp(temp_path: &Path) {
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(temp_path) {
            warn!(
                "Failed to remove temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }
}

/// Replace the `LIST`/`INFO` chunk of the WAVE file at `path`.
///
/// A malformed file fails with [`RiffError::Format`] before anything is
/// written. On any later failure the temporary file is removed and the
/// original is left untouched.
pub fn write_info_tags(
    path: &Path,
    fields: &[InfoField],
    encoding: &'static Encoding,
) -> Result<(), RiffError> {
    let original = fs::read(path)?;
    let rewritten = rewrite_info(&original, fields, encoding)?;

    let temp_path = temp_path_for(path);
    if let Err(e) = fs::write(&temp_path, &rewritten) {
        remove_temp(&temp_path);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        remove_temp(&temp_path);
        return Err(e.into());
    }

    debug!(
        "Rewrote INFO metadata of {} ({} -> {} bytes)",
        path.display(),
        original.len(),
        rewritten.len()
    );
    Ok(())
}
