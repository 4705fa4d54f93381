//! Locating the recording to scan.
//!
//! A working directory is expected to hold exactly one recording. Anything
//! else is ambiguous and rejected before any decoding happens.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::BattlecutError;

/// Extension searched for when none is configured.
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Find the single file in `directory` whose extension is `extension`
/// (compared case-insensitively, without the dot).
///
/// Subdirectories are not searched.
///
/// # Errors
///
/// - [`BattlecutError::InputCardinality`] if zero or several files match.
/// - [`BattlecutError::IoError`] if the directory cannot be read.
pub fn find_source_video<P: AsRef<Path>>(
    directory: P,
    extension: &str,
) -> Result<PathBuf, BattlecutError> {
    let directory = directory.as_ref();
    let extension = extension.trim_start_matches('.');

    let mut candidates = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let matches = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            candidates.push(path);
        }
    }

    if candidates.len() == 1 {
        let path = candidates.remove(0);
        log::debug!("Found source video: {}", path.display());
        Ok(path)
    } else {
        candidates.sort();
        log::debug!("Source video candidates: {candidates:?}");
        Err(BattlecutError::InputCardinality {
            directory: directory.to_path_buf(),
            extension: extension.to_string(),
            found: candidates.len(),
        })
    }
}
