//! Error types for the `battlecut` crate.
//!
//! This module defines [`BattlecutError`], the unified error type returned by
//! all fallible operations in the crate. Start-up failures (missing inputs,
//! unreadable templates, unexpected geometry) are fatal; only
//! [`BattlecutError::ExportFailure`] is meant to be recovered from, one clip
//! at a time.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

use crate::frame::Geometry;

/// The unified error type for all `battlecut` operations.
///
/// Every public method that can fail returns `Result<T, BattlecutError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BattlecutError {
    /// The working directory does not contain exactly one source video.
    #[error("Expected exactly one .{extension} file in {directory}, found {found}")]
    InputCardinality {
        /// Directory that was searched.
        directory: PathBuf,
        /// Extension that was looked for (without the dot).
        extension: String,
        /// Number of matching files.
        found: usize,
    },

    /// A reference image is missing or could not be decoded.
    #[error("Failed to load template {path}: {reason}")]
    TemplateLoad {
        /// Path of the template image.
        path: PathBuf,
        /// Underlying reason the load failed.
        reason: String,
    },

    /// Two rasters (or a stream and the expected geometry) disagree in size.
    #[error("Geometry mismatch: expected {expected}, got {actual}")]
    GeometryMismatch {
        /// The geometry everything is supposed to have.
        expected: Geometry,
        /// The geometry that was found instead.
        actual: Geometry,
    },

    /// The external transcoder failed for one clip.
    #[error("Failed to export {output}: {reason}")]
    ExportFailure {
        /// Clip path that was being written.
        output: PathBuf,
        /// Exit status or spawn error.
        reason: String,
    },

    /// A configuration value is out of its accepted range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded or converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for BattlecutError {
    fn from(error: FfmpegError) -> Self {
        BattlecutError::FfmpegError(error.to_string())
    }
}
