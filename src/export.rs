//! Cutting confirmed battles into clip files.
//!
//! The detector never touches the transcoder directly. Clips are produced
//! through the [`ClipExporter`] trait, whose only job is "write the span
//! `[record.start, record.end]` of `source` to `output`". The provided
//! implementation, [`FfmpegExporter`], runs the `ffmpeg` command-line tool:
//!
//! ```text
//! ffmpeg -y -ss <start> -to <end> -i <source> -c:v libx264 -preset veryfast -crf 18 -c:a copy <output>
//! ```
//!
//! [`ClipBatch`] exports a whole record list into an output directory. A
//! failing clip is logged and recorded in the [`ExportSummary`]; the
//! remaining clips are still exported.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use battlecut::{ClipBatch, EventRecord, ExportOptions, FfmpegExporter};
//!
//! let records = vec![EventRecord {
//!     start: Duration::from_secs(12),
//!     end: Duration::from_secs(95),
//!     label: "win".to_string(),
//! }];
//!
//! let exporter = FfmpegExporter::new(ExportOptions::new().with_crf(20));
//! let summary = ClipBatch::new(&exporter, "recording.mp4")
//!     .output_dir("clips")
//!     .run(&records)?;
//! println!("{} clip(s) written", summary.written.len());
//! # Ok::<(), battlecut::BattlecutError>(())
//! ```

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use crate::detector::EventRecord;
use crate::error::BattlecutError;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};

/// Directory clips are written to when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "clips";

/// File name of the clip for the `index`-th record (1-based).
pub fn clip_file_name(index: usize) -> String {
    format!("battle_{index:02}.mp4")
}

/// Writes one clip for one record.
pub trait ClipExporter {
    /// Write the span of `source` covered by `record` to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`BattlecutError::ExportFailure`] when the clip could not be
    /// produced.
    fn export(
        &self,
        source: &Path,
        record: &EventRecord,
        output: &Path,
    ) -> Result<(), BattlecutError>;
}

/// Settings for [`FfmpegExporter`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    program: OsString,
    video_codec: String,
    preset: String,
    crf: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptions {
    /// `ffmpeg` from `PATH`, libx264, preset `veryfast`, CRF 18.
    pub fn new() -> Self {
        Self {
            program: OsString::from("ffmpeg"),
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 18,
        }
    }

    /// Use a specific transcoder binary.
    #[must_use]
    pub fn with_program<S: Into<OsString>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    /// Set the video encoder name passed to `-c:v`.
    #[must_use]
    pub fn with_video_codec<S: Into<String>>(mut self, codec: S) -> Self {
        self.video_codec = codec.into();
        self
    }

    /// Set the encoder preset.
    #[must_use]
    pub fn with_preset<S: Into<String>>(mut self, preset: S) -> Self {
        self.preset = preset.into();
        self
    }

    /// Set the constant rate factor (quality target; lower is better).
    #[must_use]
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }
}

/// Exports clips by running the `ffmpeg` command-line tool.
///
/// Video is re-encoded, audio is copied verbatim, and existing output files
/// are overwritten.
#[derive(Debug, Clone, Default)]
pub struct FfmpegExporter {
    options: ExportOptions,
}

impl FfmpegExporter {
    /// Create an exporter with the given command-line settings.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Arguments passed to the transcoder for one clip.
    pub fn command_arguments(
        &self,
        source: &Path,
        record: &EventRecord,
        output: &Path,
    ) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = vec![
            "-y".into(),
            "-ss".into(),
            format!("{:.2}", record.start.as_secs_f64()).into(),
            "-to".into(),
            format!("{:.2}", record.end.as_secs_f64()).into(),
            "-i".into(),
        ];
        arguments.push(source.as_os_str().to_os_string());
        arguments.extend([
            OsString::from("-c:v"),
            self.options.video_codec.clone().into(),
            "-preset".into(),
            self.options.preset.clone().into(),
            "-crf".into(),
            self.options.crf.to_string().into(),
            "-c:a".into(),
            "copy".into(),
        ]);
        arguments.push(output.as_os_str().to_os_string());
        arguments
    }
}

impl ClipExporter for FfmpegExporter {
    fn export(
        &self,
        source: &Path,
        record: &EventRecord,
        output: &Path,
    ) -> Result<(), BattlecutError> {
        let arguments = self.command_arguments(source, record, output);
        log::debug!("Running {:?} {:?}", self.options.program, arguments);

        let result = Command::new(&self.options.program)
            .args(&arguments)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| BattlecutError::ExportFailure {
                output: output.to_path_buf(),
                reason: format!(
                    "failed to run {}: {error}",
                    self.options.program.to_string_lossy()
                ),
            })?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let last_line = stderr.lines().rev().find(|line| !line.trim().is_empty());
        Err(BattlecutError::ExportFailure {
            output: output.to_path_buf(),
            reason: match last_line {
                Some(line) => format!("{} ({})", result.status, line.trim()),
                None => result.status.to_string(),
            },
        })
    }
}

/// Outcome of exporting a record list.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Clips that were written, in record order.
    pub written: Vec<PathBuf>,
    /// Clips that failed, in record order, with the reason.
    pub failed: Vec<(PathBuf, BattlecutError)>,
}

/// Exports every record of a scan into one output directory.
///
/// Clips are named [`clip_file_name`]`(n)` for the n-th record, counting
/// from 1.
pub struct ClipBatch<'a, E: ?Sized> {
    exporter: &'a E,
    source: PathBuf,
    output_dir: PathBuf,
    progress: Arc<dyn ProgressCallback>,
}

impl<'a, E: ClipExporter + ?Sized> ClipBatch<'a, E> {
    /// Export from `source` with `exporter` into [`DEFAULT_OUTPUT_DIR`].
    pub fn new<P: AsRef<Path>>(exporter: &'a E, source: P) -> Self {
        Self {
            exporter,
            source: source.as_ref().to_path_buf(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Write clips into `directory` instead.
    #[must_use]
    pub fn output_dir<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.output_dir = directory.as_ref().to_path_buf();
        self
    }

    /// Attach a progress callback, fired once per clip.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Output path of every record, in order.
    fn planned_outputs(&self, count: usize) -> Vec<PathBuf> {
        (1..=count)
            .map(|index| self.output_dir.join(clip_file_name(index)))
            .collect()
    }

    /// Create the output directory unless there is nothing to write.
    fn prepare(&self, records: &[EventRecord]) -> Result<bool, BattlecutError> {
        if records.is_empty() {
            log::info!("No battles to export");
            return Ok(false);
        }
        fs::create_dir_all(&self.output_dir)?;
        Ok(true)
    }

    /// Export the clips one after another.
    ///
    /// # Errors
    ///
    /// Only a failure to create the output directory is returned; per-clip
    /// failures end up in [`ExportSummary::failed`].
    pub fn run(self, records: &[EventRecord]) -> Result<ExportSummary, BattlecutError> {
        let mut summary = ExportSummary::default();
        if !self.prepare(records)? {
            return Ok(summary);
        }

        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::Exporting,
            Some(records.len() as u64),
            1,
        );

        for (record, output) in records.iter().zip(self.planned_outputs(records.len())) {
            log::info!("Cutting {}", output.display());
            match self.exporter.export(&self.source, record, &output) {
                Ok(()) => summary.written.push(output),
                Err(error) => {
                    log::warn!("Skipping {}: {error}", output.display());
                    summary.failed.push((output, error));
                }
            }
            tracker.advance(None, Some(record.start));
        }
        tracker.finish();

        Ok(summary)
    }
}

#[cfg(feature = "rayon")]
impl<E: ClipExporter + Sync + ?Sized> ClipBatch<'_, E> {
    /// Export the clips concurrently on the rayon thread pool.
    ///
    /// Every clip reads the same source and writes its own file, so the
    /// exports are independent. The summary is in record order.
    ///
    /// # Errors
    ///
    /// Same as [`run`](ClipBatch::run).
    pub fn run_parallel(self, records: &[EventRecord]) -> Result<ExportSummary, BattlecutError> {
        use ::rayon::iter::{IntoParallelIterator, ParallelIterator};

        let mut summary = ExportSummary::default();
        if !self.prepare(records)? {
            return Ok(summary);
        }

        let jobs: Vec<(&EventRecord, PathBuf)> = records
            .iter()
            .zip(self.planned_outputs(records.len()))
            .collect();

        let results: Vec<(PathBuf, Result<(), BattlecutError>)> = jobs
            .into_par_iter()
            .map(|(record, output)| {
                log::info!("Cutting {}", output.display());
                let result = self.exporter.export(&self.source, record, &output);
                (output, result)
            })
            .collect();

        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::Exporting,
            Some(records.len() as u64),
            1,
        );
        for (output, result) in results {
            match result {
                Ok(()) => summary.written.push(output),
                Err(error) => {
                    log::warn!("Skipping {}: {error}", output.display());
                    summary.failed.push((output, error));
                }
            }
            tracker.advance(None, None);
        }
        tracker.finish();

        Ok(summary)
    }
}
