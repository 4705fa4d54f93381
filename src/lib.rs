//! # battlecut
//!
//! Find battles in gameplay recordings and cut them into clips.
//!
//! A battle starts at a recognizable start screen and ends at one of several
//! recognizable end screens (victory, defeat, leaving to the lobby, ...).
//! `battlecut` samples every Nth frame of a recording, compares it against
//! grayscale reference templates, confirms battle boundaries with a small
//! state machine, and hands the resulting time ranges to an external
//! transcoder. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use battlecut::{
//!     ClipBatch, DEFAULT_END_LABELS, FfmpegExporter, ScanConfig, TemplateSet, VideoSource,
//!     find_source_video, scan_video,
//! };
//!
//! let config = ScanConfig::new().with_frame_step(60);
//! let video = find_source_video(".", "mp4")?;
//! let templates = TemplateSet::load_dir(
//!     ".",
//!     "start_frame.jpg",
//!     &DEFAULT_END_LABELS,
//!     config.expected_geometry(),
//! )?;
//!
//! let mut source = VideoSource::open(&video, config.expected_geometry())?;
//! let records = scan_video(&mut source, templates, &config, |_| {})?;
//! drop(source);
//!
//! let summary = ClipBatch::new(&FfmpegExporter::default(), &video)
//!     .output_dir("clips")
//!     .run(&records)?;
//! println!("{} clip(s) written", summary.written.len());
//! # Ok::<(), battlecut::BattlecutError>(())
//! ```
//!
//! ## How detection works
//!
//! - **Similarity**: the fraction of pixels whose intensity differs from the
//!   template by less than a tolerance ([`similarity`]).
//! - **Start**: the first sample of a run of start-screen matches is the
//!   candidate; it is confirmed by the first sample after the run.
//! - **End**: once a battle is open, end templates are tried in priority
//!   order and the first match closes it.
//! - Anything still pending when the recording ends is dropped.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`ClipBatch::run_parallel`] exports clips concurrently |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build the crate, and
//! the `ffmpeg` binary must be on `PATH` to export clips.

pub mod config;
pub mod detector;
pub mod discovery;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod frame;
pub mod metadata;
pub mod progress;
pub mod scan;
mod similarity;
pub mod source;
pub mod template;

pub use config::ScanConfig;
pub use detector::{
    Boundary, DetectionState, EventDetector, EventRecord, SampleReport, TemplateScore,
};
pub use discovery::{DEFAULT_VIDEO_EXTENSION, find_source_video};
pub use error::BattlecutError;
pub use export::{
    ClipBatch, ClipExporter, ExportOptions, ExportSummary, FfmpegExporter, clip_file_name,
};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::{Geometry, Orientation, frame_timestamp, luma_bt601, rgb_to_gray};
pub use metadata::VideoMetadata;
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use scan::{detect_events, scan_video};
pub use similarity::similarity;
pub use source::{SampledFrames, VideoSource};
pub use template::{DEFAULT_END_LABELS, DEFAULT_START_TEMPLATE, EndTemplate, TemplateSet};
