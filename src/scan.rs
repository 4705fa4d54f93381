//! Driving the detector over a stream of sampled frames.
//!
//! [`scan_video`] is the usual entry point: it pulls sampled frames from a
//! [`VideoSource`], feeds them to an [`EventDetector`] one at a time, and
//! returns the confirmed battles. [`detect_events`] does the same for any
//! iterator of `(frame_index, frame)` pairs, which is what tests and other
//! frame producers use.
//!
//! Decoding, scoring, and state transitions happen in lock-step for each
//! sampled frame; nothing is buffered.
//!
//! # Example
//!
//! ```no_run
//! use battlecut::{ScanConfig, TemplateSet, VideoSource, scan_video};
//!
//! let config = ScanConfig::new();
//! let templates = TemplateSet::load_dir(".", "start_frame.jpg", &["win", "lose"], config.expected_geometry())?;
//! let mut source = VideoSource::open("recording.mp4", config.expected_geometry())?;
//!
//! let records = scan_video(&mut source, templates, &config, |report| {
//!     println!("[{:05}] {:?}", report.frame_index, report.scores);
//! })?;
//! println!("{} battle(s)", records.len());
//! # Ok::<(), battlecut::BattlecutError>(())
//! ```

use image::GrayImage;

use crate::config::ScanConfig;
use crate::detector::{EventDetector, EventRecord, SampleReport};
use crate::error::BattlecutError;
use crate::progress::{OperationType, ProgressTracker};
use crate::source::VideoSource;
use crate::template::TemplateSet;

/// Scan an opened video for battles.
///
/// `on_sample` is called once per sampled frame, after the detector has
/// processed it.
///
/// # Errors
///
/// Configuration and template errors are reported before the first frame
/// is decoded. Decode errors and [`BattlecutError::GeometryMismatch`] abort
/// the scan.
pub fn scan_video<F>(
    source: &mut VideoSource,
    templates: TemplateSet,
    config: &ScanConfig,
    on_sample: F,
) -> Result<Vec<EventRecord>, BattlecutError>
where
    F: FnMut(&SampleReport),
{
    let detector = EventDetector::new(config, templates, source.frames_per_second())?;
    let total = source.metadata().sample_count(config.frame_step());

    log::info!(
        "Scanning {} ({} frames, {:.2} fps, every {} frame(s))",
        source.path().display(),
        source.metadata().frame_count,
        source.frames_per_second(),
        config.frame_step()
    );

    let frames = source.sampled_frames(config.frame_step())?;
    detect_events(frames, detector, config, Some(total), on_sample)
}

/// Feed already-sampled frames to `detector` and return the battles it
/// confirmed.
///
/// `total` is the expected number of samples, used for progress reporting.
pub fn detect_events<I, F>(
    frames: I,
    mut detector: EventDetector,
    config: &ScanConfig,
    total: Option<u64>,
    mut on_sample: F,
) -> Result<Vec<EventRecord>, BattlecutError>
where
    I: IntoIterator<Item = Result<(u64, GrayImage), BattlecutError>>,
    F: FnMut(&SampleReport),
{
    let mut tracker = ProgressTracker::new(
        config.progress.clone(),
        OperationType::Scanning,
        total,
        config.batch_size,
    );

    for result in frames {
        let (frame_index, frame) = result?;
        let report = detector.observe(frame_index, &frame)?;
        on_sample(&report);
        tracker.advance(Some(report.frame_index), Some(report.timestamp));
    }
    tracker.finish();

    let records = detector.finish();
    log::info!("Scan finished with {} battle(s)", records.len());
    Ok(records)
}
