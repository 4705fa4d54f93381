//! Scan driver tests over synthetic frame streams.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use battlecut::{
    BattlecutError, EndTemplate, EventDetector, EventRecord, Geometry, OperationType,
    ProgressCallback, ProgressInfo, ScanConfig, TemplateSet, detect_events,
};
use image::{GrayImage, Luma};

const SIZE: u32 = 8;

fn solid(value: u8) -> GrayImage {
    GrayImage::from_pixel(SIZE, SIZE, Luma([value]))
}

fn config() -> ScanConfig {
    ScanConfig::new()
        .with_frame_step(60)
        .with_expected_geometry(Geometry::new(SIZE, SIZE))
}

fn detector(config: &ScanConfig) -> EventDetector {
    let templates = TemplateSet::new(
        solid(0),
        vec![EndTemplate {
            label: "win".to_string(),
            image: solid(200),
        }],
    )
    .expect("Failed to build templates");
    EventDetector::new(config, templates, 60.0).expect("Failed to build detector")
}

/// Pairs every `values[n]` with decoded frame index `n * 60`.
fn sampled(values: &[u8]) -> Vec<Result<(u64, GrayImage), BattlecutError>> {
    values
        .iter()
        .enumerate()
        .map(|(position, &value)| Ok((position as u64 * 60, solid(value))))
        .collect()
}

#[derive(Default)]
struct Recorder(Mutex<Vec<ProgressInfo>>);

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0.lock().unwrap().push(info.clone());
    }
}

#[test]
fn battles_are_timed_from_sampled_indices() {
    let config = config();
    let frames = sampled(&[50, 0, 0, 50, 50, 200, 50]);

    let records = detect_events(frames, detector(&config), &config, None, |_| {})
        .expect("Scan failed");

    assert_eq!(
        records,
        vec![EventRecord {
            start: Duration::from_secs(1),
            end: Duration::from_secs(5),
            label: "win".to_string(),
        }]
    );
}

#[test]
fn every_sample_is_reported() {
    let config = config();
    let mut seen = Vec::new();

    detect_events(
        sampled(&[50, 0, 50, 200]),
        detector(&config),
        &config,
        None,
        |report| seen.push((report.frame_index, report.boundary.is_some())),
    )
    .unwrap();

    assert_eq!(seen, vec![(0, false), (60, false), (120, true), (180, true)]);
}

#[test]
fn progress_counts_samples() {
    let recorder = Arc::new(Recorder::default());
    let config = config()
        .with_progress(recorder.clone())
        .with_batch_size(2);

    detect_events(sampled(&[50; 5]), detector(&config), &config, Some(5), |_| {}).unwrap();

    let reports = recorder.0.lock().unwrap();
    let counts: Vec<u64> = reports.iter().map(|info| info.current).collect();
    assert_eq!(counts, vec![2, 4, 5]);
    assert!(
        reports
            .iter()
            .all(|info| info.operation == OperationType::Scanning)
    );
    assert_eq!(reports[0].current_frame, Some(60));
    assert_eq!(reports.last().and_then(|info| info.percentage), Some(100.0));
}

#[test]
fn frame_errors_abort_the_scan() {
    let config = config();
    let mut frames = sampled(&[50, 0]);
    frames.push(Err(BattlecutError::VideoDecodeError(
        "corrupt packet".to_string(),
    )));
    frames.extend(sampled(&[50, 200]));

    let result = detect_events(frames, detector(&config), &config, None, |_| {});
    assert!(matches!(result, Err(BattlecutError::VideoDecodeError(_))));
}

#[test]
fn wrong_sized_frame_aborts_before_reporting() {
    let config = config();
    let frames: Vec<Result<(u64, GrayImage), BattlecutError>> =
        vec![Ok((0, GrayImage::new(SIZE * 2, SIZE)))];
    let mut calls = 0;

    let result = detect_events(frames, detector(&config), &config, None, |_| calls += 1);

    assert!(matches!(
        result,
        Err(BattlecutError::GeometryMismatch { .. })
    ));
    assert_eq!(calls, 0);
}

#[test]
fn empty_stream_finds_nothing() {
    let config = config();
    let frames: Vec<Result<(u64, GrayImage), BattlecutError>> = Vec::new();
    let records = detect_events(frames, detector(&config), &config, Some(0), |_| {}).unwrap();
    assert!(records.is_empty());
}
