//! Detection state machine tests.
//!
//! Frames and templates are synthesized so that each sampled frame has an
//! exact, known similarity against each template.

use std::time::Duration;

use battlecut::{
    BattlecutError, Boundary, DetectionState, EndTemplate, EventDetector, EventRecord, Geometry,
    ScanConfig, TemplateSet,
};
use image::{GrayImage, Luma};

const SIZE: u32 = 10;

fn solid(value: u8) -> GrayImage {
    GrayImage::from_pixel(SIZE, SIZE, Luma([value]))
}

/// A frame scoring exactly `score` against the all-black start template.
fn start_frame_scoring(score: f64) -> GrayImage {
    let mut frame = solid(0);
    let differing = ((1.0 - score) * (SIZE * SIZE) as f64).round() as u32;
    for position in 0..differing {
        frame.put_pixel(position % SIZE, position / SIZE, Luma([255]));
    }
    frame
}

fn gameplay() -> GrayImage {
    solid(50)
}

fn templates() -> TemplateSet {
    TemplateSet::new(
        solid(0),
        vec![
            EndTemplate {
                label: "win".to_string(),
                image: solid(100),
            },
            EndTemplate {
                label: "lose".to_string(),
                image: solid(200),
            },
        ],
    )
    .expect("Failed to build templates")
}

fn config() -> ScanConfig {
    ScanConfig::new().with_expected_geometry(Geometry::new(SIZE, SIZE))
}

fn detector() -> EventDetector {
    EventDetector::new(&config(), templates(), 1.0).expect("Failed to build detector")
}

fn feed(detector: &mut EventDetector, frames: &[GrayImage]) {
    for (index, frame) in frames.iter().enumerate() {
        detector
            .observe(index as u64, frame)
            .expect("Failed to observe frame");
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

#[test]
fn synthetic_scores_are_exact() {
    let mut detector = detector();
    let report = detector.observe(0, &start_frame_scoring(0.95)).unwrap();
    assert_eq!(report.scores.len(), 1);
    assert_eq!(report.scores[0].template, "start");
    assert!((report.scores[0].score - 0.95).abs() < 1e-9);
}

#[test]
fn start_is_first_matching_sample_of_the_run() {
    let mut detector = detector();
    let frames: Vec<GrayImage> = [0.2, 0.95, 0.95, 0.95, 0.3]
        .into_iter()
        .map(start_frame_scoring)
        .collect();

    let mut boundaries = Vec::new();
    for (index, frame) in frames.iter().enumerate() {
        let report = detector.observe(index as u64, frame).unwrap();
        boundaries.push(report.boundary);
    }

    assert!(boundaries[..4].iter().all(Option::is_none));
    assert_eq!(boundaries[4], Some(Boundary::StartConfirmed(secs(1))));
    assert_eq!(detector.state(), DetectionState::InEvent { start: secs(1) });
}

#[test]
fn lose_closes_battle_when_win_never_matches() {
    let mut detector = detector();
    let mut frames = vec![gameplay(); 10];
    frames.extend([solid(0), solid(0), gameplay()]);
    frames.extend(vec![gameplay(); 12]);
    frames.push(solid(200));
    frames.extend(vec![gameplay(); 5]);
    assert_eq!(frames.len(), 31);

    feed(&mut detector, &frames);

    assert_eq!(
        detector.finish(),
        vec![EventRecord {
            start: secs(10),
            end: secs(25),
            label: "lose".to_string(),
        }]
    );
}

#[test]
fn end_templates_are_tried_in_priority_order() {
    let mut detector = detector();
    feed(&mut detector, &[solid(0), gameplay()]);

    // Scores against win first, then lose.
    let report = detector.observe(2, &solid(200)).unwrap();
    let names: Vec<&str> = report
        .scores
        .iter()
        .map(|score| score.template.as_str())
        .collect();
    assert_eq!(names, ["win", "lose"]);
    assert_eq!(report.scores[0].score, 0.0);
    assert_eq!(report.scores[1].score, 1.0);
}

#[test]
fn first_matching_end_template_wins() {
    let templates = TemplateSet::new(
        solid(0),
        vec![
            EndTemplate {
                label: "chat_exit".to_string(),
                image: solid(120),
            },
            EndTemplate {
                label: "lobby_exit".to_string(),
                image: solid(120),
            },
        ],
    )
    .unwrap();
    let mut detector = EventDetector::new(&config(), templates, 1.0).unwrap();
    feed(&mut detector, &[solid(0), gameplay()]);

    let report = detector.observe(2, &solid(120)).unwrap();
    assert_eq!(report.scores.len(), 1, "later templates must not be scored");
    let Some(Boundary::EndConfirmed(record)) = report.boundary else {
        panic!("expected an end boundary");
    };
    assert_eq!(record.label, "chat_exit");
}

#[test]
fn open_battle_at_end_of_stream_is_dropped() {
    let mut detector = detector();
    feed(&mut detector, &[solid(0), gameplay(), gameplay(), gameplay()]);
    assert_eq!(detector.state(), DetectionState::InEvent { start: secs(0) });
    assert!(detector.finish().is_empty());
}

#[test]
fn pending_start_at_end_of_stream_is_dropped() {
    let mut detector = detector();
    feed(&mut detector, &[gameplay(), solid(0), solid(0)]);
    assert_eq!(
        detector.state(),
        DetectionState::PendingStart { candidate: secs(1) }
    );
    assert!(detector.finish().is_empty());
}

#[test]
fn confirming_sample_is_not_scored_against_end_templates() {
    let mut detector = detector();
    feed(&mut detector, &[solid(0)]);

    // The start screen goes away straight to a defeat screen: the defeat is
    // only seen as "not the start screen".
    let report = detector.observe(1, &solid(200)).unwrap();
    assert_eq!(report.boundary, Some(Boundary::StartConfirmed(secs(0))));
    assert_eq!(report.scores.len(), 1);
    assert!(detector.records().is_empty());
}

#[test]
fn two_battles_in_sequence() {
    let mut detector = detector();
    let frames = vec![
        gameplay(),
        solid(0),
        gameplay(),
        gameplay(),
        solid(100),
        gameplay(),
        solid(0),
        solid(0),
        gameplay(),
        solid(200),
        gameplay(),
    ];
    feed(&mut detector, &frames);

    let records = detector.finish();
    assert_eq!(
        records,
        vec![
            EventRecord {
                start: secs(1),
                end: secs(4),
                label: "win".to_string(),
            },
            EventRecord {
                start: secs(6),
                end: secs(9),
                label: "lose".to_string(),
            },
        ]
    );
    assert!(records[0].end <= records[1].start);
    assert!(records.iter().all(|record| record.start < record.end));
}

#[test]
fn timestamps_follow_frame_rate() {
    let mut detector = EventDetector::new(&config(), templates(), 60.0).unwrap();
    for (index, frame) in [gameplay(), solid(0), gameplay(), solid(100)]
        .iter()
        .enumerate()
    {
        detector.observe(index as u64 * 60, frame).unwrap();
    }
    let records = detector.finish();
    assert_eq!(records[0].start, secs(1));
    assert_eq!(records[0].end, secs(3));
    assert_eq!(records[0].duration(), secs(2));
}

#[test]
fn geometry_mismatch_aborts_before_scoring() {
    let mut detector = detector();
    feed(&mut detector, &[solid(0)]);

    let result = detector.observe(1, &GrayImage::new(SIZE + 1, SIZE));
    assert!(matches!(
        result,
        Err(BattlecutError::GeometryMismatch { expected, actual })
            if expected == Geometry::new(SIZE, SIZE) && actual == Geometry::new(SIZE + 1, SIZE)
    ));
    // The pending start was not confirmed by the rejected frame.
    assert_eq!(
        detector.state(),
        DetectionState::PendingStart { candidate: secs(0) }
    );
}

#[test]
fn templates_must_have_configured_geometry() {
    let config = ScanConfig::new().with_expected_geometry(Geometry::new(20, 20));
    let result = EventDetector::new(&config, templates(), 1.0);
    assert!(matches!(result, Err(BattlecutError::GeometryMismatch { .. })));
}

#[test]
fn invalid_configuration_is_rejected() {
    let result = EventDetector::new(&config().with_end_threshold(1.5), templates(), 1.0);
    assert!(matches!(result, Err(BattlecutError::InvalidConfiguration(_))));

    let result = EventDetector::new(&config(), templates(), 0.0);
    assert!(matches!(result, Err(BattlecutError::InvalidConfiguration(_))));
}

#[test]
fn independent_thresholds() {
    // Start needs a perfect match, ends accept half the pixels.
    let config = config().with_start_threshold(1.0).with_end_threshold(0.5);
    let mut detector = EventDetector::new(&config, templates(), 1.0).unwrap();

    let mut half_win = solid(100);
    for x in 0..SIZE {
        for y in 0..SIZE / 2 {
            half_win.put_pixel(x, y, Luma([50]));
        }
    }

    let frames = [start_frame_scoring(0.99), solid(0), gameplay(), half_win];
    feed(&mut detector, &frames);
    let records = detector.finish();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start, secs(1));
    assert_eq!(records[0].label, "win");
}
