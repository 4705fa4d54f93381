//! Battle detection state machine.
//!
//! [`EventDetector`] consumes sampled frames in decode order and turns noisy
//! per-frame similarity scores into confirmed battles:
//!
//! - While searching for a start, each frame is scored against the start
//!   template. The first frame of a run of matches becomes the candidate
//!   start; the candidate is confirmed by the first sampled frame *after*
//!   the run, i.e. when the start screen goes away.
//! - While inside a battle, each frame is scored against the end templates
//!   in priority order. The first one that matches closes the battle and
//!   produces an [`EventRecord`].
//!
//! A candidate that is still pending, or a battle that is still open, when
//! the stream runs out is dropped.
//!
//! # Example
//!
//! ```
//! use battlecut::{EndTemplate, EventDetector, Geometry, ScanConfig, TemplateSet};
//! use image::{GrayImage, Luma};
//!
//! let start = GrayImage::from_pixel(8, 8, Luma([0]));
//! let win = GrayImage::from_pixel(8, 8, Luma([255]));
//! let gameplay = GrayImage::from_pixel(8, 8, Luma([128]));
//! let templates = TemplateSet::new(
//!     start.clone(),
//!     vec![EndTemplate { label: "win".into(), image: win.clone() }],
//! )?;
//!
//! let config = ScanConfig::new().with_expected_geometry(Geometry::new(8, 8));
//! let mut detector = EventDetector::new(&config, templates, 1.0)?;
//! for (index, frame) in [&gameplay, &start, &gameplay, &gameplay, &win].into_iter().enumerate() {
//!     detector.observe(index as u64, frame)?;
//! }
//!
//! let records = detector.finish();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].label, "win");
//! # Ok::<(), battlecut::BattlecutError>(())
//! ```

use std::time::Duration;

use image::GrayImage;

use crate::config::ScanConfig;
use crate::error::BattlecutError;
use crate::frame::{Geometry, frame_timestamp};
use crate::similarity::similarity;
use crate::template::TemplateSet;

/// Name under which start-template scores are reported.
pub const START_TEMPLATE_NAME: &str = "start";

/// The detector's working memory.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DetectionState {
    /// Searching for a start screen, nothing seen yet.
    #[default]
    Idle,
    /// The start screen is visible; `candidate` is the time of the first
    /// matching sample of the current run.
    PendingStart {
        /// Timestamp that will become the battle start once confirmed.
        candidate: Duration,
    },
    /// A battle has started and the detector is searching for its end.
    InEvent {
        /// Confirmed battle start.
        start: Duration,
    },
}

impl DetectionState {
    /// Transition on a start-template score while searching for a start.
    ///
    /// `InEvent` is returned unchanged.
    fn on_start_score(self, timestamp: Duration, matched: bool) -> (Self, Option<Boundary>) {
        match (self, matched) {
            (DetectionState::Idle, true) => (
                DetectionState::PendingStart {
                    candidate: timestamp,
                },
                None,
            ),
            (DetectionState::PendingStart { candidate }, true) => {
                (DetectionState::PendingStart { candidate }, None)
            }
            (DetectionState::PendingStart { candidate }, false) => (
                DetectionState::InEvent { start: candidate },
                Some(Boundary::StartConfirmed(candidate)),
            ),
            (state, _) => (state, None),
        }
    }

    /// Transition on the outcome of the end-template search.
    ///
    /// Only `InEvent` reacts; `label` is the first end template that matched.
    fn on_end_match(self, timestamp: Duration, label: Option<&str>) -> (Self, Option<Boundary>) {
        match (self, label) {
            (DetectionState::InEvent { start }, Some(label)) => (
                DetectionState::Idle,
                Some(Boundary::EndConfirmed(EventRecord {
                    start,
                    end: timestamp,
                    label: label.to_string(),
                })),
            ),
            (state, _) => (state, None),
        }
    }
}

/// One confirmed battle.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Time of the first sampled frame that showed the start screen.
    pub start: Duration,
    /// Time of the first sampled frame that showed an end screen.
    pub end: Duration,
    /// Label of the end template that matched.
    pub label: String,
}

impl EventRecord {
    /// Length of the battle.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// A boundary confirmed while observing a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// A pending start was confirmed at the given time.
    StartConfirmed(Duration),
    /// A battle was closed.
    EndConfirmed(EventRecord),
}

/// Score of one sample against one template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateScore {
    /// [`START_TEMPLATE_NAME`] or the end template's label.
    pub template: String,
    /// Similarity in `[0, 1]`.
    pub score: f64,
}

/// What happened while observing one sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    /// Decode-order index of the frame.
    pub frame_index: u64,
    /// `frame_index / frames_per_second`.
    pub timestamp: Duration,
    /// Scores computed for this frame, in evaluation order.
    pub scores: Vec<TemplateScore>,
    /// Boundary confirmed by this frame, if any.
    pub boundary: Option<Boundary>,
}

/// Consumes sampled frames and accumulates confirmed battles.
#[derive(Debug)]
pub struct EventDetector {
    templates: TemplateSet,
    start_threshold: f64,
    end_threshold: f64,
    pixel_tolerance: u8,
    frames_per_second: f64,
    state: DetectionState,
    records: Vec<EventRecord>,
}

impl EventDetector {
    /// Create a detector for a stream running at `frames_per_second`.
    ///
    /// # Errors
    ///
    /// - [`BattlecutError::InvalidConfiguration`] if `config` does not
    ///   validate or the frame rate is not positive.
    /// - [`BattlecutError::GeometryMismatch`] if the templates do not have
    ///   the configured geometry.
    pub fn new(
        config: &ScanConfig,
        templates: TemplateSet,
        frames_per_second: f64,
    ) -> Result<Self, BattlecutError> {
        config.validate()?;
        if !(frames_per_second > 0.0) {
            return Err(BattlecutError::InvalidConfiguration(format!(
                "frame rate must be positive, got {frames_per_second}"
            )));
        }
        config
            .expected_geometry()
            .ensure_matches(templates.geometry())?;

        Ok(Self {
            templates,
            start_threshold: config.start_threshold(),
            end_threshold: config.end_threshold(),
            pixel_tolerance: config.pixel_tolerance(),
            frames_per_second,
            state: DetectionState::Idle,
            records: Vec::new(),
        })
    }

    /// Current state of the state machine.
    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Battles confirmed so far, in chronological order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Score one sampled frame and advance the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`BattlecutError::GeometryMismatch`] if `frame` does not have
    /// the templates' geometry. No score is computed in that case.
    pub fn observe(
        &mut self,
        frame_index: u64,
        frame: &GrayImage,
    ) -> Result<SampleReport, BattlecutError> {
        self.templates
            .geometry()
            .ensure_matches(Geometry::of(frame))?;

        let timestamp = frame_timestamp(frame_index, self.frames_per_second);
        let mut scores = Vec::new();

        let (next_state, boundary) = match self.state {
            DetectionState::InEvent { .. } => {
                let mut matched = None;
                for end in self.templates.end_templates() {
                    let score = similarity(frame, &end.image, self.pixel_tolerance)?;
                    log::debug!("[{frame_index:05}] similarity to {}: {score:.3}", end.label);
                    scores.push(TemplateScore {
                        template: end.label.clone(),
                        score,
                    });
                    if score >= self.end_threshold {
                        matched = Some(end.label.as_str());
                        break;
                    }
                }
                self.state.on_end_match(timestamp, matched)
            }
            DetectionState::Idle | DetectionState::PendingStart { .. } => {
                let score = similarity(frame, self.templates.start_template(), self.pixel_tolerance)?;
                log::debug!("[{frame_index:05}] similarity to start screen: {score:.3}");
                scores.push(TemplateScore {
                    template: START_TEMPLATE_NAME.to_string(),
                    score,
                });
                self.state
                    .on_start_score(timestamp, score >= self.start_threshold)
            }
        };

        match &boundary {
            Some(Boundary::StartConfirmed(start)) => {
                log::info!("Battle start confirmed at {:.2}s", start.as_secs_f64());
            }
            Some(Boundary::EndConfirmed(record)) => {
                log::info!(
                    "Battle end ({}) confirmed at {:.2}s",
                    record.label,
                    record.end.as_secs_f64()
                );
                self.records.push(record.clone());
            }
            None => {}
        }
        self.state = next_state;

        Ok(SampleReport {
            frame_index,
            timestamp,
            scores,
            boundary,
        })
    }

    /// Stop observing and return the confirmed battles.
    ///
    /// A pending start or an open battle is discarded.
    pub fn finish(self) -> Vec<EventRecord> {
        match self.state {
            DetectionState::Idle => {}
            DetectionState::PendingStart { candidate } => log::debug!(
                "Stream ended with an unconfirmed start at {:.2}s; dropped",
                candidate.as_secs_f64()
            ),
            DetectionState::InEvent { start } => log::debug!(
                "Stream ended inside a battle started at {:.2}s; dropped",
                start.as_secs_f64()
            ),
        }
        self.records
    }
}
