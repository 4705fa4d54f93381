//! Scan configuration.
//!
//! [`ScanConfig`] is an immutable builder carrying the run-level settings of
//! a scan: sampling stride, similarity thresholds, pixel tolerance, expected
//! stream geometry, and the progress callback. It is handed to the detector
//! and the scanner by value, so several configurations can be exercised side
//! by side without any process-wide state.
//!
//! # Example
//!
//! ```
//! use battlecut::ScanConfig;
//!
//! let config = ScanConfig::new()
//!     .with_frame_step(30)
//!     .with_start_threshold(0.85)
//!     .with_pixel_tolerance(24);
//! assert!(config.validate().is_ok());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::BattlecutError;
use crate::frame::Geometry;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Sample every 60th decoded frame by default.
pub const DEFAULT_FRAME_STEP: u64 = 60;
/// Default minimum similarity for the start screen.
pub const DEFAULT_START_THRESHOLD: f64 = 0.9;
/// Default minimum similarity for any end screen.
pub const DEFAULT_END_THRESHOLD: f64 = 0.9;
/// Default per-pixel intensity tolerance.
pub const DEFAULT_PIXEL_TOLERANCE: u8 = 20;
/// Default expected stream geometry.
pub const DEFAULT_GEOMETRY: Geometry = Geometry::new(1920, 888);

/// Configuration for a scan.
#[derive(Clone)]
pub struct ScanConfig {
    pub(crate) frame_step: u64,
    pub(crate) start_threshold: f64,
    pub(crate) end_threshold: f64,
    pub(crate) pixel_tolerance: u8,
    pub(crate) expected_geometry: Geometry,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// How often to fire the progress callback (every N samples).
    pub(crate) batch_size: u64,
}

impl Debug for ScanConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScanConfig")
            .field("frame_step", &self.frame_step)
            .field("start_threshold", &self.start_threshold)
            .field("end_threshold", &self.end_threshold)
            .field("pixel_tolerance", &self.pixel_tolerance)
            .field("expected_geometry", &self.expected_geometry)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanConfig {
    /// Create a configuration with the default settings.
    ///
    /// Defaults: every 60th frame, thresholds 0.9, tolerance 20, expected
    /// geometry 1920x888, no progress callback.
    pub fn new() -> Self {
        Self {
            frame_step: DEFAULT_FRAME_STEP,
            start_threshold: DEFAULT_START_THRESHOLD,
            end_threshold: DEFAULT_END_THRESHOLD,
            pixel_tolerance: DEFAULT_PIXEL_TOLERANCE,
            expected_geometry: DEFAULT_GEOMETRY,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Set the sampling stride: one frame out of every `step` is scored.
    #[must_use]
    pub fn with_frame_step(mut self, step: u64) -> Self {
        self.frame_step = step;
        self
    }

    /// Set the minimum start-screen similarity.
    #[must_use]
    pub fn with_start_threshold(mut self, threshold: f64) -> Self {
        self.start_threshold = threshold;
        self
    }

    /// Set the minimum end-screen similarity.
    #[must_use]
    pub fn with_end_threshold(mut self, threshold: f64) -> Self {
        self.end_threshold = threshold;
        self
    }

    /// Set the per-pixel tolerance. Two intensities agree when their absolute
    /// difference is strictly below this value.
    #[must_use]
    pub fn with_pixel_tolerance(mut self, tolerance: u8) -> Self {
        self.pixel_tolerance = tolerance;
        self
    }

    /// Set the geometry the stream and the templates must have.
    #[must_use]
    pub fn with_expected_geometry(mut self, geometry: Geometry) -> Self {
        self.expected_geometry = geometry;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sampling stride.
    pub fn frame_step(&self) -> u64 {
        self.frame_step
    }

    /// Minimum start-screen similarity.
    pub fn start_threshold(&self) -> f64 {
        self.start_threshold
    }

    /// Minimum end-screen similarity.
    pub fn end_threshold(&self) -> f64 {
        self.end_threshold
    }

    /// Per-pixel intensity tolerance.
    pub fn pixel_tolerance(&self) -> u8 {
        self.pixel_tolerance
    }

    /// Geometry the stream and templates must have.
    pub fn expected_geometry(&self) -> Geometry {
        self.expected_geometry
    }

    /// Check every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`BattlecutError::InvalidConfiguration`] for a zero stride,
    /// a threshold outside `[0, 1]`, or an empty expected geometry.
    pub fn validate(&self) -> Result<(), BattlecutError> {
        if self.frame_step == 0 {
            return Err(BattlecutError::InvalidConfiguration(
                "frame step must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("start threshold", self.start_threshold),
            ("end threshold", self.end_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BattlecutError::InvalidConfiguration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.expected_geometry.area() == 0 {
            return Err(BattlecutError::InvalidConfiguration(format!(
                "expected geometry {} has no pixels",
                self.expected_geometry
            )));
        }
        Ok(())
    }
}
