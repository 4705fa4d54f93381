//! Reference screens the detector compares sampled frames against.
//!
//! A [`TemplateSet`] holds exactly one start template and an ordered list of
//! labelled end templates. The order of the end templates is their priority:
//! when several match the same frame, the first one wins.
//!
//! Templates are decoded with the `image` crate and reduced to 8-bit BT.601
//! luma once at load time, the same conversion applied to sampled frames. All of them must share one geometry, which
//! is also the geometry every sampled frame must have.
//!
//! # Example
//!
//! ```no_run
//! use battlecut::{Geometry, TemplateSet};
//!
//! let templates = TemplateSet::load_dir(
//!     ".",
//!     "start_frame.jpg",
//!     &["win", "lose"],
//!     Geometry::new(1920, 888),
//! )?;
//! assert_eq!(templates.end_templates().len(), 2);
//! # Ok::<(), battlecut::BattlecutError>(())
//! ```

use std::path::Path;

use image::GrayImage;

use crate::error::BattlecutError;
use crate::frame::{Geometry, rgb_to_gray};

/// End-screen labels used when none are configured.
pub const DEFAULT_END_LABELS: [&str; 5] = ["win", "lose", "chat_exit", "lobby_exit", "character_exit"];

/// File name of the start template when none is configured.
pub const DEFAULT_START_TEMPLATE: &str = "start_frame.jpg";

/// File name under which the end template for `label` is looked up.
pub fn end_template_file_name(label: &str) -> String {
    format!("{label}_frame.jpg")
}

/// A labelled end-screen template.
#[derive(Debug, Clone)]
pub struct EndTemplate {
    /// Label reported in the event record when this template matches.
    pub label: String,
    /// Grayscale reference raster.
    pub image: GrayImage,
}

/// The start template plus the prioritized end templates.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    start: GrayImage,
    ends: Vec<EndTemplate>,
    geometry: Geometry,
}

impl TemplateSet {
    /// Build a set from in-memory rasters.
    ///
    /// # Errors
    ///
    /// - [`BattlecutError::InvalidConfiguration`] if `ends` is empty.
    /// - [`BattlecutError::GeometryMismatch`] if any end template differs in
    ///   size from the start template.
    pub fn new(start: GrayImage, ends: Vec<EndTemplate>) -> Result<Self, BattlecutError> {
        if ends.is_empty() {
            return Err(BattlecutError::InvalidConfiguration(
                "at least one end template is required".to_string(),
            ));
        }

        let geometry = Geometry::of(&start);
        for end in &ends {
            geometry.ensure_matches(Geometry::of(&end.image))?;
        }

        Ok(Self {
            start,
            ends,
            geometry,
        })
    }

    /// Load the start template at `directory/start_file` and one end template
    /// per label at `directory/<label>_frame.jpg`, checking each against
    /// `expected`.
    ///
    /// # Errors
    ///
    /// - [`BattlecutError::TemplateLoad`] if an image is missing or unreadable.
    /// - [`BattlecutError::GeometryMismatch`] if an image is not `expected`.
    /// - [`BattlecutError::InvalidConfiguration`] if `labels` is empty.
    pub fn load_dir<P: AsRef<Path>, S: AsRef<str>>(
        directory: P,
        start_file: &str,
        labels: &[S],
        expected: Geometry,
    ) -> Result<Self, BattlecutError> {
        let directory = directory.as_ref();

        let start = load_template(&directory.join(start_file), expected)?;
        let ends = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                let path = directory.join(end_template_file_name(label));
                load_template(&path, expected).map(|image| EndTemplate {
                    label: label.to_string(),
                    image,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(start, ends)
    }

    /// The start-screen template.
    pub fn start_template(&self) -> &GrayImage {
        &self.start
    }

    /// End templates in priority order.
    pub fn end_templates(&self) -> &[EndTemplate] {
        &self.ends
    }

    /// Geometry shared by every template in the set.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }
}

/// Decode one image, reduce it to BT.601 luma and check its size.
fn load_template(path: &Path, expected: Geometry) -> Result<GrayImage, BattlecutError> {
    log::debug!("Loading template: {}", path.display());

    if !path.is_file() {
        return Err(BattlecutError::TemplateLoad {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    let decoded = image::open(path).map_err(|error| BattlecutError::TemplateLoad {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    let image = rgb_to_gray(&decoded.to_rgb8());

    expected.ensure_matches(Geometry::of(&image))?;
    Ok(image)
}
