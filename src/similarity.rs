//! Pixel-agreement similarity between two grayscale rasters.
//!
//! The score is the fraction of pixel positions whose absolute intensity
//! difference is strictly below a fixed tolerance. A recorded screen that
//! shows the template agrees almost everywhere.

use image::GrayImage;

use crate::error::BattlecutError;
use crate::frame::Geometry;

/// Fraction of pixel positions where `frame` and `template` differ by less
/// than `tolerance`, in `[0, 1]`.
///
/// # Errors
///
/// Returns [`BattlecutError::GeometryMismatch`] when the two rasters do not
/// have the same width and height.
///
/// # Example
///
/// ```
/// use battlecut::similarity;
/// use image::GrayImage;
///
/// let frame = GrayImage::from_pixel(4, 4, image::Luma([100]));
/// let score = similarity(&frame, &frame, 20)?;
/// assert_eq!(score, 1.0);
/// # Ok::<(), battlecut::BattlecutError>(())
/// ```
pub fn similarity(
    frame: &GrayImage,
    template: &GrayImage,
    tolerance: u8,
) -> Result<f64, BattlecutError> {
    Geometry::of(template).ensure_matches(Geometry::of(frame))?;

    let total = frame.as_raw().len();
    if total == 0 {
        return Ok(0.0);
    }

    Ok(agreeing_pixels(frame.as_raw(), template.as_raw(), tolerance) as f64 / total as f64)
}

/// Count positions where `|a - b| < tolerance`. Slices must be equally long.
fn agreeing_pixels(a: &[u8], b: &[u8], tolerance: u8) -> usize {
    a.iter()
        .zip(b)
        .filter(|&(&x, &y)| x.abs_diff(y) < tolerance)
        .count()
}
