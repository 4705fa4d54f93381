//! Frame geometry, orientation, and pixel-buffer helpers.
//!
//! Frames travel through the crate as [`image::GrayImage`] values paired with
//! their decode-order index. Colour is reduced to BT.601 luma
//! ([`luma_bt601`]) on both the template side and the video side. This module holds the small value types and
//! conversions shared by the source, the templates, and the detector.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};

use ffmpeg_next::frame::Video as VideoFrame;
use image::{GrayImage, Luma, Rgb, RgbImage, imageops};

use crate::error::BattlecutError;

/// Width and height of a raster, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Geometry {
    /// Create a geometry from a width and a height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The geometry of an existing grayscale raster.
    pub fn of(image: &GrayImage) -> Self {
        Self::new(image.width(), image.height())
    }

    /// The same geometry with width and height swapped.
    pub const fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Number of pixel positions.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Fail with [`BattlecutError::GeometryMismatch`] unless `actual` equals
    /// this geometry.
    pub fn ensure_matches(self, actual: Geometry) -> Result<(), BattlecutError> {
        if self == actual {
            Ok(())
        } else {
            Err(BattlecutError::GeometryMismatch {
                expected: self,
                actual,
            })
        }
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How decoded frames must be turned to reach the expected geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// The stream already has the expected geometry.
    Upright,
    /// The stream is the transpose of the expected geometry (a portrait
    /// recording of a landscape screen); frames are rotated 90° counter-clockwise.
    RotateCounterClockwise,
}

impl Orientation {
    /// Decide the orientation for a stream reporting `reported` when
    /// `expected` is wanted.
    ///
    /// # Errors
    ///
    /// Returns [`BattlecutError::GeometryMismatch`] when `reported` is neither
    /// the expected geometry nor its transpose.
    pub fn resolve(reported: Geometry, expected: Geometry) -> Result<Self, BattlecutError> {
        if reported == expected {
            Ok(Orientation::Upright)
        } else if reported.transposed() == expected {
            Ok(Orientation::RotateCounterClockwise)
        } else {
            Err(BattlecutError::GeometryMismatch {
                expected,
                actual: reported,
            })
        }
    }

    /// Apply this orientation to a decoded frame.
    pub fn apply(self, image: GrayImage) -> GrayImage {
        match self {
            Orientation::Upright => image,
            Orientation::RotateCounterClockwise => imageops::rotate270(&image),
        }
    }
}

/// Timestamp of a frame, derived as `frame_index / frames_per_second`.
pub fn frame_timestamp(frame_index: u64, frames_per_second: f64) -> Duration {
    if frames_per_second > 0.0 {
        Duration::from_secs_f64(frame_index as f64 / frames_per_second)
    } else {
        Duration::ZERO
    }
}

/// BT.601 luma of one RGB pixel, in 14-bit fixed point with rounding.
///
/// Both templates and sampled frames go through this, so identical colours
/// always produce identical intensities.
pub fn luma_bt601(red: u8, green: u8, blue: u8) -> u8 {
    const RED: u32 = 4899;
    const GREEN: u32 = 9617;
    const BLUE: u32 = 1868;
    const SHIFT: u32 = 14;

    let weighted = RED * u32::from(red) + GREEN * u32::from(green) + BLUE * u32::from(blue);
    ((weighted + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

/// Convert an RGB raster to grayscale with [`luma_bt601`].
pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([red, green, blue]) = *image.get_pixel(x, y);
        Luma([luma_bt601(red, green, blue)])
    })
}

/// Copy plane 0 of a packed FFmpeg frame into a tightly-packed buffer,
/// dropping any row padding.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = width as usize * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_upright_and_transposed() {
        let expected = Geometry::new(1920, 888);
        assert_eq!(
            Orientation::resolve(Geometry::new(1920, 888), expected).unwrap(),
            Orientation::Upright
        );
        assert_eq!(
            Orientation::resolve(Geometry::new(888, 1920), expected).unwrap(),
            Orientation::RotateCounterClockwise
        );
    }

    #[test]
    fn resolve_rejects_other_geometry() {
        let result = Orientation::resolve(Geometry::new(1280, 720), Geometry::new(1920, 888));
        assert!(matches!(
            result,
            Err(BattlecutError::GeometryMismatch { actual, .. }) if actual == Geometry::new(1280, 720)
        ));
    }

    #[test]
    fn rotation_counter_clockwise_moves_top_right_to_top_left() {
        // 3 wide, 2 tall; mark the top-right pixel.
        let mut image = GrayImage::new(3, 2);
        image.put_pixel(2, 0, Luma([255]));

        let rotated = Orientation::RotateCounterClockwise.apply(image);
        assert_eq!(Geometry::of(&rotated), Geometry::new(2, 3));
        assert_eq!(rotated.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn timestamp_from_index() {
        assert_eq!(frame_timestamp(120, 60.0), Duration::from_secs(2));
        assert_eq!(frame_timestamp(5, 0.0), Duration::ZERO);
    }

    #[test]
    fn geometry_display() {
        assert_eq!(Geometry::new(1920, 888).to_string(), "1920x888");
    }

    #[test]
    fn bt601_luma_of_primaries() {
        assert_eq!(luma_bt601(255, 0, 0), 76);
        assert_eq!(luma_bt601(0, 255, 0), 150);
        assert_eq!(luma_bt601(0, 0, 255), 29);
        assert_eq!(luma_bt601(255, 255, 255), 255);
        assert_eq!(luma_bt601(0, 0, 0), 0);
    }

    #[test]
    fn rgb_conversion_is_per_pixel() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([128, 128, 128]));

        let gray = rgb_to_gray(&image);
        assert_eq!(gray.as_raw(), &vec![76, 128]);
    }
}
