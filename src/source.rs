//! Video decoding for scans.
//!
//! [`VideoSource`] opens a video file with FFmpeg, caches its
//! [`VideoMetadata`], and decides how frames must be oriented to reach the
//! expected geometry. [`VideoSource::sampled_frames`] then returns a lazy
//! [`SampledFrames`] iterator: every frame is decoded in order, but only
//! every Nth one is converted to RGB, reduced to BT.601 luma, reoriented,
//! and yielded.
//!
//! The demuxer is owned by the `VideoSource`; dropping it closes the file,
//! whichever way the scan ended.
//!
//! # Example
//!
//! ```no_run
//! use battlecut::{Geometry, VideoSource};
//!
//! let mut source = VideoSource::open("recording.mp4", Geometry::new(1920, 888))?;
//! for result in source.sampled_frames(60)? {
//!     let (frame_index, frame) = result?;
//!     println!("{frame_index}: {}x{}", frame.width(), frame.height());
//! }
//! # Ok::<(), battlecut::BattlecutError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{GrayImage, RgbImage};

use crate::error::BattlecutError;
use crate::frame::{Geometry, Orientation, frame_to_buffer, rgb_to_gray};
use crate::metadata::VideoMetadata;

/// An opened video file, ready to be scanned.
pub struct VideoSource {
    input_context: Input,
    video_stream_index: usize,
    metadata: VideoMetadata,
    orientation: Orientation,
    file_path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("orientation", &self.orientation)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file whose frames must end up with the `expected`
    /// geometry.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, locates the best
    /// video stream and reads its metadata. A stream reporting the transpose
    /// of `expected` is accepted and its frames are rotated 90°
    /// counter-clockwise.
    ///
    /// # Errors
    ///
    /// - [`BattlecutError::FileOpen`] if the file cannot be opened.
    /// - [`BattlecutError::NoVideoStream`] if it has no video stream.
    /// - [`BattlecutError::GeometryMismatch`] if the stream geometry is
    ///   neither `expected` nor its transpose.
    pub fn open<P: AsRef<Path>>(path: P, expected: Geometry) -> Result<Self, BattlecutError> {
        let file_path = path.as_ref().to_path_buf();

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| BattlecutError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| BattlecutError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(BattlecutError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                BattlecutError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let video_decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| BattlecutError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to create video decoder: {error}"),
                })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            (duration.as_secs_f64() * frames_per_second) as u64
        };

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: video_decoder.width(),
            height: video_decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        let orientation = Orientation::resolve(metadata.geometry(), expected)?;
        match orientation {
            Orientation::Upright => {
                log::debug!("Stream is {}, no rotation needed", metadata.geometry());
            }
            Orientation::RotateCounterClockwise => log::info!(
                "Stream is {} (portrait); frames will be rotated to {expected}",
                metadata.geometry()
            ),
        }

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            orientation,
            file_path,
        })
    }

    /// Cached stream metadata.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Average frame rate used to turn frame indices into timestamps.
    pub fn frames_per_second(&self) -> f64 {
        self.metadata.frames_per_second
    }

    /// How decoded frames are turned to reach the expected geometry.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Lazily decode the stream from the beginning, yielding every
    /// `frame_step`-th frame (starting with frame 0) as an oriented
    /// grayscale raster.
    ///
    /// # Errors
    ///
    /// Returns [`BattlecutError::InvalidConfiguration`] if `frame_step` is
    /// zero, or an FFmpeg error if the decoder cannot be created.
    pub fn sampled_frames(&mut self, frame_step: u64) -> Result<SampledFrames<'_>, BattlecutError> {
        if frame_step == 0 {
            return Err(BattlecutError::InvalidConfiguration(
                "frame step must be greater than zero".to_string(),
            ));
        }

        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(BattlecutError::NoVideoStream)?;
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        Ok(SampledFrames {
            source: self,
            decoder,
            scaler: None,
            frame_step,
            next_index: 0,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
            done: false,
        })
    }
}

/// A lazy iterator over sampled, oriented grayscale frames.
///
/// Borrows the [`VideoSource`] mutably; frame indices count decoded frames
/// in decode order. Created via [`VideoSource::sampled_frames`].
pub struct SampledFrames<'a> {
    source: &'a mut VideoSource,
    decoder: VideoDecoder,
    /// Built from the first decoded frame, whose format is authoritative.
    scaler: Option<ScalingContext>,
    frame_step: u64,
    next_index: u64,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
}

impl SampledFrames<'_> {
    /// Convert the current `decoded_frame` to an oriented `GrayImage`.
    ///
    /// The frame is scaled to RGB24 first so its luma is computed the same
    /// way as the templates', whatever matrix the encoder used.
    fn convert_current_frame(&mut self) -> Result<GrayImage, BattlecutError> {
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(ScalingContext::get(
                self.decoded_frame.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?);
        }
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        }

        let buffer = frame_to_buffer(&self.rgb_frame, width, height, 3);
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            BattlecutError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;

        Ok(self.source.orientation.apply(rgb_to_gray(&image)))
    }
}

impl Iterator for SampledFrames<'_> {
    type Item = Result<(u64, GrayImage), BattlecutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let frame_index = self.next_index;
                self.next_index += 1;

                if frame_index % self.frame_step != 0 {
                    continue;
                }

                return match self.convert_current_frame() {
                    Ok(image) => Some(Ok((frame_index, image))),
                    Err(error) => {
                        self.done = true;
                        Some(Err(error))
                    }
                };
            }

            if self.eof_sent {
                log::debug!("Decoded {} frame(s)", self.next_index);
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.source.input_context) {
                Ok(()) => {
                    if packet.stream() == self.source.video_stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            self.done = true;
                            return Some(Err(BattlecutError::from(error)));
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        self.done = true;
                        return Some(Err(BattlecutError::from(error)));
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    log::debug!("Skipping unreadable packet: {error}");
                }
            }
        }
    }
}
