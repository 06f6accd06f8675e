//! Pixel work for each captured frame, and the seam to the frame source.
//!
//! The forward transform applied here (rotate 90° clockwise when the device is
//! rotated, then resize to the session's target size) is the one
//! `relay_core::domain::geometry::to_device_coordinates` inverts for touches.
//! A change to one must be mirrored in the other.

use std::io::Cursor;
use std::sync::atomic::AtomicBool;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use relay_core::Viewport;

use crate::application::retry::CaptureError;

/// Callback a [`FrameSource`] invokes once per captured frame.
///
/// An error returned from the callback stops the source and is propagated out
/// of [`FrameSource::run`].
pub type FrameSink<'a> = dyn FnMut(RgbImage) -> Result<(), CaptureError> + 'a;

/// A producer of raw device frames.
///
/// `run` blocks the calling thread, so the relay drives it from a dedicated
/// blocking task.
pub trait FrameSource: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Captures frames until `running` turns `false`, the source is
    /// exhausted, or `on_frame` fails.
    ///
    /// # Errors
    ///
    /// Returns the first error from `on_frame`.
    fn run(&mut self, on_frame: &mut FrameSink<'_>, running: &AtomicBool) -> Result<(), CaptureError>;
}

/// Rotates (if needed) and resizes a raw frame to the session's target size.
///
/// `Triangle` filtering widens its support with the downscale factor, which
/// averages over the source area instead of point-sampling it.
pub fn orient_and_scale(frame: &RgbImage, is_rotated: bool, target: Viewport) -> RgbImage {
    let rotated;
    let source = if is_rotated {
        rotated = imageops::rotate90(frame);
        &rotated
    } else {
        frame
    };
    if source.width() == target.width && source.height() == target.height {
        return source.clone();
    }
    imageops::resize(source, target.width, target.height, FilterType::Triangle)
}

/// Encodes an RGB frame as JPEG at `quality` (1–100).
///
/// # Errors
///
/// Returns [`CaptureError::Transient`] if the encoder fails.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut out = Cursor::new(Vec::with_capacity(frame.as_raw().len() / 8));
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(frame)
        .map_err(|e| CaptureError::Transient(format!("jpeg encode: {e}")))?;
    Ok(out.into_inner())
}
