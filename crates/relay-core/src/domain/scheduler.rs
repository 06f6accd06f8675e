//! Adaptive frame scheduling.
//!
//! The capture side produces frames as fast as the device can encode them,
//! which is usually far more than a remote viewer needs.  The scheduler turns
//! that stream into a throttled one:
//!
//! - **Rotation hysteresis** – a frame wider than tall switches the device to
//!   "rotated"; only a frame taller than wide switches it back.  Square frames
//!   never flip the state.
//! - **Frame-rate window** – frames are counted over windows of at least two
//!   seconds; at the end of each window the observed rate is recomputed.
//! - **Admission** – if the observed rate exceeds the target rate, only every
//!   `floor(observed / target)`-th frame is emitted.  The skip ratio follows
//!   the real capture rate instead of assuming one.
//! - **Quality** – the viewer's compensation ratio selects the target rate and
//!   the JPEG quality.
//!
//! Time is always passed in by the caller so the logic can be tested without
//! sleeping.

use std::time::{Duration, Instant};

use crate::domain::geometry::Viewport;

/// Target emission rate when the viewer reports a good connection.
pub const FULL_RATE_FPS: f64 = 15.0;
/// Target emission rate for any compensation ratio below 1.0.
pub const REDUCED_RATE_FPS: f64 = 7.0;
/// JPEG quality used unless the viewer reports the worst connection.
pub const DEFAULT_JPEG_QUALITY: u8 = 50;
/// JPEG quality used when the compensation ratio is exactly 0.0.
pub const LOW_JPEG_QUALITY: u8 = 25;
/// Minimum length of a frame-rate measurement window.
pub const FPS_WINDOW: Duration = Duration::from_secs(2);

// ── Delivery policy ───────────────────────────────────────────────────────────

/// Viewer-controlled trade-off between image quality and bandwidth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryPolicy {
    compensation_ratio: f64,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            compensation_ratio: 1.0,
        }
    }
}

impl DeliveryPolicy {
    /// Returns the current compensation ratio (0.0 = poor link, 1.0 = good).
    pub fn compensation_ratio(&self) -> f64 {
        self.compensation_ratio
    }

    /// Overwrites the compensation ratio, clamped into `[0.0, 1.0]`.
    ///
    /// Non-finite values are ignored and leave the policy unchanged; returns
    /// `false` in that case.
    pub fn set_compensation_ratio(&mut self, ratio: f64) -> bool {
        if !ratio.is_finite() {
            return false;
        }
        self.compensation_ratio = ratio.clamp(0.0, 1.0);
        true
    }

    /// Frames per second the viewer should receive.
    pub fn target_fps(&self) -> f64 {
        if self.compensation_ratio == 1.0 {
            FULL_RATE_FPS
        } else {
            REDUCED_RATE_FPS
        }
    }

    /// JPEG quality to encode emitted frames with.
    pub fn jpeg_quality(&self) -> u8 {
        if self.compensation_ratio == 0.0 {
            LOW_JPEG_QUALITY
        } else {
            DEFAULT_JPEG_QUALITY
        }
    }
}

/// Decides whether the frame numbered `frame_counter` in the current window
/// should be emitted.
///
/// When the source runs faster than `target_fps`, only every
/// `floor(observed_fps / target_fps)`-th frame passes.  Otherwise every frame
/// passes.
///
/// # Example
///
/// ```rust
/// use relay_core::is_frame_emittable;
///
/// // 30 fps source, 15 fps target: every second frame.
/// assert!(is_frame_emittable(30.0, 4, 15.0));
/// assert!(!is_frame_emittable(30.0, 5, 15.0));
/// // 5 fps source: everything.
/// assert!(is_frame_emittable(5.0, 5, 15.0));
/// ```
pub fn is_frame_emittable(observed_fps: f64, frame_counter: u64, target_fps: f64) -> bool {
    if target_fps <= 0.0 || observed_fps <= target_fps {
        return true;
    }
    let skip = (observed_fps / target_fps).floor() as u64;
    skip <= 1 || frame_counter % skip == 0
}

// ── Device state ──────────────────────────────────────────────────────────────

/// What changed when a frame's geometry was observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryChange {
    /// The screen size differs from the previous frame (or this is the first).
    pub size_changed: bool,
    /// `Some(new_state)` if the rotation flag flipped.
    pub rotation_changed: Option<bool>,
}

/// Capture-side bookkeeping that survives across frames.
///
/// Initialised on the first captured frame and updated on every frame after
/// that; it is never reset while the process runs.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    screen_size: Viewport,
    is_rotated: bool,
    frame_counter: u64,
    window_start: Option<Instant>,
    observed_fps: f64,
    last_encoded_size: usize,
    consecutive_errors: u32,
}

impl DeviceState {
    /// Creates an empty state; the screen size is unknown until the first
    /// frame is observed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed raw frame size.  Empty before the first frame.
    pub fn screen_size(&self) -> Viewport {
        self.screen_size
    }

    /// Whether frames are currently rotated 90° clockwise before delivery.
    pub fn is_rotated(&self) -> bool {
        self.is_rotated
    }

    /// Frames counted in the current measurement window.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Frame rate measured over the last completed window (0 before the
    /// first window closes).
    pub fn observed_fps(&self) -> f64 {
        self.observed_fps
    }

    /// Size in bytes of the most recently encoded frame.
    pub fn last_encoded_size(&self) -> usize {
        self.last_encoded_size
    }

    /// Number of failed processing attempts since the last success.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Records the raw size of a captured frame and applies rotation
    /// hysteresis.
    pub fn observe_geometry(&mut self, width: u32, height: u32) -> GeometryChange {
        let size = Viewport::new(width, height);
        let mut change = GeometryChange::default();

        if size != self.screen_size {
            self.screen_size = size;
            change.size_changed = true;
        }

        if !self.is_rotated && size.is_landscape() {
            self.is_rotated = true;
            change.rotation_changed = Some(true);
        } else if self.is_rotated && size.is_portrait() {
            self.is_rotated = false;
            change.rotation_changed = Some(false);
        }
        change
    }

    /// Counts one delivered-candidate frame at `now`.
    ///
    /// When the current window has lasted at least [`FPS_WINDOW`], the
    /// observed rate is recomputed, the window restarts, and the new rate is
    /// returned.
    pub fn count_frame(&mut self, now: Instant) -> Option<f64> {
        self.frame_counter += 1;

        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };

        let elapsed = now.saturating_duration_since(start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        self.observed_fps = self.frame_counter as f64 / elapsed.as_secs_f64();
        self.frame_counter = 0;
        self.window_start = Some(now);
        Some(self.observed_fps)
    }

    /// Applies [`is_frame_emittable`] to the current counter and rate.
    pub fn is_emittable(&self, policy: &DeliveryPolicy) -> bool {
        is_frame_emittable(self.observed_fps, self.frame_counter, policy.target_fps())
    }

    /// Remembers the size of the frame that was just encoded.
    pub fn record_encoded(&mut self, bytes: usize) {
        self.last_encoded_size = bytes;
    }

    /// Updates the consecutive-error counter after a processing attempt and
    /// returns its new value.
    pub fn record_attempt(&mut self, succeeded: bool) -> u32 {
        if succeeded {
            self.consecutive_errors = 0;
        } else {
            self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        }
        self.consecutive_errors
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
