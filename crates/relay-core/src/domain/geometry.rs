//! Device ↔ guest coordinate mapping.
//!
//! Two independent coordinate spaces are involved in every session:
//!
//! - **Device space** – pixels of the captured screen as the input sink
//!   expects them.  A landscape capture stays landscape here.
//! - **Guest space** – pixels of the viewer's canvas.  The viewer always sees a
//!   portrait image: landscape captures are rotated 90° clockwise before they
//!   are scaled down.
//!
//! The forward transform (applied to frames) is *rotate, then scale by
//! `1 / scale_ratio`*.  [`to_device_coordinates`] is its exact inverse and
//! [`to_guest_coordinates`] restates the forward transform for single points.
//! A change to one of them must be mirrored in the other.
//!
//! ```text
//!  device (landscape W×H)      rotate 90° CW        scale 1/r
//!  ┌───────────────┐          ┌───────┐            ┌───┐
//!  │ (dx, dy)      │   ──▶    │       │    ──▶     │ g │  guest (tw × gh)
//!  └───────────────┘          │       │            └───┘
//!                             └───────┘
//! ```

use serde::{Deserialize, Serialize};

/// A width × height pair in pixels.
///
/// Used for the device screen, the viewer canvas, and the scaled frame size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport from a width and a height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if the viewport is strictly wider than tall.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Returns `true` if the viewport is strictly taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// Returns the same viewport with `width <= height` (portrait baseline).
    pub fn to_portrait(self) -> Self {
        if self.is_landscape() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }
}

/// An integer pixel position in device space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePoint {
    pub x: i32,
    pub y: i32,
}

/// The scale relation between a (portrait-normalised) device viewport and the
/// guest canvas negotiated for a session.
///
/// The guest height is authoritative: frames are scaled so their height
/// matches the canvas exactly, and the width follows the device aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Device pixels per guest pixel (`device.height / guest.height`).
    pub scale_ratio: f64,
    /// Size of the scaled frame in guest pixels.
    pub target: Viewport,
}

impl Projection {
    /// Derives the projection between `device` and `guest`.
    ///
    /// `device` is normalised to portrait first.  Returns `None` if either
    /// viewport has a zero dimension, since no meaningful ratio exists.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relay_core::{Projection, Viewport};
    ///
    /// let p = Projection::between(Viewport::new(1080, 2400), Viewport::new(360, 800)).unwrap();
    /// assert_eq!(p.scale_ratio, 3.0);
    /// assert_eq!(p.target, Viewport::new(360, 800));
    /// ```
    pub fn between(device: Viewport, guest: Viewport) -> Option<Self> {
        if device.is_empty() || guest.is_empty() {
            return None;
        }
        let device = device.to_portrait();
        let scale_ratio = f64::from(device.height) / f64::from(guest.height);
        let target_width = (f64::from(device.width) / scale_ratio).floor() as u32;
        Some(Self {
            scale_ratio,
            target: Viewport::new(target_width.max(1), guest.height),
        })
    }

    /// Maps a guest-space point to device space.  See [`to_device_coordinates`].
    pub fn to_device(&self, guest_x: f64, guest_y: f64, is_rotated: bool) -> DevicePoint {
        to_device_coordinates(guest_x, guest_y, is_rotated, self.scale_ratio, self.target.width)
    }

    /// Maps a device-space point to guest space.  See [`to_guest_coordinates`].
    pub fn to_guest(&self, device_x: f64, device_y: f64, is_rotated: bool) -> (f64, f64) {
        to_guest_coordinates(device_x, device_y, is_rotated, self.scale_ratio, self.target.width)
    }
}

/// Maps a touch position on the guest canvas back to a device pixel.
///
/// When the device is rotated, the frame the guest sees was turned 90°
/// clockwise.  Undoing that means swapping the axes and reflecting the new
/// `y` against the scaled frame width (`target_width`).  Both coordinates are
/// then multiplied by `scale_ratio` and truncated to whole device pixels.
///
/// # Example
///
/// ```rust
/// use relay_core::domain::geometry::to_device_coordinates;
///
/// let p = to_device_coordinates(100.0, 200.0, false, 3.0, 360);
/// assert_eq!((p.x, p.y), (300, 600));
/// ```
pub fn to_device_coordinates(
    guest_x: f64,
    guest_y: f64,
    is_rotated: bool,
    scale_ratio: f64,
    target_width: u32,
) -> DevicePoint {
    let (x, y) = if is_rotated {
        (guest_y, f64::from(target_width) - guest_x)
    } else {
        (guest_x, guest_y)
    };
    DevicePoint {
        x: (x * scale_ratio) as i32,
        y: (y * scale_ratio) as i32,
    }
}

/// Maps a device pixel to its position on the guest canvas.
///
/// This is the point form of the rotate-then-scale transform applied to every
/// frame, and the inverse of [`to_device_coordinates`] up to truncation.
pub fn to_guest_coordinates(
    device_x: f64,
    device_y: f64,
    is_rotated: bool,
    scale_ratio: f64,
    target_width: u32,
) -> (f64, f64) {
    let (x, y) = (device_x / scale_ratio, device_y / scale_ratio);
    if is_rotated {
        (f64::from(target_width) - y, x)
    } else {
        (x, y)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
