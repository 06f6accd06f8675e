//! A generated test pattern standing in for a device screen.
//!
//! Each frame is a dark background with a bright horizontal bar that moves
//! down one step per frame, so a viewer can see motion and dropped frames at
//! a glance.  With a rotation period set, the source swaps width and height
//! every `period` frames to exercise the landscape path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use tracing::info;

use crate::application::{CaptureError, FrameSink, FrameSource};
use crate::domain::CaptureConfig;

const BACKGROUND: Rgb<u8> = Rgb([16, 24, 32]);
const BAR: Rgb<u8> = Rgb([240, 200, 40]);
const BAR_STEPS: u32 = 32;

/// Synthetic frame producer paced at a fixed rate.
#[derive(Debug, Clone)]
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    interval: Duration,
    /// Swap orientation every this many frames.
    rotate_every: Option<u64>,
    frame_limit: Option<u64>,
    encoder: Option<String>,
}

impl SyntheticFrameSource {
    /// A portrait `width`×`height` source producing `max_fps` frames per
    /// second.  `max_fps` of 0 is treated as 1.
    pub fn new(width: u32, height: u32, max_fps: u32) -> Self {
        Self {
            width,
            height,
            interval: Duration::from_secs(1) / max_fps.max(1),
            rotate_every: None,
            frame_limit: None,
            encoder: None,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        let mut source = Self::new(config.width, config.height, config.max_fps);
        source.rotate_every = config
            .rotate_every_secs
            .map(|secs| secs.saturating_mul(u64::from(config.max_fps.max(1))));
        source.encoder = config.encoder.clone();
        source
    }

    /// Swaps orientation every `frames` frames.
    pub fn with_rotation_every(mut self, frames: u64) -> Self {
        self.rotate_every = Some(frames.max(1));
        self
    }

    /// Stops after `frames` frames instead of running until shutdown.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Produces no delay between frames.
    pub fn unpaced(mut self) -> Self {
        self.interval = Duration::ZERO;
        self
    }

    fn is_landscape(&self, index: u64) -> bool {
        self.rotate_every
            .is_some_and(|period| (index / period) % 2 == 1)
    }

    fn render(&self, index: u64) -> RgbImage {
        let (width, height) = if self.is_landscape(index) {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        let mut frame = RgbImage::from_pixel(width, height, BACKGROUND);

        let bar_height = (height / BAR_STEPS).max(1);
        let step = (index % u64::from(BAR_STEPS)) as u32;
        let top = (step * bar_height).min(height.saturating_sub(bar_height));
        for y in top..(top + bar_height).min(height) {
            for x in 0..width {
                frame.put_pixel(x, y, BAR);
            }
        }
        frame
    }
}

impl FrameSource for SyntheticFrameSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn run(&mut self, on_frame: &mut FrameSink<'_>, running: &AtomicBool) -> Result<(), CaptureError> {
        if let Some(encoder) = &self.encoder {
            info!("synthetic source ignores encoder '{encoder}'");
        }
        info!(
            "synthetic source producing {}x{} every {:?}",
            self.width, self.height, self.interval
        );

        let mut next_due = Instant::now();
        let mut index = 0u64;
        while running.load(Ordering::Relaxed) {
            if self.frame_limit.is_some_and(|limit| index >= limit) {
                break;
            }
            on_frame(self.render(index))?;
            index += 1;

            next_due += self.interval;
            let now = Instant::now();
            if next_due > now {
                thread::sleep(next_due - now);
            } else {
                next_due = now;
            }
        }

        info!("synthetic source stopped after {index} frames");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
