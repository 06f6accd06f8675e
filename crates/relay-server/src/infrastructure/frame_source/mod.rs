//! [`FrameSource`] implementations.
//!
//! Only the synthetic test pattern ships with the relay; a device capture
//! backend plugs in by implementing [`FrameSource`] and adding a
//! [`FrameSourceKind`] variant.

pub mod synthetic;

pub use synthetic::SyntheticFrameSource;

use crate::application::FrameSource;
use crate::domain::{CaptureConfig, FrameSourceKind};

/// Builds the frame source selected in `config`.
pub fn build_source(config: &CaptureConfig) -> Box<dyn FrameSource> {
    match config.source {
        FrameSourceKind::Synthetic => Box::new(SyntheticFrameSource::from_config(config)),
    }
}
