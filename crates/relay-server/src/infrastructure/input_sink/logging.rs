//! Input sink that logs commands instead of injecting them.

use relay_core::{Action, DevicePoint, KeyCode};
use tracing::info;

use crate::application::input_router::{InjectionError, InputSink};

/// Logs each command at `info` with its device-level codes.
#[derive(Debug, Default)]
pub struct LoggingInputSink;

impl LoggingInputSink {
    pub fn new() -> Self {
        Self
    }
}

impl InputSink for LoggingInputSink {
    fn touch(&self, action: Action, point: DevicePoint, touch_id: i64) -> Result<(), InjectionError> {
        info!(
            action = action.code(),
            x = point.x,
            y = point.y,
            touch_id,
            "inject touch"
        );
        Ok(())
    }

    fn key(&self, key: KeyCode, action: Action) -> Result<(), InjectionError> {
        info!(key = key.code(), action = action.code(), "inject key");
        Ok(())
    }

    fn text(&self, text: &str) -> Result<(), InjectionError> {
        info!(chars = text.chars().count(), "inject text");
        Ok(())
    }

    fn wake(&self) -> Result<(), InjectionError> {
        info!("wake device screen");
        Ok(())
    }
}
