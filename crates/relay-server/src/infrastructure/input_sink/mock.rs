//! Recording input sink for tests.
//!
//! Every accepted command is pushed into a `Mutex<Vec<...>>` in call order,
//! so a test can share the sink behind an `Arc` with a [`RelayService`] and
//! inspect afterwards exactly what would have reached the device.
//!
//! Set `should_fail = true` to make every method return
//! [`InjectionError::Device`] without recording anything.
//!
//! [`RelayService`]: crate::application::RelayService

use std::sync::Mutex;

use relay_core::{Action, DevicePoint, KeyCode};

use crate::application::input_router::{InjectionError, InputSink};

/// One command as received by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCommand {
    Touch {
        action: Action,
        point: DevicePoint,
        touch_id: i64,
    },
    Key {
        key: KeyCode,
        action: Action,
    },
    Text(String),
    Wake,
}

/// An [`InputSink`] that records instead of injecting.
#[derive(Debug, Default)]
pub struct RecordingInputSink {
    /// Commands in the order they arrived.
    pub commands: Mutex<Vec<SinkCommand>>,
    /// When `true`, every method fails.
    pub should_fail: bool,
}

impl RecordingInputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every method fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// A snapshot of the recorded commands.
    pub fn recorded(&self) -> Vec<SinkCommand> {
        match self.commands.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, command: SinkCommand) -> Result<(), InjectionError> {
        if self.should_fail {
            return Err(InjectionError::Device("mock failure".to_string()));
        }
        match self.commands.lock() {
            Ok(mut guard) => guard.push(command),
            Err(poisoned) => poisoned.into_inner().push(command),
        }
        Ok(())
    }
}

impl InputSink for RecordingInputSink {
    fn touch(&self, action: Action, point: DevicePoint, touch_id: i64) -> Result<(), InjectionError> {
        self.record(SinkCommand::Touch {
            action,
            point,
            touch_id,
        })
    }

    fn key(&self, key: KeyCode, action: Action) -> Result<(), InjectionError> {
        self.record(SinkCommand::Key { key, action })
    }

    fn text(&self, text: &str) -> Result<(), InjectionError> {
        self.record(SinkCommand::Text(text.to_string()))
    }

    fn wake(&self) -> Result<(), InjectionError> {
        self.record(SinkCommand::Wake)
    }
}
