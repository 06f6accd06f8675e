//! InputRouter: turns viewer input events into device input commands.
//!
//! The router sits at the application layer and delegates to an
//! [`InputSink`] trait object for the actual injection.  Authorization is
//! checked by the caller ([`crate::application::RelayService`]) under the
//! session lock; by the time an event reaches the router, it is known to come
//! from the bound viewer.
//!
//! | Event                 | Commands sent to the sink                      |
//! |-----------------------|------------------------------------------------|
//! | `touch_down/up/move`  | one `touch` with the mapped device position    |
//! | `text`                | one `text`, verbatim                           |
//! | `btn_*`               | `key(DOWN)` then `key(UP)` for the key code    |
//! | `backspace`, unknown  | nothing                                        |

use std::sync::Arc;

use relay_core::protocol::events::TouchPoint;
use relay_core::{Action, DevicePoint, InputEvent, KeyCode, Projection};
use thiserror::Error;

/// Error type for input injection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// The device rejected or failed to execute the command.
    #[error("device error: {0}")]
    Device(String),
    /// No device control channel is available.
    #[error("input sink unavailable")]
    Unavailable,
}

/// Device-side input injection.
///
/// Implementations live in the infrastructure layer.  All methods are
/// synchronous and are called while the relay state is locked, so they must
/// return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait InputSink: Send + Sync {
    /// Injects a touch at a device pixel.
    fn touch(&self, action: Action, point: DevicePoint, touch_id: i64) -> Result<(), InjectionError>;

    /// Injects a key press or release.
    fn key(&self, key: KeyCode, action: Action) -> Result<(), InjectionError>;

    /// Injects text as if typed on the device keyboard.
    fn text(&self, text: &str) -> Result<(), InjectionError>;

    /// Turns the device screen on if it is off.
    fn wake(&self) -> Result<(), InjectionError>;
}

/// What the router did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Touch { action: Action, point: DevicePoint },
    Text,
    Key(KeyCode),
    Ignored,
}

/// Dispatches [`InputEvent`]s to an [`InputSink`].
pub struct InputRouter {
    sink: Arc<dyn InputSink>,
}

impl InputRouter {
    /// Creates a router that injects into `sink`.
    pub fn new(sink: Arc<dyn InputSink>) -> Self {
        Self { sink }
    }

    /// Returns the sink this router injects into.
    pub fn sink(&self) -> &Arc<dyn InputSink> {
        &self.sink
    }

    /// Maps and dispatches one event.
    ///
    /// `projection` and `is_rotated` describe the current session; touch
    /// positions are mapped from guest to device space with them.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the sink fails.  For key presses the
    /// release is still attempted when the press fails.
    pub fn dispatch(
        &self,
        event: &InputEvent,
        projection: &Projection,
        is_rotated: bool,
    ) -> Result<Routed, InjectionError> {
        match event {
            InputEvent::TouchDown(p) => self.touch(Action::Down, p, projection, is_rotated),
            InputEvent::TouchUp(p) => self.touch(Action::Up, p, projection, is_rotated),
            InputEvent::TouchMove(p) => self.touch(Action::Move, p, projection, is_rotated),
            InputEvent::Text { text } => {
                self.sink.text(text)?;
                Ok(Routed::Text)
            }
            InputEvent::BtnPower => self.press(KeyCode::Power),
            InputEvent::BtnBack => self.press(KeyCode::Back),
            InputEvent::BtnMultitask => self.press(KeyCode::AppSwitch),
            InputEvent::BtnHome => self.press(KeyCode::Home),
            InputEvent::Backspace | InputEvent::Unknown => Ok(Routed::Ignored),
        }
    }

    fn touch(
        &self,
        action: Action,
        p: &TouchPoint,
        projection: &Projection,
        is_rotated: bool,
    ) -> Result<Routed, InjectionError> {
        let point = projection.to_device(p.touch_x, p.touch_y, is_rotated);
        self.sink.touch(action, point, p.touch_id)?;
        Ok(Routed::Touch { action, point })
    }

    /// Synthetic down + up.
    fn press(&self, key: KeyCode) -> Result<Routed, InjectionError> {
        let down = self.sink.key(key, Action::Down);
        let up = self.sink.key(key, Action::Up);
        down.and(up)?;
        Ok(Routed::Key(key))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
