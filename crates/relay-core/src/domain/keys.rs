//! Device key codes and input action codes.
//!
//! The values are the Android `KeyEvent` / `MotionEvent` constants that the
//! device-side control channel expects on the wire.

/// Hardware and navigation keys the viewer can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum KeyCode {
    Home = 3,
    Back = 4,
    Power = 26,
    /// The "recent apps" / multitask key.
    AppSwitch = 187,
}

impl KeyCode {
    /// Returns the numeric key code sent to the device.
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// The phase of a touch or key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Down = 0,
    Up = 1,
    /// Only meaningful for touches.
    Move = 2,
}

impl Action {
    /// Returns the numeric action code sent to the device.
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes_match_device_constants() {
        assert_eq!(KeyCode::Home.code(), 3);
        assert_eq!(KeyCode::Back.code(), 4);
        assert_eq!(KeyCode::Power.code(), 26);
        assert_eq!(KeyCode::AppSwitch.code(), 187);
    }

    #[test]
    fn test_action_codes_match_device_constants() {
        assert_eq!(Action::Down.code(), 0);
        assert_eq!(Action::Up.code(), 1);
        assert_eq!(Action::Move.code(), 2);
    }
}
