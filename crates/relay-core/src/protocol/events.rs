//! JSON events exchanged with the viewer over WebSocket text frames.
//!
//! Every text frame is an envelope naming the event and carrying its payload:
//!
//! ```json
//! {"event":"handshake","data":{"token":"3f2a…","guest_width":360,"guest_height":800}}
//! ```
//!
//! Browsers built against the relay's first client send `data` as a string
//! that itself contains JSON (`"data":"{\"ratio\":0.5}"`).  Both forms are
//! accepted; the string is parsed a second time before field validation.
//!
//! # Directions
//!
//! ```text
//! Viewer → Relay:  handshake | destroy | set_compensation_ratio | input_event
//! Relay  → Viewer: connected | error | destroyed   (+ binary frame_update_full)
//! ```
//!
//! Two separate enums keep the directions apart, so the relay cannot
//! accidentally emit an event only a viewer may send.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::geometry::Viewport;
use crate::domain::session::ConnectionStatus;
use crate::protocol::ProtocolError;

/// Reply to any payload that fails validation.
pub const MSG_INVALID_FORM: &str = "Invalid form";
/// Reply to a handshake whose token does not open the slot.
pub const MSG_INVALID_TOKEN: &str = "Invalid second-step token.";
/// Reply to a handshake received before the first frame was captured.
pub const MSG_DEVICE_NOT_READY: &str = "Device screen not ready.";
/// Reply to `destroy` from a connection that is not the viewer.
pub const MSG_NO_PERMISSION_DESTROY: &str = "No permission to destroy.";
/// Reply to `input_event` from a connection that is not the viewer.
pub const MSG_NO_PERMISSION_SEND: &str = "No permission to send.";

// ── Viewer → Relay ────────────────────────────────────────────────────────────

/// Payload of the `handshake` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// The token returned by `/initiate`.
    pub token: String,
    /// Canvas width in CSS pixels.
    pub guest_width: u32,
    /// Canvas height in CSS pixels.
    pub guest_height: u32,
}

impl HandshakeRequest {
    /// The declared canvas as a [`Viewport`].
    pub fn guest_viewport(&self) -> Viewport {
        Viewport::new(self.guest_width, self.guest_height)
    }
}

/// Payload of the `set_compensation_ratio` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensationRequest {
    /// 0.0 = poor link, 1.0 = good link.
    pub ratio: f64,
}

/// Position and pointer id carried by every touch event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    /// Horizontal position on the guest canvas.
    pub touch_x: f64,
    /// Vertical position on the guest canvas.
    pub touch_y: f64,
    /// Pointer id, so multi-touch gestures keep their fingers apart.
    pub touch_id: i64,
}

/// The `input_event` payload, discriminated by its `"type"` field.
///
/// ```json
/// {"type":"touch_down","touch_x":100,"touch_y":200,"touch_id":0}
/// {"type":"text","text":"hello"}
/// {"type":"btn_home"}
/// ```
///
/// Types the relay does not know decode to [`InputEvent::Unknown`] and are
/// accepted without effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    TouchDown(TouchPoint),
    TouchUp(TouchPoint),
    TouchMove(TouchPoint),
    /// Text typed on the viewer's keyboard, injected verbatim.
    Text { text: String },
    BtnPower,
    BtnBack,
    BtnMultitask,
    BtnHome,
    /// Accepted but not forwarded; the device keyboard handles deletion.
    Backspace,
    #[serde(other)]
    Unknown,
}

/// A fully decoded and validated viewer event.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Handshake(HandshakeRequest),
    Destroy,
    SetCompensationRatio(CompensationRequest),
    InputEvent(InputEvent),
}

impl ViewerEvent {
    /// The envelope name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ViewerEvent::Handshake(_) => "handshake",
            ViewerEvent::Destroy => "destroy",
            ViewerEvent::SetCompensationRatio(_) => "set_compensation_ratio",
            ViewerEvent::InputEvent(_) => "input_event",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Decodes and validates one text frame received from a viewer.
///
/// # Errors
///
/// - [`ProtocolError::UnknownEvent`] if the envelope names an event the relay
///   does not handle.
/// - [`ProtocolError::MalformedPayload`] if the frame is not an envelope, or
///   a required field is missing or out of range (zero canvas dimensions, a
///   non-finite ratio).
///
/// # Examples
///
/// ```rust
/// use relay_core::protocol::events::{decode_viewer_event, ViewerEvent};
///
/// let ev = decode_viewer_event(r#"{"event":"destroy"}"#).unwrap();
/// assert_eq!(ev, ViewerEvent::Destroy);
/// ```
pub fn decode_viewer_event(text: &str) -> Result<ViewerEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedPayload(format!("bad envelope: {e}")))?;

    match envelope.event.as_str() {
        "handshake" => {
            let request: HandshakeRequest = decode_payload(envelope.data)?;
            if request.guest_viewport().is_empty() {
                return Err(ProtocolError::MalformedPayload(
                    "guest_width and guest_height must be positive".to_string(),
                ));
            }
            Ok(ViewerEvent::Handshake(request))
        }
        "destroy" => Ok(ViewerEvent::Destroy),
        "set_compensation_ratio" => {
            let request: CompensationRequest = decode_payload(envelope.data)?;
            if !request.ratio.is_finite() {
                return Err(ProtocolError::MalformedPayload(
                    "ratio must be a finite number".to_string(),
                ));
            }
            Ok(ViewerEvent::SetCompensationRatio(request))
        }
        "input_event" => decode_payload(envelope.data).map(ViewerEvent::InputEvent),
        other => Err(ProtocolError::UnknownEvent(other.to_string())),
    }
}

/// Deserializes `data`, unwrapping one level of string-encoded JSON first.
fn decode_payload<T: DeserializeOwned>(data: Value) -> Result<T, ProtocolError> {
    let value = match data {
        Value::String(raw) => serde_json::from_str(&raw)
            .map_err(|e| ProtocolError::MalformedPayload(format!("bad payload string: {e}")))?,
        other => other,
    };
    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

// ── Relay → Viewer ────────────────────────────────────────────────────────────

/// Text events the relay pushes to a connection.
///
/// ```json
/// {"event":"connected","data":{"connection_status":{"host":{…},"guest":{…},"timestamp":…}}}
/// {"event":"error","data":{"message":"No permission to send."}}
/// {"event":"destroyed"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The handshake succeeded; frames follow.
    Connected { connection_status: ConnectionStatus },
    /// A request from this connection was refused.
    Error { message: String },
    /// This connection's session ended (explicit destroy or eviction).
    Destroyed,
}

impl ServerEvent {
    /// Shorthand for an [`ServerEvent::Error`] with a fixed message.
    pub fn error(message: &str) -> Self {
        ServerEvent::Error {
            message: message.to_string(),
        }
    }
}

/// Serializes a [`ServerEvent`] into the JSON text of a WebSocket frame.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if serialization fails.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
