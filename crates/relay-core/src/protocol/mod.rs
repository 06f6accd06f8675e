//! Wire formats spoken with the remote viewer.
//!
//! - [`events`] – JSON text events in an `{"event", "data"}` envelope, in both
//!   directions.
//! - [`frame`] – the binary `frame_update_full` payload.
//! - [`http`] – bodies returned by the plain HTTP endpoints.

pub mod events;
pub mod frame;
pub mod http;

use thiserror::Error;

pub use events::{decode_viewer_event, encode_server_event, InputEvent, ServerEvent, ViewerEvent};
pub use frame::{decode_frame_payload, encode_frame_payload, FrameHeader, FRAME_HEADER_SIZE};
pub use http::{InitiateResponse, LivenessResponse};

/// Errors that can occur while decoding data received from a viewer.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A required field is missing or has the wrong type or range.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The envelope names an event the relay does not handle.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The byte slice is shorter than the fixed frame header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The length field of a frame payload disagrees with the bytes present.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    LengthMismatch { declared: i64, available: usize },
}
