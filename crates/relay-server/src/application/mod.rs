//! Application layer for relay-server.
//!
//! Orchestrates the relay: it decides *what* happens to each viewer message
//! and each captured frame, and delegates *how* bytes move to the
//! infrastructure layer through two seams:
//!
//! - [`ViewerNotifier`] – delivers events and frames to a connection.
//! - [`InputSink`] – injects touches, keys and text into the device.
//!
//! # What does NOT belong here?
//!
//! - Sockets, HTTP parsing, or WebSocket framing (infrastructure)
//! - Capturing frames from a real display (infrastructure)
//! - The session state machine itself (relay-core)

pub mod frame_pipeline;
pub mod input_router;
pub mod relay_service;
pub mod retry;

pub use frame_pipeline::{encode_jpeg, orient_and_scale, FrameSink, FrameSource};
pub use input_router::{InjectionError, InputRouter, InputSink, Routed};
pub use relay_service::{FrameOutcome, Outbound, RelayService, RelayState, ViewerNotifier};
pub use retry::{retry_with_backoff, CaptureError, RetryPolicy};
