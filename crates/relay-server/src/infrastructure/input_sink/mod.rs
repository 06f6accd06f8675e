//! [`InputSink`](crate::application::InputSink) implementations.
//!
//! - [`LoggingInputSink`] – writes every command to the log; the default when
//!   no device control channel is attached.
//! - [`RecordingInputSink`] – keeps every command in memory so tests can
//!   assert on exactly what reached the device.

pub mod logging;
pub mod mock;

pub use logging::LoggingInputSink;
pub use mock::{RecordingInputSink, SinkCommand};
