//! Domain layer: runtime configuration types.
//!
//! The relay's business rules live in `relay-core`; this module only holds
//! the settings the server is started with.

pub mod config;

pub use config::{CaptureConfig, FrameSourceKind, RelayConfig};
