//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.  It
//! is assembled at startup from three layers, highest priority first:
//!
//! 1. command-line flags and their environment variables,
//! 2. the optional TOML file passed with `--config`,
//! 3. the defaults below.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads in here) makes the relay easy to embed in tests.
//!
//! ```toml
//! bind_addr = "0.0.0.0:5013"
//! connect_secret = "change-me"
//! log_level = "info"
//!
//! [capture]
//! source = "synthetic"
//! max_fps = 60
//! width = 1080
//! height = 2400
//! stay_awake = true
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Port the relay listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5013;

/// All runtime configuration for the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address the HTTP + WebSocket listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Shared secret presented to `/initiate`.  Must not be empty.
    #[serde(default)]
    pub connect_secret: String,

    /// Frame source settings.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which frame source feeds the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSourceKind {
    /// Generated test pattern; needs no device.
    #[default]
    Synthetic,
}

/// Settings handed to the frame source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub source: FrameSourceKind,

    /// Encoder name passed through to the source (e.g. a hardware codec).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,

    /// Upper bound on frames produced per second.
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,

    /// Raw frame width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Raw frame height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Wake the device screen once at startup.
    #[serde(default = "default_true")]
    pub stay_awake: bool,

    /// Swap width and height every N seconds (synthetic source only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_every_secs: Option<u64>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_fps() -> u32 {
    120
}
fn default_width() -> u32 {
    1080
}
fn default_height() -> u32 {
    2400
}
fn default_true() -> bool {
    true
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            connect_secret: String::new(),
            capture: CaptureConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: FrameSourceKind::default(),
            encoder: None,
            max_fps: default_max_fps(),
            width: default_width(),
            height: default_height(),
            stay_awake: default_true(),
            rotate_every_secs: None,
        }
    }
}
