//! Storage infrastructure: the optional TOML configuration file.
//!
//! The relay never writes configuration back; it only reads the file named
//! with `--config` and validates the merged result before anything binds.

pub mod config;

pub use config::{load_config, validate, ConfigError};
