//! Loading and validating the relay's TOML configuration file.
//!
//! Every field of [`RelayConfig`] carries a serde default, so a file only
//! needs the keys it wants to change:
//!
//! ```toml
//! connect_secret = "change-me"
//!
//! [capture]
//! max_fps = 30
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::RelayConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The merged configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Reads and parses the configuration file at `path`.
///
/// Unlike a first-run settings file, an explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Checks that a merged configuration can start a relay.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first offending setting.
pub fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    if config.connect_secret.is_empty() {
        return Err(ConfigError::Invalid(
            "connect_secret must be set (--secret or RELAY_CONNECT_SECRET)".to_string(),
        ));
    }
    if config.capture.max_fps == 0 {
        return Err(ConfigError::Invalid("capture.max_fps must be at least 1".to_string()));
    }
    if config.capture.width == 0 || config.capture.height == 0 {
        return Err(ConfigError::Invalid(format!(
            "capture size {}x{} is empty",
            config.capture.width, config.capture.height
        )));
    }
    if config.capture.rotate_every_secs == Some(0) {
        return Err(ConfigError::Invalid(
            "capture.rotate_every_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::DEFAULT_PORT;

    fn temp_config(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("relay-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).expect("write temp config");
        path
    }

    fn valid_config() -> RelayConfig {
        RelayConfig {
            connect_secret: "s3cret".to_string(),
            ..RelayConfig::default()
        }
    }

    #[test]
    fn test_load_config_fills_missing_keys_with_defaults() {
        // Arrange
        let path = temp_config("connect_secret = \"abc\"\n\n[capture]\nmax_fps = 30\n");

        // Act
        let cfg = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // Assert
        assert_eq!(cfg.connect_secret, "abc");
        assert_eq!(cfg.capture.max_fps, 30);
        assert_eq!(cfg.capture.width, 1080);
        assert_eq!(cfg.bind_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_load_config_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("relay-config-does-not-exist.toml");

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_config_malformed_toml_is_parse_error() {
        let path = temp_config("connect_secret = [unterminated");

        let result = load_config(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_accepts_defaults_with_secret() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let result = validate(&RelayConfig::default());
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("connect_secret")));
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let mut cfg = valid_config();
        cfg.capture.max_fps = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_capture_size() {
        let mut cfg = valid_config();
        cfg.capture.height = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rotation_period() {
        let mut cfg = valid_config();
        cfg.capture.rotate_every_secs = Some(0);
        assert!(validate(&cfg).is_err());
    }
}
