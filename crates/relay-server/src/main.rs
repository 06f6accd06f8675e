//! Screen relay: entry point.
//!
//! Serves one device screen to one remote viewer at a time.  The viewer
//! first calls `GET /initiate?token=<secret>` to obtain a one-time token,
//! then opens a WebSocket on the same port and sends it in a `handshake`
//! event.  From then on the relay streams `frame_update_full` binary frames
//! and injects the viewer's touch, key and text input into the device.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML configuration file
//!   --bind <IP>              Listener IP [default: 0.0.0.0]
//!   --port <PORT>            Listener port [default: 5013]
//!   --secret <SECRET>        Shared secret for /initiate (required)
//!   --encoder <NAME>         Encoder name handed to the frame source
//!   --max-fps <N>            Frame source rate cap [default: 120]
//!   --source-width <PX>      Synthetic source width [default: 1080]
//!   --source-height <PX>     Synthetic source height [default: 2400]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable               | Flag        |
//! |------------------------|-------------|
//! | `RELAY_CONFIG`         | `--config`  |
//! | `RELAY_BIND`           | `--bind`    |
//! | `RELAY_PORT`           | `--port`    |
//! | `RELAY_CONNECT_SECRET` | `--secret`  |
//!
//! Precedence is flag / environment, then the config file, then defaults.
//! `RUST_LOG` overrides the configured `log_level`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_server::application::{InputSink, RelayService, RetryPolicy, ViewerNotifier};
use relay_server::domain::RelayConfig;
use relay_server::infrastructure::frame_source::build_source;
use relay_server::infrastructure::input_sink::LoggingInputSink;
use relay_server::infrastructure::storage::{load_config, validate};
use relay_server::infrastructure::{run_server, spawn_capture, ConnectionHub};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Single-guest remote-screen relay.
///
/// Every flag is optional; unset flags fall back to the config file and then
/// to built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "Single-guest remote-screen relay over HTTP + WebSocket",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<IpAddr>,

    /// TCP port for HTTP and WebSocket.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Shared secret a viewer must present to `/initiate`.
    #[arg(long, env = "RELAY_CONNECT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Encoder name passed to the frame source.
    #[arg(long)]
    encoder: Option<String>,

    /// Upper bound on captured frames per second.
    #[arg(long)]
    max_fps: Option<u32>,

    /// Width of the synthetic source in pixels.
    #[arg(long)]
    source_width: Option<u32>,

    /// Height of the synthetic source in pixels.
    #[arg(long)]
    source_height: Option<u32>,
}

impl Cli {
    /// Overlays the flags that were given on top of `config`.
    fn apply(&self, mut config: RelayConfig) -> RelayConfig {
        if let Some(ip) = self.bind {
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(secret) = &self.secret {
            config.connect_secret = secret.clone();
        }
        if let Some(encoder) = &self.encoder {
            config.capture.encoder = Some(encoder.clone());
        }
        if let Some(max_fps) = self.max_fps {
            config.capture.max_fps = max_fps;
        }
        if let Some(width) = self.source_width {
            config.capture.width = width;
        }
        if let Some(height) = self.source_height {
            config.capture.height = height;
        }
        config
    }

    /// Loads the config file (if any), applies the flags, and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// merged configuration is invalid (for example, no secret).
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let base = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };
        let config = self.apply(base);
        validate(&config)?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_relay_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "screen relay starting: listen={}, source={:?} {}x{}, max_fps={}",
        config.bind_addr,
        config.capture.source,
        config.capture.width,
        config.capture.height,
        config.capture.max_fps
    );

    // ── Wiring ────────────────────────────────────────────────────────────────
    let hub = Arc::new(ConnectionHub::new());
    let notifier: Arc<dyn ViewerNotifier> = hub.clone();
    let sink: Arc<dyn InputSink> = Arc::new(LoggingInputSink::new());
    let service = Arc::new(RelayService::new(
        config.connect_secret.clone(),
        notifier,
        sink,
    ));

    if config.capture.stay_awake {
        if let Err(e) = service.wake_device() {
            warn!("could not wake the device screen: {e}");
        }
    }

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Capture + server ──────────────────────────────────────────────────────
    let capture = spawn_capture(
        build_source(&config.capture),
        Arc::clone(&service),
        RetryPolicy::default(),
        Arc::clone(&running),
    );
    let server = run_server(config.bind_addr, service, hub, Arc::clone(&running));

    tokio::select! {
        result = server => result?,
        joined = capture => {
            running.store(false, Ordering::Relaxed);
            joined
                .context("capture thread panicked")?
                .context("capture failed; exiting so a supervisor can restart the relay")?;
            info!("frame source finished");
        }
    }

    running.store(false, Ordering::Relaxed);
    info!("screen relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_server::domain::config::DEFAULT_PORT;
    use std::net::SocketAddr;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("relay-server").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_without_flags_sets_nothing() {
        let parsed = cli(&[]);
        assert!(parsed.port.is_none());
        assert!(parsed.encoder.is_none());
    }

    #[test]
    fn test_cli_without_secret_fails_validation() {
        // Arrange
        let parsed = Cli {
            config: None,
            bind: None,
            port: None,
            secret: None,
            encoder: None,
            max_fps: None,
            source_width: None,
            source_height: None,
        };

        // Act
        let result = parsed.into_relay_config();

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        // Arrange
        let parsed = cli(&[
            "--secret",
            "abc",
            "--bind",
            "127.0.0.1",
            "--port",
            "9000",
            "--max-fps",
            "30",
            "--encoder",
            "c2.hw.avc",
        ]);

        // Act
        let config = parsed.into_relay_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.connect_secret, "abc");
        assert_eq!(config.capture.max_fps, 30);
        assert_eq!(config.capture.encoder.as_deref(), Some("c2.hw.avc"));
    }

    #[test]
    fn test_defaults_apply_when_only_secret_is_given() {
        let config = cli(&["--secret", "abc"]).into_relay_config().unwrap();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.capture.width, 1080);
        assert_eq!(config.capture.height, 2400);
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("relay-main-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "connect_secret = \"from-file\"\n\n[capture]\nmax_fps = 20\nwidth = 720\n",
        )
        .unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        // Act
        let config = cli(&["--config", &path_arg, "--max-fps", "45"])
            .into_relay_config()
            .unwrap();
        std::fs::remove_file(&path).ok();

        // Assert
        assert_eq!(config.connect_secret, "from-file");
        assert_eq!(config.capture.max_fps, 45);
        assert_eq!(config.capture.width, 720);
    }

    #[test]
    fn test_invalid_bind_ip_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["relay-server", "--bind", "not.an.ip"]);
        assert!(result.is_err());
    }
}
