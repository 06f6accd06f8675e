//! relay-server library crate.
//!
//! A single-guest remote-screen relay: one viewer at a time watches a device
//! screen as a stream of JPEG frames and drives it with touch, key and text
//! input, all over one WebSocket.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Viewer (JSON + binary frames over WebSocket, plain HTTP for /initiate)
//!         ↕
//! [relay-server]
//!   ├── domain/           RelayConfig and its defaults
//!   ├── application/      RelayService (the one lock), input routing,
//!   │                     frame pipeline, bounded retry
//!   └── infrastructure/
//!         ├── http/       axum routes: liveness, /initiate, upgrades
//!         ├── ws_server/  server loop and WebSocket sessions
//!         ├── hub/        per-connection outbound queues
//!         ├── capture/    blocking capture thread
//!         └── storage/    TOML config file
//!         ↕
//! Device (FrameSource in, InputSink out)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `relay-core`, and reaches the
//!   outside world only through the `ViewerNotifier`, `InputSink` and
//!   `FrameSource` traits.
//! - `infrastructure` implements those traits with `tokio`, `axum` and
//!   `image`.

/// Domain layer: configuration types.
pub mod domain;

/// Application layer: the relay service and its collaborators.
pub mod application;

/// Infrastructure layer: network, capture thread, adapters, config file.
pub mod infrastructure;
