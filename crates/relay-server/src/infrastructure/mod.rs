//! Infrastructure layer for relay-server.
//!
//! Everything that touches sockets, threads, or files lives here:
//!
//! - `ws_server` – axum server loop, WebSocket sessions
//! - `http`      – axum routes for liveness, `/initiate`, and upgrades
//! - `hub`       – per-connection outbound queues ([`ViewerNotifier`])
//! - `capture`   – the blocking capture thread
//! - `frame_source`, `input_sink` – device-side adapters
//! - `storage`   – the TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Session rules, admission, or coordinate mapping (relay-core)
//! - Deciding who may do what (the application layer)
//!
//! [`ViewerNotifier`]: crate::application::ViewerNotifier

pub mod capture;
pub mod frame_source;
pub mod http;
pub mod hub;
pub mod input_sink;
pub mod storage;
pub mod ws_server;

pub use capture::spawn_capture;
pub use hub::ConnectionHub;
pub use ws_server::{run_server, serve};
