//! Domain entities for the screen relay.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies.  Nothing in here opens a socket, spawns a thread or touches
//! pixel data; callers pass in the facts (frame sizes, timestamps, caller
//! handles) and get decisions back.
//!
//! # Sub-modules
//!
//! - **`geometry`** – Device and guest viewports and the mapping between them,
//!   including the 90° rotation applied to landscape frames.
//! - **`session`** – The single guest slot: token issuance, binding a viewer,
//!   eviction, and teardown.
//! - **`scheduler`** – Per-frame bookkeeping: rotation hysteresis, the rolling
//!   frame-rate window, and the admission / quality decisions.
//! - **`keys`** – Device key codes and touch/key action codes.

pub mod geometry;
pub mod keys;
pub mod scheduler;
pub mod session;
