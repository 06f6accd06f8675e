//! # relay-core
//!
//! Shared library for the screen relay containing the session state machine,
//! the adaptive frame scheduler, the device/guest geometry mapper, and the
//! wire formats spoken with the remote viewer.
//!
//! It has zero dependencies on sockets, threads, or image codecs.  The
//! `relay-server` crate wires these pieces to a real transport, a frame source
//! and an input sink.
//!
//! # Architecture overview
//!
//! The relay mirrors one device screen to exactly one remote viewer (the
//! "guest").  Frames flow from the device to the guest; touch and key events
//! flow back.
//!
//! - **`domain`** – Pure business logic.  The most important pieces are the
//!   [`SessionRegistry`] (who is allowed to watch and control the device), the
//!   [`DeviceState`] / [`DeliveryPolicy`] pair (how many frames to send and at
//!   what quality), and the [`Projection`] between device pixels and guest
//!   pixels.
//!
//! - **`protocol`** – How bytes travel to and from the viewer: JSON events
//!   wrapped in an `{"event", "data"}` envelope, and the binary
//!   `frame_update_full` payload with its 16-byte timing header.

pub mod domain;
pub mod protocol;

pub use domain::geometry::{DevicePoint, Projection, Viewport};
pub use domain::keys::{Action, KeyCode};
pub use domain::scheduler::{is_frame_emittable, DeliveryPolicy, DeviceState};
pub use domain::session::{
    Binding, ConnectionHandle, ConnectionStatus, SessionError, SessionRegistry, SessionToken,
};
pub use protocol::events::{InputEvent, ServerEvent, ViewerEvent};
pub use protocol::ProtocolError;
