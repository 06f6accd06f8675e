//! The single guest slot.
//!
//! A relay serves exactly one viewer at a time.  Getting into the slot is a
//! two-step negotiation:
//!
//! 1. **Initiate** – the viewer presents the static connect secret and receives
//!    a fresh single-use [`SessionToken`].
//! 2. **Handshake** – the viewer's live connection presents that token together
//!    with its canvas size.  On success the connection's [`ConnectionHandle`]
//!    becomes the bound viewer.
//!
//! ```text
//!            initiate                handshake ok
//!  Unbound ───────────▶ Issued ───────────────────▶ Bound
//!     ▲                   ▲ │                          │
//!     │                   │ └──── initiate ◀───────────┤ (evicts viewer)
//!     └───────────────────┴─ destroy / disconnect / ───┘
//!                            superseding handshake
//! ```
//!
//! The registry never talks to the network.  Every operation that displaces a
//! viewer reports the displaced handle so the caller can deliver the
//! `destroyed` notification.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::geometry::{Projection, Viewport};

/// Errors returned by [`SessionRegistry`] operations.
///
/// All of them are recoverable and are reported only to the caller that
/// triggered them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The connect secret presented to `initiate` did not match.
    #[error("invalid connect secret")]
    Auth,

    /// The handshake token did not match a pending session, or the slot was
    /// already bound.
    #[error("token mismatch or slot occupied")]
    Handshake,

    /// No frame has been captured yet, so the device viewport is unknown.
    #[error("device screen size is not known yet")]
    DeviceNotReady,

    /// The caller is not the bound viewer.
    #[error("caller does not own the session")]
    Permission,
}

// ── Identity types ────────────────────────────────────────────────────────────

/// Opaque identity of one transport connection.
///
/// The transport assigns a handle when a connection opens and passes it into
/// every registry call made on that connection's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(Uuid);

impl ConnectionHandle {
    /// Allocates a new random handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionHandle {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single-use credential for the second negotiation step.
///
/// 128 bits from the operating system's CSPRNG, encoded as 32 lowercase hex
/// characters.  `Debug` output is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Number of random bytes in a token.
    pub const BYTES: usize = 16;

    /// Generates a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Returns the hex-encoded token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares `candidate` against this token in constant time.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── Connection parameters ─────────────────────────────────────────────────────

/// The negotiated parameters sent to the viewer in the `connected` event.
///
/// ```json
/// {"host":{"width":1080,"height":2400},"guest":{"width":360,"height":800},"timestamp":1700000000000}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Device viewport, normalised so `width <= height`.
    pub host: Viewport,
    /// Viewer canvas as declared in the handshake.
    pub guest: Viewport,
    /// Wall-clock milliseconds since the Unix epoch at which negotiation
    /// completed.  Frame timestamps are relative to this instant.
    pub timestamp: i64,
}

/// A bound viewer together with its negotiated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub viewer: ConnectionHandle,
    pub status: ConnectionStatus,
}

impl Binding {
    /// Returns the device ↔ guest projection for this binding.
    ///
    /// `None` only if a viewport is empty, which the registry never binds.
    pub fn projection(&self) -> Option<Projection> {
        Projection::between(self.status.host, self.status.guest)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Observable phase of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No token pending, no viewer.
    Unbound,
    /// A token was issued and awaits its handshake.
    Issued,
    /// A viewer holds the slot.
    Bound,
}

#[derive(Debug, Clone)]
enum Slot {
    Unbound,
    Issued { token: SessionToken },
    Bound(Binding),
}

/// Result of a successful [`SessionRegistry::initiate`].
#[derive(Debug, Clone)]
pub struct Initiated {
    /// The freshly issued token to hand back to the viewer.
    pub token: SessionToken,
    /// The viewer that was bound before this call, if any.  It must be told
    /// its session was destroyed.
    pub evicted: Option<ConnectionHandle>,
}

/// Result of a [`SessionRegistry::handshake`].
///
/// Eviction happens before the request is evaluated, so a handshake can both
/// displace a viewer and fail.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeOutcome {
    /// The viewer that was bound before this call, if any.
    pub evicted: Option<ConnectionHandle>,
    /// The negotiated parameters, or why the request was refused.
    pub result: Result<ConnectionStatus, SessionError>,
}

/// Owner of the single guest slot.
///
/// The registry is a plain state machine.  Callers are responsible for
/// serialising access (the relay keeps it behind one lock together with the
/// rest of the shared state) and for delivering notifications to evicted
/// viewers.
#[derive(Debug)]
pub struct SessionRegistry {
    connect_secret: String,
    slot: Slot,
}

impl SessionRegistry {
    /// Creates an unbound registry guarded by `connect_secret`.
    ///
    /// An empty secret never matches, so a misconfigured relay refuses every
    /// `initiate` rather than accepting everyone.
    pub fn new(connect_secret: impl Into<String>) -> Self {
        Self {
            connect_secret: connect_secret.into(),
            slot: Slot::Unbound,
        }
    }

    /// Returns the current phase of the slot.
    pub fn phase(&self) -> SessionPhase {
        match self.slot {
            Slot::Unbound => SessionPhase::Unbound,
            Slot::Issued { .. } => SessionPhase::Issued,
            Slot::Bound(_) => SessionPhase::Bound,
        }
    }

    /// Issues a new token if `presented_secret` matches the connect secret.
    ///
    /// Any previous token is invalidated and any bound viewer is evicted.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Auth`] on a secret mismatch; the slot is left
    /// untouched in that case.
    pub fn initiate(&mut self, presented_secret: &str) -> Result<Initiated, SessionError> {
        if self.connect_secret.is_empty()
            || !constant_time_eq(self.connect_secret.as_bytes(), presented_secret.as_bytes())
        {
            return Err(SessionError::Auth);
        }

        let evicted = self.current_viewer();
        let token = SessionToken::generate();
        self.slot = Slot::Issued {
            token: token.clone(),
        };
        Ok(Initiated { token, evicted })
    }

    /// Binds `caller` as the viewer if `candidate_token` matches the pending
    /// token.
    ///
    /// Steps, in order:
    ///
    /// 1. A currently bound viewer is evicted and the slot returns to
    ///    `Unbound`.  Its token was consumed when it bound, so the request is
    ///    then evaluated against an empty slot and fails.
    /// 2. The candidate must match the pending token (an empty slot matches
    ///    nothing, not even an empty candidate).
    /// 3. `device_screen` must be known (non-empty).
    /// 4. The slot binds `caller` with the portrait-normalised device viewport,
    ///    the guest canvas, and `now_millis` as the session start.
    ///
    /// `guest` is expected to be non-empty; payload validation happens before
    /// the registry is consulted.
    pub fn handshake(
        &mut self,
        candidate_token: &str,
        guest: Viewport,
        device_screen: Viewport,
        caller: ConnectionHandle,
        now_millis: i64,
    ) -> HandshakeOutcome {
        let evicted = match self.slot {
            Slot::Bound(binding) => {
                self.slot = Slot::Unbound;
                Some(binding.viewer)
            }
            _ => None,
        };

        let token_ok = match &self.slot {
            Slot::Issued { token } => token.matches(candidate_token),
            _ => false,
        };
        if !token_ok {
            return HandshakeOutcome {
                evicted,
                result: Err(SessionError::Handshake),
            };
        }
        if device_screen.is_empty() {
            return HandshakeOutcome {
                evicted,
                result: Err(SessionError::DeviceNotReady),
            };
        }

        let status = ConnectionStatus {
            host: device_screen.to_portrait(),
            guest,
            timestamp: now_millis,
        };
        self.slot = Slot::Bound(Binding {
            viewer: caller,
            status,
        });
        HandshakeOutcome {
            evicted,
            result: Ok(status),
        }
    }

    /// Tears down the session on behalf of its viewer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Permission`] if `caller` is not the bound
    /// viewer; the slot is left untouched.
    pub fn destroy(&mut self, caller: ConnectionHandle) -> Result<(), SessionError> {
        if !self.is_viewer(caller) {
            return Err(SessionError::Permission);
        }
        self.slot = Slot::Unbound;
        Ok(())
    }

    /// Releases the slot if `caller` (a connection that just went away) was
    /// the bound viewer.  Returns `true` if the slot was released.
    pub fn disconnect(&mut self, caller: ConnectionHandle) -> bool {
        if self.is_viewer(caller) {
            self.slot = Slot::Unbound;
            true
        } else {
            false
        }
    }

    /// Returns `true` if `caller` is the bound viewer.
    pub fn is_viewer(&self, caller: ConnectionHandle) -> bool {
        self.current_viewer() == Some(caller)
    }

    /// Returns the bound viewer, if any.
    pub fn current_viewer(&self) -> Option<ConnectionHandle> {
        self.connection_params().map(|b| b.viewer)
    }

    /// Returns the binding snapshot, if a viewer is bound.
    pub fn connection_params(&self) -> Option<&Binding> {
        match &self.slot {
            Slot::Bound(binding) => Some(binding),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "let-me-in";
    const DEVICE: Viewport = Viewport::new(1080, 2400);
    const GUEST: Viewport = Viewport::new(360, 800);

    fn issued() -> (SessionRegistry, SessionToken) {
        let mut registry = SessionRegistry::new(SECRET);
        let token = registry.initiate(SECRET).unwrap().token;
        (registry, token)
    }

    #[test]
    fn test_new_registry_is_unbound() {
        let registry = SessionRegistry::new(SECRET);
        assert_eq!(registry.phase(), SessionPhase::Unbound);
        assert!(registry.current_viewer().is_none());
    }

    #[test]
    fn test_generated_tokens_are_32_hex_chars_and_distinct() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_debug_output_is_redacted() {
        let token = SessionToken::generate();
        assert!(!format!("{token:?}").contains(token.as_str()));
    }

    #[test]
    fn test_initiate_with_wrong_secret_is_rejected() {
        let mut registry = SessionRegistry::new(SECRET);
        assert_eq!(registry.initiate("nope").unwrap_err(), SessionError::Auth);
        assert_eq!(registry.phase(), SessionPhase::Unbound);
    }

    #[test]
    fn test_empty_configured_secret_rejects_everything() {
        let mut registry = SessionRegistry::new("");
        assert_eq!(registry.initiate("").unwrap_err(), SessionError::Auth);
    }

    #[test]
    fn test_initiate_issues_token() {
        let (registry, token) = issued();
        assert_eq!(registry.phase(), SessionPhase::Issued);
        assert_eq!(token.as_str().len(), 32);
    }

    #[test]
    fn test_handshake_with_issued_token_binds_caller() {
        // Arrange
        let (mut registry, token) = issued();
        let caller = ConnectionHandle::new();

        // Act
        let outcome = registry.handshake(token.as_str(), GUEST, DEVICE, caller, 1_000);

        // Assert
        assert_eq!(outcome.evicted, None);
        let status = outcome.result.unwrap();
        assert_eq!(status.host, DEVICE);
        assert_eq!(status.guest, GUEST);
        assert_eq!(status.timestamp, 1_000);
        assert_eq!(registry.current_viewer(), Some(caller));
        assert_eq!(registry.phase(), SessionPhase::Bound);
    }

    #[test]
    fn test_handshake_normalises_landscape_device_to_portrait() {
        let (mut registry, token) = issued();
        let outcome = registry.handshake(
            token.as_str(),
            GUEST,
            Viewport::new(2400, 1080),
            ConnectionHandle::new(),
            0,
        );
        assert_eq!(outcome.result.unwrap().host, Viewport::new(1080, 2400));
    }

    #[test]
    fn test_handshake_with_wrong_token_fails_and_keeps_token_pending() {
        let (mut registry, token) = issued();

        let outcome = registry.handshake("deadbeef", GUEST, DEVICE, ConnectionHandle::new(), 0);

        assert_eq!(outcome.result, Err(SessionError::Handshake));
        assert_eq!(registry.phase(), SessionPhase::Issued);
        // The genuine token still works afterwards.
        let ok = registry.handshake(token.as_str(), GUEST, DEVICE, ConnectionHandle::new(), 0);
        assert!(ok.result.is_ok());
    }

    #[test]
    fn test_handshake_on_unbound_slot_rejects_empty_token() {
        let mut registry = SessionRegistry::new(SECRET);
        let outcome = registry.handshake("", GUEST, DEVICE, ConnectionHandle::new(), 0);
        assert_eq!(outcome.result, Err(SessionError::Handshake));
    }

    #[test]
    fn test_handshake_before_first_frame_reports_device_not_ready() {
        let (mut registry, token) = issued();

        let outcome = registry.handshake(
            token.as_str(),
            GUEST,
            Viewport::default(),
            ConnectionHandle::new(),
            0,
        );

        assert_eq!(outcome.result, Err(SessionError::DeviceNotReady));
        assert_eq!(registry.phase(), SessionPhase::Issued);
    }

    #[test]
    fn test_second_handshake_with_consumed_token_evicts_and_fails() {
        // Arrange
        let (mut registry, token) = issued();
        let first = ConnectionHandle::new();
        let second = ConnectionHandle::new();
        registry.handshake(token.as_str(), GUEST, DEVICE, first, 0).result.unwrap();

        // Act
        let outcome = registry.handshake(token.as_str(), GUEST, DEVICE, second, 0);

        // Assert
        assert_eq!(outcome.evicted, Some(first));
        assert_eq!(outcome.result, Err(SessionError::Handshake));
        assert!(registry.current_viewer().is_none());
        assert_eq!(registry.phase(), SessionPhase::Unbound);
    }

    #[test]
    fn test_initiate_while_bound_evicts_viewer() {
        let (mut registry, token) = issued();
        let viewer = ConnectionHandle::new();
        registry.handshake(token.as_str(), GUEST, DEVICE, viewer, 0).result.unwrap();

        let initiated = registry.initiate(SECRET).unwrap();

        assert_eq!(initiated.evicted, Some(viewer));
        assert_eq!(registry.phase(), SessionPhase::Issued);
        assert_ne!(initiated.token, token);
    }

    #[test]
    fn test_reinitiate_invalidates_previous_token() {
        let (mut registry, old) = issued();
        let new = registry.initiate(SECRET).unwrap().token;

        let stale = registry.handshake(old.as_str(), GUEST, DEVICE, ConnectionHandle::new(), 0);
        assert_eq!(stale.result, Err(SessionError::Handshake));

        let fresh = registry.handshake(new.as_str(), GUEST, DEVICE, ConnectionHandle::new(), 0);
        assert!(fresh.result.is_ok());
    }

    #[test]
    fn test_destroy_by_viewer_resets_slot() {
        let (mut registry, token) = issued();
        let viewer = ConnectionHandle::new();
        registry.handshake(token.as_str(), GUEST, DEVICE, viewer, 0).result.unwrap();

        registry.destroy(viewer).unwrap();

        assert_eq!(registry.phase(), SessionPhase::Unbound);
    }

    #[test]
    fn test_destroy_by_stranger_is_refused_without_side_effects() {
        let (mut registry, token) = issued();
        let viewer = ConnectionHandle::new();
        registry.handshake(token.as_str(), GUEST, DEVICE, viewer, 0).result.unwrap();

        let result = registry.destroy(ConnectionHandle::new());

        assert_eq!(result, Err(SessionError::Permission));
        assert_eq!(registry.current_viewer(), Some(viewer));
    }

    #[test]
    fn test_destroy_on_issued_slot_is_refused() {
        let (mut registry, _) = issued();
        assert_eq!(
            registry.destroy(ConnectionHandle::new()),
            Err(SessionError::Permission)
        );
        assert_eq!(registry.phase(), SessionPhase::Issued);
    }

    #[test]
    fn test_disconnect_of_viewer_releases_slot() {
        let (mut registry, token) = issued();
        let viewer = ConnectionHandle::new();
        registry.handshake(token.as_str(), GUEST, DEVICE, viewer, 0).result.unwrap();

        assert!(!registry.disconnect(ConnectionHandle::new()));
        assert!(registry.disconnect(viewer));
        assert_eq!(registry.phase(), SessionPhase::Unbound);
    }

    #[test]
    fn test_binding_projection_uses_negotiated_viewports() {
        let (mut registry, token) = issued();
        registry
            .handshake(token.as_str(), GUEST, DEVICE, ConnectionHandle::new(), 0)
            .result
            .unwrap();

        let projection = registry.connection_params().unwrap().projection().unwrap();

        assert_eq!(projection.scale_ratio, 3.0);
        assert_eq!(projection.target, GUEST);
    }

    #[test]
    fn test_connection_status_serializes_host_guest_timestamp() {
        let status = ConnectionStatus {
            host: DEVICE,
            guest: GUEST,
            timestamp: 42,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["host"]["width"], 1080);
        assert_eq!(json["guest"]["height"], 800);
        assert_eq!(json["timestamp"], 42);
    }
}
