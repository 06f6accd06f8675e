//! RelayService: the single owner of all shared relay state.
//!
//! Two kinds of callers mutate the state concurrently:
//!
//! - the transport, once per inbound viewer message (from any number of
//!   connections, though only one is ever authorized), and
//! - the capture thread, once per captured frame.
//!
//! Everything they touch ([`SessionRegistry`], [`DeviceState`],
//! [`DeliveryPolicy`], the last frame) sits behind one lock, so "evict then
//! bind" and "check the sender is the viewer, then act" are never interleaved
//! with another mutation.
//!
//! Frames are handled in three steps so that resampling does not hold the
//! lock:
//!
//! ```text
//! lock   → observe geometry, snapshot the binding         (drop if unbound)
//! unlock → rotate + resize to the binding's target size
//! lock   → binding unchanged? count, decide, encode, emit, keep last frame
//! ```
//!
//! Notifications leave through a [`ViewerNotifier`]; delivery is
//! fire-and-forget and never blocks the caller.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use image::RgbImage;
use relay_core::domain::session::Binding;
use relay_core::protocol::events::{
    decode_viewer_event, CompensationRequest, HandshakeRequest, MSG_DEVICE_NOT_READY,
    MSG_INVALID_FORM, MSG_INVALID_TOKEN, MSG_NO_PERMISSION_DESTROY, MSG_NO_PERMISSION_SEND,
};
use relay_core::protocol::frame::encode_frame_payload;
use relay_core::protocol::http::InitiateResponse;
use relay_core::{
    ConnectionHandle, ConnectionStatus, DeliveryPolicy, DeviceState, InputEvent, ProtocolError,
    ServerEvent, SessionError, SessionRegistry, Viewport, ViewerEvent,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::frame_pipeline::{encode_jpeg, orient_and_scale};
use crate::application::input_router::{InjectionError, InputRouter, InputSink, Routed};
use crate::application::retry::{retry_with_backoff, CaptureError, RetryPolicy};

// ── Outbound seam ─────────────────────────────────────────────────────────────

/// A message queued for one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A JSON text event.
    Event(ServerEvent),
    /// A binary `frame_update_full` payload.
    Frame(Vec<u8>),
}

/// Delivers messages to connections by handle.
///
/// Implementations must not block and must silently drop messages for
/// handles that are gone or whose queue is full.
pub trait ViewerNotifier: Send + Sync {
    fn notify(&self, to: ConnectionHandle, message: Outbound);
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Everything the lock protects.
#[derive(Debug)]
pub struct RelayState {
    pub registry: SessionRegistry,
    pub device: DeviceState,
    pub policy: DeliveryPolicy,
    /// The most recent resized frame, kept whether or not it was emitted.
    pub last_frame: Option<RgbImage>,
}

/// What happened to one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The source delivered an empty frame; nothing was touched.
    Dropped,
    /// No viewer was bound; only geometry bookkeeping ran.
    NoViewer,
    /// The binding changed while the frame was being resized.
    BindingChanged,
    /// Counted but not admitted by the rate limiter.
    Skipped,
    /// Encoded and queued for the viewer.
    Emitted { bytes: usize },
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Application service behind every transport handler and the capture loop.
pub struct RelayService {
    state: Mutex<RelayState>,
    notifier: Arc<dyn ViewerNotifier>,
    router: InputRouter,
}

impl RelayService {
    /// Creates a service with an unbound session guarded by `connect_secret`.
    pub fn new(
        connect_secret: impl Into<String>,
        notifier: Arc<dyn ViewerNotifier>,
        sink: Arc<dyn InputSink>,
    ) -> Self {
        Self {
            state: Mutex::new(RelayState {
                registry: SessionRegistry::new(connect_secret),
                device: DeviceState::new(),
                policy: DeliveryPolicy::default(),
                last_frame: None,
            }),
            notifier,
            router: InputRouter::new(sink),
        }
    }

    // ── Session negotiation ───────────────────────────────────────────────────

    /// Serves `GET /initiate`: issues a fresh token for a correct secret.
    ///
    /// A viewer bound at that moment is told its session was destroyed.
    pub async fn initiate(&self, presented_secret: &str) -> InitiateResponse {
        let mut state = self.state.lock().await;
        match state.registry.initiate(presented_secret) {
            Ok(initiated) => {
                if let Some(evicted) = initiated.evicted {
                    info!("initiate evicted viewer {evicted}");
                    self.notify(evicted, ServerEvent::Destroyed);
                }
                info!("session token issued");
                InitiateResponse::Ok {
                    token: initiated.token.as_str().to_string(),
                }
            }
            Err(e) => {
                warn!("initiate refused: {e}");
                InitiateResponse::invalid_secret()
            }
        }
    }

    /// Handles the `handshake` event from `caller`.
    ///
    /// On success `caller` receives `connected`; otherwise it receives an
    /// `error`.  A previously bound viewer always receives `destroyed`.
    ///
    /// # Errors
    ///
    /// Returns the [`SessionError`] that was reported to the caller.
    pub async fn handshake(
        &self,
        caller: ConnectionHandle,
        request: &HandshakeRequest,
    ) -> Result<ConnectionStatus, SessionError> {
        let mut state = self.state.lock().await;
        let device_screen = state.device.screen_size();
        let outcome = state.registry.handshake(
            &request.token,
            request.guest_viewport(),
            device_screen,
            caller,
            unix_millis(),
        );

        if let Some(evicted) = outcome.evicted {
            info!("handshake from {caller} evicted viewer {evicted}");
            self.notify(evicted, ServerEvent::Destroyed);
        }

        match outcome.result {
            Ok(connection_status) => {
                info!(
                    "viewer {caller} bound: device {}x{}, guest {}x{}",
                    connection_status.host.width,
                    connection_status.host.height,
                    connection_status.guest.width,
                    connection_status.guest.height
                );
                self.notify(caller, ServerEvent::Connected { connection_status });
                Ok(connection_status)
            }
            Err(e) => {
                warn!("handshake from {caller} refused: {e}");
                let message = match e {
                    SessionError::DeviceNotReady => MSG_DEVICE_NOT_READY,
                    _ => MSG_INVALID_TOKEN,
                };
                self.notify(caller, ServerEvent::error(message));
                Err(e)
            }
        }
    }

    /// Handles the `destroy` event from `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Permission`] if `caller` is not the viewer.
    pub async fn destroy(&self, caller: ConnectionHandle) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        match state.registry.destroy(caller) {
            Ok(()) => {
                info!("viewer {caller} destroyed its session");
                self.notify(caller, ServerEvent::Destroyed);
                Ok(())
            }
            Err(e) => {
                warn!("destroy from {caller} refused: {e}");
                self.notify(caller, ServerEvent::error(MSG_NO_PERMISSION_DESTROY));
                Err(e)
            }
        }
    }

    /// Releases the slot if `caller`'s connection closed while bound.
    pub async fn disconnect(&self, caller: ConnectionHandle) {
        let mut state = self.state.lock().await;
        if state.registry.disconnect(caller) {
            info!("viewer {caller} disconnected; session released");
        }
    }

    /// Handles `set_compensation_ratio` from any connection.
    pub async fn set_compensation_ratio(&self, caller: ConnectionHandle, request: CompensationRequest) {
        let mut state = self.state.lock().await;
        let is_viewer = state.registry.is_viewer(caller);
        if state.policy.set_compensation_ratio(request.ratio) {
            info!(
                "compensation ratio set to {} by {caller} (viewer: {is_viewer})",
                state.policy.compensation_ratio()
            );
        }
    }

    /// Handles an `input_event` from `caller`.
    ///
    /// Sink failures are logged and do not end the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Permission`] (and sends `error` to the caller)
    /// if `caller` is not the viewer.
    pub async fn handle_input_event(
        &self,
        caller: ConnectionHandle,
        event: &InputEvent,
    ) -> Result<(), SessionError> {
        let state = self.state.lock().await;
        let projection = match state.registry.connection_params() {
            Some(binding) if binding.viewer == caller => binding.projection(),
            _ => {
                debug!("input from non-viewer {caller} refused");
                self.notify(caller, ServerEvent::error(MSG_NO_PERMISSION_SEND));
                return Err(SessionError::Permission);
            }
        };
        let Some(projection) = projection else {
            return Ok(());
        };

        match self.router.dispatch(event, &projection, state.device.is_rotated()) {
            Ok(Routed::Ignored) => debug!("input {event:?} ignored"),
            Ok(routed) => debug!("input routed: {routed:?}"),
            Err(e) => warn!("input injection failed: {e}"),
        }
        Ok(())
    }

    /// Decodes one text frame from `caller` and dispatches it.
    ///
    /// Malformed payloads are answered with `error {"Invalid form"}`; unknown
    /// events are ignored.
    pub async fn handle_viewer_message(&self, caller: ConnectionHandle, text: &str) {
        let event = match decode_viewer_event(text) {
            Ok(event) => event,
            Err(ProtocolError::UnknownEvent(name)) => {
                debug!("ignoring unknown event '{name}' from {caller}");
                return;
            }
            Err(e) => {
                warn!("malformed message from {caller}: {e}");
                self.notify(caller, ServerEvent::error(MSG_INVALID_FORM));
                return;
            }
        };

        debug!("{caller} → {}", event.name());
        match event {
            ViewerEvent::Handshake(request) => {
                let _ = self.handshake(caller, &request).await;
            }
            ViewerEvent::Destroy => {
                let _ = self.destroy(caller).await;
            }
            ViewerEvent::SetCompensationRatio(request) => {
                self.set_compensation_ratio(caller, request).await;
            }
            ViewerEvent::InputEvent(input) => {
                let _ = self.handle_input_event(caller, &input).await;
            }
        }
    }

    /// Wakes the device screen through the input sink.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`InjectionError`].
    pub fn wake_device(&self) -> Result<(), InjectionError> {
        self.router.sink().wake()
    }

    // ── Frame pipeline ────────────────────────────────────────────────────────

    /// Runs one captured frame through the pipeline.
    ///
    /// Blocks on the state lock; call from the capture thread only, never
    /// from async code.  Empty frames are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Transient`] if encoding fails.
    pub fn process_frame(&self, frame: &RgbImage) -> Result<FrameOutcome, CaptureError> {
        let captured_at = Instant::now();
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            warn!("frame source delivered an empty {width}x{height} frame; dropped");
            return Ok(FrameOutcome::Dropped);
        }

        // Step 1: geometry bookkeeping and binding snapshot
        let (binding, is_rotated) = {
            let mut state = self.state.blocking_lock();
            let change = state.device.observe_geometry(width, height);
            if change.size_changed {
                info!("device screen size is now {width}x{height}");
            }
            if let Some(rotated) = change.rotation_changed {
                info!("device rotation changed: rotated={rotated}");
            }
            match state.registry.connection_params() {
                Some(binding) => (*binding, state.device.is_rotated()),
                None => return Ok(FrameOutcome::NoViewer),
            }
        };

        // Step 2: resample outside the lock
        let projection = binding
            .projection()
            .ok_or_else(|| CaptureError::Transient("binding has an empty viewport".to_string()))?;
        let scaled = orient_and_scale(frame, is_rotated, projection.target);

        // Step 3: decide and emit against the same binding
        let mut guard = self.state.blocking_lock();
        let state = &mut *guard;
        if state.registry.connection_params() != Some(&binding) {
            return Ok(FrameOutcome::BindingChanged);
        }

        if let Some(fps) = state.device.count_frame(captured_at) {
            info!(
                "observed capture rate {fps:.1} fps (compensation ratio {})",
                state.policy.compensation_ratio()
            );
        }

        let outcome = if state.device.is_emittable(&state.policy) {
            let jpeg = encode_jpeg(&scaled, state.policy.jpeg_quality())?;
            state.device.record_encoded(jpeg.len());
            let elapsed = unix_millis() - binding.status.timestamp;
            self.notifier.notify(
                binding.viewer,
                Outbound::Frame(encode_frame_payload(elapsed, &jpeg)),
            );
            debug!("frame emitted: {} bytes", jpeg.len());
            FrameOutcome::Emitted { bytes: jpeg.len() }
        } else {
            FrameOutcome::Skipped
        };

        state.last_frame = Some(scaled);
        Ok(outcome)
    }

    /// [`process_frame`](Self::process_frame) wrapped in the bounded retry.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Fatal`] once the retry budget is exhausted.
    pub fn process_frame_with_retry(
        &self,
        frame: &RgbImage,
        policy: &RetryPolicy,
    ) -> Result<FrameOutcome, CaptureError> {
        self.retry_recorded(policy, || self.process_frame(frame))
    }

    /// Retries `attempt` under `policy`, keeping the device's consecutive
    /// error count current.
    fn retry_recorded<F>(
        &self,
        policy: &RetryPolicy,
        mut attempt: F,
    ) -> Result<FrameOutcome, CaptureError>
    where
        F: FnMut() -> Result<FrameOutcome, CaptureError>,
    {
        let result = retry_with_backoff(policy, |_| {
            let outcome = attempt();
            self.state.blocking_lock().device.record_attempt(outcome.is_ok());
            outcome
        });
        if let Err(e) = &result {
            tracing::error!("frame pipeline failed permanently: {e}");
        }
        result
    }

    // ── Read-only accessors ───────────────────────────────────────────────────

    /// The bound viewer, if any.
    pub async fn current_viewer(&self) -> Option<ConnectionHandle> {
        self.state.lock().await.registry.current_viewer()
    }

    /// The current binding, if any.
    pub async fn connection_params(&self) -> Option<Binding> {
        self.state.lock().await.registry.connection_params().copied()
    }

    /// The current compensation ratio.
    pub async fn compensation_ratio(&self) -> f64 {
        self.state.lock().await.policy.compensation_ratio()
    }

    /// The last observed raw frame size.
    pub async fn device_screen(&self) -> Viewport {
        self.state.lock().await.device.screen_size()
    }

    /// Size of the last stored (resized) frame.
    pub async fn last_frame_size(&self) -> Option<Viewport> {
        self.state
            .lock()
            .await
            .last_frame
            .as_ref()
            .map(|f| Viewport::new(f.width(), f.height()))
    }

    fn notify(&self, to: ConnectionHandle, event: ServerEvent) {
        self.notifier.notify(to, Outbound::Event(event));
    }
}

/// Wall-clock milliseconds since the Unix epoch.
fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
