//! ConnectionHub: routes outbound messages to live WebSocket sessions.
//!
//! Each session registers a pair of queues when it opens and removes them
//! when it closes.  The session's writer drains them onto the socket, so
//! [`ViewerNotifier::notify`] never waits on the network.
//!
//! Control events (`connected`, `error`, `destroyed`) travel on an unbounded
//! queue of their own and are drained first.  Frames use a bounded queue: when
//! it is full the viewer cannot keep up, the frame is dropped and the next one
//! replaces it.  A backlog of frames therefore never costs a viewer its
//! `destroyed` notice.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use relay_core::{ConnectionHandle, ServerEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::application::relay_service::{Outbound, ViewerNotifier};

/// Frame queue depth per connection.
pub const FRAME_QUEUE_CAPACITY: usize = 64;

/// Sending halves for one connection.
#[derive(Debug)]
struct Outlets {
    events: mpsc::UnboundedSender<ServerEvent>,
    frames: mpsc::Sender<Vec<u8>>,
}

/// Receiving halves for one connection, owned by its session task.
#[derive(Debug)]
pub struct OutboundReceiver {
    events: mpsc::UnboundedReceiver<ServerEvent>,
    frames: mpsc::Receiver<Vec<u8>>,
}

impl OutboundReceiver {
    /// Waits for the next message; pending events always come before frames.
    ///
    /// Returns `None` once the connection has been unregistered and both
    /// queues are drained.  Cancel-safe.
    pub async fn recv(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            Some(event) = self.events.recv() => Some(Outbound::Event(event)),
            Some(frame) = self.frames.recv() => Some(Outbound::Frame(frame)),
            else => None,
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Outbound> {
        if let Ok(event) = self.events.try_recv() {
            return Some(Outbound::Event(event));
        }
        self.frames.try_recv().ok().map(Outbound::Frame)
    }
}

/// Registry of per-connection outbound queues.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    outlets: Mutex<HashMap<ConnectionHandle, Outlets>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the queues for `handle` and returns their receiving ends.
    pub fn register(&self, handle: ConnectionHandle) -> OutboundReceiver {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);

        let mut outlets = self.outlets();
        outlets.insert(
            handle,
            Outlets {
                events: events_tx,
                frames: frames_tx,
            },
        );
        debug!("connection {handle} registered ({} open)", outlets.len());

        OutboundReceiver {
            events: events_rx,
            frames: frames_rx,
        }
    }

    /// Drops the queues for `handle`; later messages to it are discarded.
    pub fn unregister(&self, handle: ConnectionHandle) {
        let mut outlets = self.outlets();
        if outlets.remove(&handle).is_some() {
            debug!("connection {handle} unregistered ({} open)", outlets.len());
        }
    }

    fn outlets(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, Outlets>> {
        self.outlets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ViewerNotifier for ConnectionHub {
    fn notify(&self, to: ConnectionHandle, message: Outbound) {
        let outlets = self.outlets();
        let Some(outlet) = outlets.get(&to) else {
            debug!("dropping message for closed connection {to}");
            return;
        };
        match message {
            Outbound::Event(event) => {
                if outlet.events.send(event).is_err() {
                    debug!("event queue closed for {to}");
                }
            }
            Outbound::Frame(payload) => match outlet.frames.try_send(payload) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("frame queue full for {to}; frame dropped"),
                Err(TrySendError::Closed(_)) => debug!("frame queue closed for {to}"),
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
