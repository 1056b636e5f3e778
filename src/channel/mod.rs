//! Messaging channel adapters.
//!
//! ## Design
//! - [`Channel`] is the seam between controllers and transport: send a host
//!   command, send a guest message, subscribe to an inbound event kind.
//! - [`Dispatcher`] holds the subscriber registry shared by every adapter:
//!   subscription id → (kind, mpsc sender). Inbound frames are validated once
//!   and fanned out to subscribers of the matching kind.
//! - [`Subscription`] is a scoped handle. Dropping it unregisters the
//!   subscriber, so a torn-down controller never receives late callbacks.
//!
//! Adapters: [`ws::WsChannel`] talks to a relay server over a websocket;
//! [`memory::MemoryChannel`] is an in-process loopback used by tests and demos.

pub mod memory;
pub mod ws;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::{ChannelError, PayloadError};
use crate::events::{EventKind, Frame, GuestMessage, InboundEvent, OutboundCommand};

pub use memory::MemoryChannel;
pub use ws::{WsChannel, WsConnector};

/// Observable state of the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// A bidirectional channel scoped to one room.
///
/// Sends never block: adapters queue the frame and return. An `Err` means the
/// frame was not queued; nothing reports whether a queued frame was delivered.
pub trait Channel: Send + Sync {
    fn send_command(&self, command: &OutboundCommand) -> Result<(), ChannelError>;

    fn send_message(&self, message: &GuestMessage) -> Result<(), ChannelError>;

    fn subscribe(&self, kind: EventKind) -> Subscription;

    fn status(&self) -> watch::Receiver<ConnectionStatus>;
}

struct Subscriber {
    kind: EventKind,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

type Registry = Arc<Mutex<HashMap<u64, Subscriber>>>;

/// Subscriber registry and inbound fan-out shared by channel adapters.
#[derive(Clone, Default)]
pub struct Dispatcher {
    next_id: Arc<AtomicU64>,
    subscribers: Registry,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `kind`.
    pub fn subscribe(&self, kind: EventKind) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.subscribers.lock() {
            guard.insert(id, Subscriber { kind, tx });
        }
        Subscription {
            id,
            kind,
            rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Validate `frame` and deliver it to every subscriber of its kind.
    ///
    /// Returns the number of subscribers reached. Rejected frames are logged
    /// and dropped.
    pub fn dispatch(&self, frame: Frame) -> Result<usize, PayloadError> {
        let event = match InboundEvent::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping rejected inbound frame");
                return Err(e);
            }
        };

        let kind = event.kind();
        let mut delivered = 0;
        if let Ok(mut guard) = self.subscribers.lock() {
            // Receivers dropped without their Subscription (e.g. mid-shutdown)
            // are pruned here.
            guard.retain(|_, sub| !sub.tx.is_closed());
            for sub in guard.values().filter(|s| s.kind == kind) {
                if sub.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        if delivered == 0 {
            debug!(event = %kind, "inbound event had no subscribers");
        }
        Ok(delivered)
    }

    /// Decode a raw text message and dispatch it.
    pub fn dispatch_text(&self, text: &str) -> Result<usize, PayloadError> {
        match Frame::parse(text) {
            Ok(frame) => self.dispatch(frame),
            Err(e) => {
                warn!(error = %e, "dropping undecodable channel message");
                Err(e)
            }
        }
    }
}

/// A live subscription to one inbound event kind.
///
/// Unregisters itself on drop.
pub struct Subscription {
    id: u64,
    kind: EventKind,
    rx: mpsc::UnboundedReceiver<InboundEvent>,
    registry: Weak<Mutex<HashMap<u64, Subscriber>>>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next event. `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut guard) = registry.lock() {
                guard.remove(&self.id);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
