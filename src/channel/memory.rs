//! In-process loopback channel.
//!
//! Records every outbound frame and lets the caller inject inbound frames,
//! so controllers can be driven end to end without a relay server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::{Channel, ConnectionStatus, Dispatcher, Subscription};
use crate::error::{ChannelError, PayloadError};
use crate::events::{EventKind, Frame, GuestMessage, OutboundCommand};

#[derive(Clone)]
pub struct MemoryChannel {
    dispatcher: Dispatcher,
    sent: Arc<Mutex<Vec<Frame>>>,
    closed: Arc<AtomicBool>,
    status: Arc<watch::Sender<ConnectionStatus>>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connected);
        Self {
            dispatcher: Dispatcher::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            status: Arc::new(status),
        }
    }

    /// Deliver `frame` as if it had arrived from the server.
    pub fn inject(&self, frame: Frame) -> Result<usize, PayloadError> {
        self.dispatcher.dispatch(frame)
    }

    /// Deliver a raw text message as if it had arrived from the server.
    pub fn inject_text(&self, text: &str) -> Result<usize, PayloadError> {
        self.dispatcher.dispatch_text(text)
    }

    /// Every frame sent so far, oldest first.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Drain the sent log.
    pub fn take_sent(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .map(|mut g| std::mem::take(&mut *g))
            .unwrap_or_default()
    }

    /// Drain the sent log into `other` as inbound frames.
    ///
    /// Frames `other` rejects are skipped. Returns how many were accepted.
    pub fn forward_sent_to(&self, other: &MemoryChannel) -> usize {
        self.take_sent()
            .into_iter()
            .filter(|frame| other.inject(frame.clone()).is_ok())
            .count()
    }

    /// Simulate a dropped connection: later sends fail with [`ChannelError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.status.send_replace(ConnectionStatus::Disconnected);
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.subscriber_count()
    }

    fn record(&self, frame: Frame) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        let mut guard = self.sent.lock().map_err(|_| ChannelError::Closed)?;
        guard.push(frame);
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn send_command(&self, command: &OutboundCommand) -> Result<(), ChannelError> {
        self.record(command.to_frame()?)
    }

    fn send_message(&self, message: &GuestMessage) -> Result<(), ChannelError> {
        self.record(message.to_frame()?)
    }

    fn subscribe(&self, kind: EventKind) -> Subscription {
        self.dispatcher.subscribe(kind)
    }

    fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}
