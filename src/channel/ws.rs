//! Websocket channel adapter.
//!
//! Connects to `{base}/ws/{room_id}` on the relay server. Two tasks own the
//! socket halves: the writer drains an unbounded queue of outbound frames, the
//! reader validates inbound text messages and hands them to the
//! [`Dispatcher`]. Both tasks are aborted when the channel is dropped.
//!
//! [`WsChannel::new`] splits creation from connecting so controllers can
//! subscribe before the first inbound frame can arrive.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{Channel, ConnectionStatus, Dispatcher, Subscription};
use crate::error::ChannelError;
use crate::events::{EventKind, Frame, GuestMessage, OutboundCommand};

/// Build the websocket URL for `room_id` from an http(s) or ws(s) base URL.
pub fn ws_url(base_url: &str, room_id: &str) -> Result<String, ChannelError> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(ChannelError::Connect {
            url: base_url.to_string(),
            detail: "unsupported URL scheme".to_string(),
        });
    };

    if room_id.is_empty() || room_id.contains(['/', '?', '#', ' ']) {
        return Err(ChannelError::Connect {
            url: ws_base,
            detail: format!("invalid room id '{room_id}'"),
        });
    }

    Ok(format!("{ws_base}/ws/{room_id}"))
}

type TaskSlot = Arc<Mutex<Option<Vec<JoinHandle<()>>>>>;

pub struct WsChannel {
    url: String,
    outbound: mpsc::UnboundedSender<Frame>,
    dispatcher: Dispatcher,
    status: Arc<watch::Sender<ConnectionStatus>>,
    tasks: TaskSlot,
}

/// Opens the socket for a [`WsChannel`] created with [`WsChannel::new`].
pub struct WsConnector {
    url: String,
    queue: mpsc::UnboundedReceiver<Frame>,
    dispatcher: Dispatcher,
    status: Arc<watch::Sender<ConnectionStatus>>,
    tasks: TaskSlot,
}

impl WsChannel {
    /// A channel for `room_id` that is not connected yet.
    ///
    /// Subscriptions taken before [`WsConnector::connect`] see every frame the
    /// server sends after the upgrade. Frames sent before it are queued and
    /// flushed once the socket opens.
    pub fn new(base_url: &str, room_id: &str) -> Result<(Self, WsConnector), ChannelError> {
        let url = ws_url(base_url, room_id)?;
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let status = Arc::new(status);
        let (outbound, queue) = mpsc::unbounded_channel::<Frame>();
        let dispatcher = Dispatcher::new();
        let tasks: TaskSlot = Arc::new(Mutex::new(Some(Vec::new())));

        let connector = WsConnector {
            url: url.clone(),
            queue,
            dispatcher: dispatcher.clone(),
            status: Arc::clone(&status),
            tasks: Arc::clone(&tasks),
        };
        let channel = Self {
            url,
            outbound,
            dispatcher,
            status,
            tasks,
        };
        Ok((channel, connector))
    }

    /// Open the websocket for `room_id`.
    pub async fn connect(base_url: &str, room_id: &str) -> Result<Self, ChannelError> {
        let (channel, connector) = Self::new(base_url, room_id)?;
        connector.connect().await?;
        Ok(channel)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn enqueue(&self, frame: Frame) -> Result<(), ChannelError> {
        if *self.status.borrow() == ConnectionStatus::Disconnected {
            return Err(ChannelError::Closed);
        }
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }
}

impl WsConnector {
    /// Perform the upgrade and start the reader and writer tasks.
    ///
    /// Fails with [`ChannelError::Closed`] if the channel was already dropped.
    pub async fn connect(self) -> Result<(), ChannelError> {
        let WsConnector {
            url,
            mut queue,
            dispatcher,
            status,
            tasks,
        } = self;
        if tasks.lock().map_or(true, |slot| slot.is_none()) {
            return Err(ChannelError::Closed);
        }

        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| {
                status.send_replace(ConnectionStatus::Disconnected);
                ChannelError::Connect {
                    url: url.clone(),
                    detail: e.to_string(),
                }
            })?;
        status.send_replace(ConnectionStatus::Connected);
        info!(url = %url, "channel connected");

        let (mut sink, mut source) = stream.split();

        let writer_status = Arc::clone(&status);
        let writer_url = url.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, event = %frame.event, "failed to encode frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    warn!(error = %e, url = %writer_url, "channel send failed");
                    break;
                }
            }
            let _ = sink.close().await;
            writer_status.send_replace(ConnectionStatus::Disconnected);
        });

        let reader_status = Arc::clone(&status);
        let reader_url = url.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        // Rejections are logged by the dispatcher.
                        let _ = dispatcher.dispatch_text(&text);
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, url = %reader_url, "channel receive failed");
                        break;
                    }
                }
            }
            debug!(url = %reader_url, "channel reader finished");
            reader_status.send_replace(ConnectionStatus::Disconnected);
        });

        // The channel may have been dropped while the upgrade was in flight.
        let result = match tasks.lock().ok().as_deref_mut().and_then(Option::as_mut) {
            Some(slot) => {
                slot.push(reader);
                slot.push(writer);
                Ok(())
            }
            None => {
                reader.abort();
                writer.abort();
                Err(ChannelError::Closed)
            }
        };
        result
    }
}

impl Channel for WsChannel {
    fn send_command(&self, command: &OutboundCommand) -> Result<(), ChannelError> {
        self.enqueue(command.to_frame()?)
    }

    fn send_message(&self, message: &GuestMessage) -> Result<(), ChannelError> {
        self.enqueue(message.to_frame()?)
    }

    fn subscribe(&self, kind: EventKind) -> Subscription {
        self.dispatcher.subscribe(kind)
    }

    fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        let tasks = self.tasks.lock().ok().and_then(|mut slot| slot.take());
        for task in tasks.into_iter().flatten() {
            task.abort();
        }
    }
}
