// Event channel transport
// The engine only needs to know whether the channel is up and how to emit an event.
// Inbound events reach the engine through an mpsc receiver handed out at connect time.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::events::{decode_frame, encode_frame, InboundEvent, OutboundEvent};
use crate::error::{Result, SyncError};

const INBOUND_CHANNEL_SIZE: usize = 100;

pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue an event for delivery. Fails with `NotConnected` when the channel is down.
    fn emit(&self, event: OutboundEvent) -> Result<()>;

    fn close(&self) {}
}

/// WebSocket transport carrying JSON event frames
pub struct WsTransport {
    outgoing: mpsc::UnboundedSender<WsMessage>,
    connected: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Socket URL with the bearer token appended as a percent-encoded `token` query parameter
pub fn socket_endpoint(url: &str, token: &str) -> Result<String> {
    let endpoint = reqwest::Url::parse_with_params(url, &[("token", token)])
        .map_err(|e| SyncError::Transport(format!("invalid socket url {}: {}", url, e)))?;
    Ok(endpoint.to_string())
}

impl WsTransport {
    pub async fn connect(url: &str, token: &str) -> Result<(Self, mpsc::Receiver<InboundEvent>)> {
        let endpoint = socket_endpoint(url, token)?;

        info!("Connecting event channel to {}", url);
        let (stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| SyncError::Transport(format!("failed to connect to {}: {}", url, e)))?;
        info!("Event channel connected");

        let (mut sink, mut source) = stream.split();
        let (event_tx, event_rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<WsMessage>();
        let connected = Arc::new(AtomicBool::new(true));

        let reader_connected = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match decode_frame(&text) {
                        Ok(Some(event)) => {
                            if event_tx.send(event).await.is_err() {
                                debug!("Event receiver dropped, stopping reader");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Dropping malformed event frame: {}", e),
                    },
                    Ok(WsMessage::Close(reason)) => {
                        info!("Event channel closed by server: {:?}", reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Event channel read failed: {}", e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
        });

        let writer_connected = connected.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, WsMessage::Close(_));
                if let Err(e) = sink.send(message).await {
                    error!("Event channel write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_connected.store(false, Ordering::SeqCst);
        });

        Ok((
            WsTransport {
                outgoing,
                connected,
                tasks: Mutex::new(vec![reader, writer]),
            },
            event_rx,
        ))
    }
}

impl Transport for WsTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OutboundEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let text = encode_frame(&event)?;
        debug!("Emitting {} for {}", event.name(), event.conversation_id());
        self.outgoing
            .send(WsMessage::Text(text))
            .map_err(|_| SyncError::NotConnected)
    }

    fn close(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.outgoing.send(WsMessage::Close(None));
            info!("Event channel closing");
        }
        if let Ok(mut tasks) = self.tasks.lock() {
            // The writer gets to flush the close frame; the reader is stopped outright.
            if let Some(reader) = tasks.first() {
                reader.abort();
            }
            tasks.clear();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.lock() {
            for task in tasks.iter() {
                task.abort();
            }
        }
    }
}
