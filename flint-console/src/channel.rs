use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use flint_common::messages::{Command, Envelope, ProtocolError};

/// What the channel task reports to the controller.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A (re)connect succeeded. The controller refetches the snapshot and
    /// resets sequence tracking; the new connection carries a fresh
    /// serverId / messageNo handshake.
    Connected,
    Message(Envelope),
    Disconnected,
}

/// Command-sending seam. The controller only ever sees this trait, so tests
/// swap in a recording implementation.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send(&self, command: &Command) -> anyhow::Result<()>;
}

/// Handle to the websocket task. Cheap to clone; dropping every clone and
/// the event receiver stops the task.
#[derive(Clone)]
pub struct WsChannel {
    outbound: mpsc::Sender<String>,
}

#[async_trait]
impl MessagingChannel for WsChannel {
    async fn send(&self, command: &Command) -> anyhow::Result<()> {
        let payload = serde_json::to_string(command)?;
        self.outbound
            .send(payload)
            .await
            .map_err(|_| anyhow::anyhow!("messaging channel task has shut down"))
    }
}

const RECONNECT_FLOOR: Duration = Duration::from_secs(1);
const RECONNECT_CEILING: Duration = Duration::from_secs(30);

/// Spawn the reconnecting websocket task for `{messaging_url}/messaging`.
pub fn connect(messaging_url: &str) -> (WsChannel, mpsc::Receiver<ChannelEvent>) {
    let url = format!("{}/messaging", messaging_url.trim_end_matches('/'));
    let (events_tx, events_rx) = mpsc::channel(64);
    let (outbound_tx, outbound_rx) = mpsc::channel(16);
    tokio::spawn(run(url, events_tx, outbound_rx));
    (
        WsChannel {
            outbound: outbound_tx,
        },
        events_rx,
    )
}

async fn run(url: String, events: mpsc::Sender<ChannelEvent>, mut outbound: mpsc::Receiver<String>) {
    let mut backoff = RECONNECT_FLOOR;
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                info!("Connected to messaging channel at {}", url);
                backoff = RECONNECT_FLOOR;
                if events.send(ChannelEvent::Connected).await.is_err() {
                    return;
                }
                let (mut sink, mut stream) = socket.split();
                loop {
                    tokio::select! {
                        frame = stream.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => match Envelope::parse(&text) {
                                Ok(envelope) => {
                                    debug!(
                                        "Message {} from {}",
                                        envelope.message_no, envelope.server_id
                                    );
                                    if events.send(ChannelEvent::Message(envelope)).await.is_err() {
                                        return;
                                    }
                                }
                                Err(error) => warn!("Dropping frame: {}", error),
                            },
                            Some(Ok(WsMessage::Binary(_))) => {
                                warn!("Dropping frame: {}", ProtocolError::NonText)
                            }
                            // Ping/pong is answered by tungstenite itself.
                            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Err(error)) => {
                                warn!("Messaging channel error: {}", error);
                                break;
                            }
                        },
                        command = outbound.recv() => match command {
                            Some(payload) => {
                                if let Err(error) = sink.send(WsMessage::Text(payload)).await {
                                    warn!("Failed to send command: {}", error);
                                    break;
                                }
                            }
                            // Every WsChannel handle is gone.
                            None => return,
                        },
                    }
                }
                if events.send(ChannelEvent::Disconnected).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                warn!("Messaging connection to {} failed: {}", url, error);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(RECONNECT_CEILING);
    }
}
