//! Background websocket connection loop with auto-reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use classpulse_common::RelayError;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::handler::dispatch_frame;
use crate::types::{ChannelOptions, RelayCommand, RelayConfig, RelayEvent, RelayFrame};

const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Monotonically increasing ref counter for outgoing frames.
static FRAME_REF: AtomicU64 = AtomicU64::new(1);

fn next_ref() -> Option<String> {
    Some(FRAME_REF.fetch_add(1, Ordering::Relaxed).to_string())
}

/// Channels to restore after a reconnect: join options plus the last
/// tracked presence payload, which must be re-announced or the peer
/// vanishes from everyone else's roster.
#[derive(Clone)]
struct JoinedChannel {
    options: ChannelOptions,
    tracked: Option<serde_json::Value>,
}

type ChannelTable = Arc<Mutex<HashMap<String, JoinedChannel>>>;

// ---------------------------------------------------------------------------
// Frame sink
// ---------------------------------------------------------------------------

/// Shared writer half of the websocket. Serializes frames and swallows
/// send errors; a dead socket is detected by the read loop.
struct FrameSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for FrameSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> FrameSink<S>
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    fn new(writer: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    async fn send(&self, frame: RelayFrame) -> bool {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize frame");
                return false;
            }
        };
        let mut writer = self.inner.lock().await;
        writer.send(WsMessage::Text(json.into())).await.is_ok()
    }

    async fn close(&self) {
        let mut writer = self.inner.lock().await;
        let _ = writer.send(WsMessage::Close(None)).await;
    }
}

fn join_frame(topic: &str, options: &ChannelOptions) -> RelayFrame {
    RelayFrame {
        topic: format!("realtime:{topic}"),
        event: "phx_join".to_string(),
        payload: options.to_join_payload(),
        frame_ref: next_ref(),
    }
}

fn leave_frame(topic: &str) -> RelayFrame {
    RelayFrame {
        topic: format!("realtime:{topic}"),
        event: "phx_leave".to_string(),
        payload: serde_json::json!({}),
        frame_ref: next_ref(),
    }
}

fn track_frame(topic: &str, payload: &serde_json::Value) -> RelayFrame {
    RelayFrame {
        topic: format!("realtime:{topic}"),
        event: "presence".to_string(),
        payload: serde_json::json!({
            "type": "presence",
            "event": "track",
            "payload": payload
        }),
        frame_ref: next_ref(),
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

/// Background task managing the websocket with reconnect and backoff.
pub(crate) async fn connection_loop(
    config: RelayConfig,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::Sender<RelayEvent>,
    command_rx: mpsc::Receiver<RelayCommand>,
) {
    let command_rx = Arc::new(Mutex::new(command_rx));
    let channels: ChannelTable = Arc::new(Mutex::new(HashMap::new()));
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        let url = config.ws_url();
        info!(endpoint = %url.split('?').next().unwrap_or(""), "connecting to relay");

        match tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            tokio_tungstenite::connect_async(&url),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs;
                connected.store(true, Ordering::Relaxed);
                let _ = event_tx.send(RelayEvent::Connected).await;

                let (ws_write, mut ws_read) = ws_stream.split();
                let sink = FrameSink::new(ws_write);

                restore_channels(&sink, &channels).await;

                let heartbeat = tokio::spawn(heartbeat_task(
                    sink.clone(),
                    config.heartbeat_interval_secs,
                ));
                let forwarder = tokio::spawn(command_forwarder(
                    Arc::clone(&command_rx),
                    sink.clone(),
                    Arc::clone(&channels),
                    event_tx.clone(),
                ));

                while let Some(msg_result) = ws_read.next().await {
                    match msg_result {
                        Ok(WsMessage::Text(text)) => {
                            match serde_json::from_str::<RelayFrame>(&text) {
                                Ok(frame) => dispatch_frame(&frame, &event_tx).await,
                                Err(_) => {
                                    debug!(text = %text, "unrecognized frame from relay")
                                }
                            }
                        }
                        Ok(WsMessage::Close(_)) => {
                            info!("relay closed the connection");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "websocket error");
                            break;
                        }
                        _ => {}
                    }
                }

                heartbeat.abort();
                forwarder.abort();
                connected.store(false, Ordering::Relaxed);
                let _ = event_tx.send(RelayEvent::Disconnected).await;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to connect to relay");
                let _ = event_tx
                    .send(RelayEvent::Error(RelayError::ConnectFailed(e.to_string())))
                    .await;
            }
            Err(_elapsed) => {
                warn!("relay connection timed out after {CONNECT_TIMEOUT_SECS}s");
                let _ = event_tx
                    .send(RelayEvent::Error(RelayError::ConnectTimeout(
                        CONNECT_TIMEOUT_SECS,
                    )))
                    .await;
            }
        }

        info!(delay = reconnect_delay, "reconnecting to relay");
        tokio::time::sleep(Duration::from_secs(reconnect_delay)).await;
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }
}

/// Rejoin channels and re-track presence payloads after a reconnect.
async fn restore_channels<S>(sink: &FrameSink<S>, channels: &ChannelTable)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let table = channels.lock().await;
    for (topic, channel) in table.iter() {
        sink.send(join_frame(topic, &channel.options)).await;
        if let Some(payload) = &channel.tracked {
            sink.send(track_frame(topic, payload)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

async fn heartbeat_task<S>(sink: FrameSink<S>, interval_secs: u64)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let frame = RelayFrame {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: serde_json::json!({}),
            frame_ref: next_ref(),
        };
        if !sink.send(frame).await {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Command forwarder
// ---------------------------------------------------------------------------

async fn command_forwarder<S>(
    command_rx: Arc<Mutex<mpsc::Receiver<RelayCommand>>>,
    sink: FrameSink<S>,
    channels: ChannelTable,
    event_tx: mpsc::Sender<RelayEvent>,
) where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut rx = command_rx.lock().await;
    while let Some(command) = rx.recv().await {
        match command {
            RelayCommand::Join { topic, options } => {
                sink.send(join_frame(&topic, &options)).await;
                channels.lock().await.insert(
                    topic,
                    JoinedChannel {
                        options,
                        tracked: None,
                    },
                );
            }
            RelayCommand::Leave { topic } => {
                sink.send(leave_frame(&topic)).await;
                channels.lock().await.remove(&topic);
            }
            RelayCommand::Broadcast {
                topic,
                event,
                payload,
            } => {
                let frame = RelayFrame {
                    topic: format!("realtime:{topic}"),
                    event: "broadcast".to_string(),
                    payload: serde_json::json!({
                        "type": "broadcast",
                        "event": event,
                        "payload": payload
                    }),
                    frame_ref: next_ref(),
                };
                sink.send(frame).await;
            }
            RelayCommand::Track { topic, payload } => {
                sink.send(track_frame(&topic, &payload)).await;
                if let Some(channel) = channels.lock().await.get_mut(&topic) {
                    channel.tracked = Some(payload);
                }
            }
            RelayCommand::Untrack { topic } => {
                let frame = RelayFrame {
                    topic: format!("realtime:{topic}"),
                    event: "presence".to_string(),
                    payload: serde_json::json!({
                        "type": "presence",
                        "event": "untrack"
                    }),
                    frame_ref: next_ref(),
                };
                sink.send(frame).await;
                if let Some(channel) = channels.lock().await.get_mut(&topic) {
                    channel.tracked = None;
                }
            }
            RelayCommand::Shutdown => {
                let table = channels.lock().await;
                for topic in table.keys() {
                    sink.send(leave_frame(topic)).await;
                }
                drop(table);
                sink.close().await;
                let _ = event_tx.send(RelayEvent::Disconnected).await;
                return;
            }
        }
    }
}
