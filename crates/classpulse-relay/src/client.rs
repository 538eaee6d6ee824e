//! Public handle for the relay connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::connection::connection_loop;
use crate::types::{ChannelOptions, RelayCommand, RelayConfig, RelayEvent};

/// Handle for interacting with the relay connection.
///
/// Every method is fire-and-forget: commands are queued to the background
/// connection task and dropped silently if it has gone away. Subscription
/// status is observed through the event receiver, not through return
/// values.
#[derive(Clone)]
pub struct RelayClient {
    command_tx: mpsc::Sender<RelayCommand>,
    connected: Arc<AtomicBool>,
}

impl RelayClient {
    /// Start the background connection. Returns `(client, event_receiver)`.
    pub fn connect(config: RelayConfig) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(connection_loop(
            config,
            Arc::clone(&connected),
            event_tx,
            command_rx,
        ));

        (
            Self {
                command_tx,
                connected,
            },
            event_rx,
        )
    }

    /// Join a channel.
    pub async fn join(&self, topic: &str, options: ChannelOptions) {
        let _ = self
            .command_tx
            .send(RelayCommand::Join {
                topic: topic.to_string(),
                options,
            })
            .await;
    }

    /// Leave a channel.
    pub async fn leave(&self, topic: &str) {
        let _ = self
            .command_tx
            .send(RelayCommand::Leave {
                topic: topic.to_string(),
            })
            .await;
    }

    /// Send a broadcast event on a channel.
    pub async fn send(&self, topic: &str, event: &str, payload: serde_json::Value) {
        let _ = self
            .command_tx
            .send(RelayCommand::Broadcast {
                topic: topic.to_string(),
                event: event.to_string(),
                payload,
            })
            .await;
    }

    /// Track (or re-track) our presence payload on a channel.
    pub async fn track(&self, topic: &str, payload: serde_json::Value) {
        let _ = self
            .command_tx
            .send(RelayCommand::Track {
                topic: topic.to_string(),
                payload,
            })
            .await;
    }

    /// Stop tracking our presence payload on a channel.
    pub async fn untrack(&self, topic: &str) {
        let _ = self
            .command_tx
            .send(RelayCommand::Untrack {
                topic: topic.to_string(),
            })
            .await;
    }

    /// Whether the websocket is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Leave all channels and close the connection.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(RelayCommand::Shutdown).await;
    }
}
