//! Thin client for the realtime pub/sub relay (Phoenix Channels v1).
//!
//! Wraps the relay websocket with heartbeats, channel join/leave, broadcast
//! send, and presence track/untrack, plus auto-reconnect with backoff that
//! rejoins channels and re-tracks the last presence payload. Everything is
//! command-driven and non-blocking; failures surface as events on the
//! receiver, never as panics in caller code.

mod client;
mod connection;
mod handler;
mod types;

pub use client::RelayClient;
pub use types::{ChannelOptions, PresenceMap, RelayConfig, RelayEvent, RelayFrame};
