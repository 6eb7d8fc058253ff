//! In-process realtime transport.
//!
//! Hands the bridge a channel whose messages are pushed by the caller,
//! standing in for the websocket when no server is available.

use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{ChannelMessage, ChannelSpec, RealtimeError, RealtimeTransport};

const CHANNEL_CAPACITY: usize = 64;

/// Transport driven by the caller.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sender: Mutex<Option<mpsc::Sender<ChannelMessage>>>,
    last_spec: Mutex<Option<ChannelSpec>>,
    reject: Mutex<Option<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `subscribe` fail with the given reason.
    pub fn reject_next(&self, reason: impl Into<String>) {
        *self.reject.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.into());
    }

    /// Spec of the most recent subscription.
    pub fn last_spec(&self) -> Option<ChannelSpec> {
        self.last_spec.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Whether a subscriber is still holding the channel.
    pub fn is_subscribed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Deliver a message to the current subscriber. Returns false if none.
    pub async fn send(&self, message: ChannelMessage) -> bool {
        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner()).clone();
        match sender {
            Some(tx) => tx.send(message).await.is_ok(),
            None => false,
        }
    }
}

impl RealtimeTransport for MemoryTransport {
    async fn subscribe(
        &self,
        spec: ChannelSpec,
    ) -> Result<mpsc::Receiver<ChannelMessage>, RealtimeError> {
        if let Some(reason) = self.reject.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(RealtimeError::ChannelError(reason));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        *self.sender.lock().unwrap_or_else(|p| p.into_inner()) = Some(tx);
        *self.last_spec.lock().unwrap_or_else(|p| p.into_inner()) = Some(spec);
        Ok(rx)
    }
}
