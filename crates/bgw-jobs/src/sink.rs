// SPDX-License-Identifier: MIT OR Apache-2.0
//! The socket abstraction the actor owns.
//!
//! The actor never touches axum types directly; the server hands it a boxed
//! [`ProgressSink`] wrapping the upgraded WebSocket, and tests hand it a
//! [`ChannelSink`] that records everything.

use bgw_protocol::CloseCode;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Socket-level failure. The actor treats a failed send as a detached
/// client: state and work continue, the client re-fetches by job id.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("socket gone: {0}")]
    Closed(String),
}

/// Server→client transport owned by exactly one job actor.
#[async_trait]
pub trait ProgressSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError>;
    async fn close(&mut self, code: CloseCode, reason: &str);
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// What a [`ChannelSink`] observed.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Text(String),
    Closed { code: CloseCode, reason: String },
}

/// Test sink: forwards every event into an mpsc channel.
pub struct ChannelSink {
    events: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Build a sink and the receiving end for assertions.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { events: tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError> {
        self.events
            .send(SinkEvent::Text(text))
            .map_err(|_| SinkError::Closed("test receiver dropped".into()))
    }

    async fn close(&mut self, code: CloseCode, reason: &str) {
        let _ = self.events.send(SinkEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_records_in_order() {
        let (mut sink, mut rx) = ChannelSink::pair();
        sink.send_text("one".into()).await.unwrap();
        sink.close(CloseCode::Normal, "done").await;

        assert_eq!(rx.recv().await.unwrap(), SinkEvent::Text("one".into()));
        assert_eq!(
            rx.recv().await.unwrap(),
            SinkEvent::Closed {
                code: CloseCode::Normal,
                reason: "done".into()
            }
        );
    }
}
