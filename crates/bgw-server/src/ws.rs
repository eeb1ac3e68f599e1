// SPDX-License-Identifier: MIT OR Apache-2.0
//! WebSocket plumbing: upgrade, the axum-backed sink, and the read loop.
//!
//! Ownership is one-way: once the upgrade completes, the write half belongs
//! to the job actor (wrapped in [`AxumSink`]) and this module only pumps
//! inbound frames into the actor's mailbox.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use bgw_core::JobId;
use bgw_jobs::{ProgressSink, SinkError};
use bgw_protocol::CloseCode;
use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "jobId")]
    job_id: JobId,
    token: Uuid,
}

/// `GET /ws/progress?jobId=&token=`: token checked before the 101.
pub async fn progress_upgrade(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(handle) = state.registry.get(params.job_id) else {
        return ApiError::auth("unknown job").into_response();
    };
    if !handle.authorize(params.token).await {
        return ApiError::auth("token rejected").into_response();
    }

    let token = params.token;
    ws.on_upgrade(move |socket| drive_socket(socket, handle, token))
}

async fn drive_socket(socket: WebSocket, handle: bgw_jobs::JobHandle, token: Uuid) {
    let (sender, mut receiver) = socket.split();
    if handle.attach(Box::new(AxumSink { sender }), token).await.is_err() {
        // Token died between the pre-check and the upgrade.
        return;
    }

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle.client_frame(text.to_string()),
            Ok(Message::Close(_)) | Err(_) => {
                debug!(job_id = %handle.job_id(), "client side closed");
                break;
            }
            // axum answers pings at the protocol layer.
            Ok(_) => {}
        }
    }
    // Connection loss does not cancel work; the actor keeps running and the
    // client can re-fetch results by job id.
}

/// The actor-owned write half of an upgraded socket.
struct AxumSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ProgressSink for AxumSink {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError> {
        self.sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SinkError::Closed(e.to_string()))
    }

    async fn close(&mut self, code: CloseCode, reason: &str) {
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: reason.to_string().into(),
        };
        let _ = self.sender.send(Message::Close(Some(frame))).await;
    }
}
