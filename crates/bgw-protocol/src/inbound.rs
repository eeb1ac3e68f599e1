// SPDX-License-Identifier: MIT OR Apache-2.0
//! Messages a client may send over the progress socket.

use crate::envelope::ProtocolError;
use serde::{Deserialize, Serialize};

/// Client→server message. Anything else closes 1002.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The client is attached and listening; progress may start.
    Ready,
    Ping,
    Pong,
    /// Cooperative cancel of the running job.
    Cancel,
}

impl ClientMessage {
    /// Parse an inbound text frame.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingType)?
            .to_string();
        serde_json::from_value(value).map_err(|_| ProtocolError::UnknownType(kind))
    }
}
