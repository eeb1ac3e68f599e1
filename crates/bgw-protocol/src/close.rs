// SPDX-License-Identifier: MIT OR Apache-2.0
//! WebSocket close-code taxonomy.
//!
//! Clients route on these: retryable codes re-subscribe with backoff,
//! terminal codes stop. Implementations must surface the code itself to the
//! client transport, never a generic "disconnected".

use serde::{Deserialize, Serialize};

/// Close codes the gateway sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal completion, including "client reconnecting" on replacement.
    Normal = 1000,
    /// The job was canceled.
    Canceled = 1001,
    /// Client protocol violation (malformed JSON, missing `type`).
    ProtocolViolation = 1002,
    /// Policy: missing/expired/mismatched auth token.
    Policy = 1008,
    /// An outbound frame exceeded 32 MiB.
    TooLarge = 1009,
    /// Internal pipeline failure.
    Internal = 1011,
    /// Service restarting.
    Restart = 1012,
    /// Overloaded; try again later.
    TryAgainLater = 1013,
}

impl CloseCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Whether a client should retry the subscription after this close.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal | Self::Restart | Self::TryAgainLater)
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1001 => Some(Self::Canceled),
            1002 => Some(Self::ProtocolViolation),
            1008 => Some(Self::Policy),
            1009 => Some(Self::TooLarge),
            1011 => Some(Self::Internal),
            1012 => Some(Self::Restart),
            1013 => Some(Self::TryAgainLater),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[CloseCode] = &[
        CloseCode::Normal,
        CloseCode::Canceled,
        CloseCode::ProtocolViolation,
        CloseCode::Policy,
        CloseCode::TooLarge,
        CloseCode::Internal,
        CloseCode::Restart,
        CloseCode::TryAgainLater,
    ];

    #[test]
    fn numeric_values_match_rfc_usage() {
        assert_eq!(CloseCode::Normal.as_u16(), 1000);
        assert_eq!(CloseCode::Canceled.as_u16(), 1001);
        assert_eq!(CloseCode::ProtocolViolation.as_u16(), 1002);
        assert_eq!(CloseCode::Policy.as_u16(), 1008);
        assert_eq!(CloseCode::TooLarge.as_u16(), 1009);
        assert_eq!(CloseCode::Internal.as_u16(), 1011);
        assert_eq!(CloseCode::Restart.as_u16(), 1012);
        assert_eq!(CloseCode::TryAgainLater.as_u16(), 1013);
    }

    #[test]
    fn from_u16_roundtrips() {
        for code in ALL {
            assert_eq!(CloseCode::from_u16(code.as_u16()), Some(*code));
        }
        assert_eq!(CloseCode::from_u16(4000), None);
    }

    #[test]
    fn retryability_split() {
        for code in ALL {
            let expect = matches!(
                code,
                CloseCode::Internal | CloseCode::Restart | CloseCode::TryAgainLater
            );
            assert_eq!(code.is_retryable(), expect, "{code:?}");
        }
    }
}
