// SPDX-License-Identifier: MIT OR Apache-2.0
//! The WebSocket progress protocol.
//!
//! Every server-to-client message shares one envelope, `{type, jobId,
//! pipeline, timestamp, version, payload}`, and completion is
//! **summary-only**: the terminal `job_complete` carries counts plus a
//! `resourceId` cache key, and the full (potentially multi-megabyte) result
//! is fetched over plain HTTP. Mobile clients stall parsing multi-MB
//! WebSocket frames long before the platform's 32 MiB frame limit matters.

#![deny(unsafe_code)]

mod close;
mod envelope;
mod inbound;
mod size;

pub use close::CloseCode;
pub use envelope::{
    ErrorPayload, JobCompletePayload, JobProgressPayload, JobStartedPayload, MessageKind,
    ProgressEnvelope, ProtocolError, ReconnectedPayload, PROTOCOL_VERSION,
};
pub use inbound::ClientMessage;
pub use size::{check_outbound_size, SizeCheck, OUTBOUND_HARD_LIMIT, OUTBOUND_WARN_THRESHOLD};
