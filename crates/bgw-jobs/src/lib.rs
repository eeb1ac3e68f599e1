// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-job actors.
//!
//! One actor task owns each job id: its WebSocket, its persisted
//! [`bgw_core::JobState`], its auth token, and its timers. Every operation
//! reaches the actor through one mailbox and is processed strictly in
//! order, which is the property the progress-ordering and auth guarantees
//! lean on. Heavy pipelines are scheduled through a timer so they run
//! detached from the request that created the job, and a 24-hour cleanup
//! timer erases terminal jobs.

#![deny(unsafe_code)]

mod actor;
mod registry;
mod sink;
mod store;
mod throttle;
mod token;

pub use actor::{AttachError, JobActorConfig, JobHandle, RefreshError};
pub use registry::JobRegistry;
pub use sink::{ChannelSink, ProgressSink, SinkError, SinkEvent};
pub use store::{JobStore, MemoryJobStore, StoreError};
pub use throttle::PersistThrottle;
pub use token::{AuthToken, REFRESH_WINDOW, TOKEN_TTL};
