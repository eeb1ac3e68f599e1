// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache warming and scheduled maintenance.
//!
//! The warming consumer drains `{author, depth}` messages and replays them
//! through [`bgw_enrich::SearchService`], the same code path the live
//! search endpoints use, so the keys it populates are exactly the keys
//! live traffic reads. Messages that keep failing land in a dead-letter
//! queue with a depth gauge for monitoring. Alongside it run the scheduled
//! jobs: the daily cover harvest, the daily cold-tier archival, and the
//! 15-minute alert sweep.

#![deny(unsafe_code)]

mod alerts;
mod archive;
mod harvest;
mod queue;
mod schedule;

pub use alerts::{Alert, AlertKind, AlertMonitor, AlertThresholds};
pub use archive::{Archiver, KeyJournal};
pub use harvest::{CoverHarvester, RecentIsbnLog};
pub use queue::{DeadLetter, WarmingConsumer, WarmingMessage, WarmingQueue, MAX_WARMING_DEPTH};
pub use schedule::spawn_recurring;
