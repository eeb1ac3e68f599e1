// SPDX-License-Identifier: MIT OR Apache-2.0
//! Three-tier response cache.
//!
//! One logical cache backed by three tiers: a process-near **edge** tier
//! (milliseconds, short TTL), a durable **KV** tier (tens of milliseconds,
//! long TTL), and a **cold** blob-store index (unbounded retention, keyed by
//! year/month). Reads probe edge → KV → cold and asynchronously promote
//! hits into the warmer tiers. Writes apply a per-namespace TTL scaled by
//! the quality of the cached payload.
//!
//! Cache failures never fail a request: a tier error is logged and treated
//! as a miss, and a failed put is logged and discarded.

#![deny(unsafe_code)]

mod edge;
mod memory;
mod record;
mod tier;
mod tiered;
mod ttl;

pub use edge::MokaEdge;
pub use memory::{MemoryBlobStore, MemoryKv};
pub use record::{CacheRecord, StoredRecord};
pub use tier::{ColdStore, TierError, TierStore};
pub use tiered::{CacheLookup, TierCounters, TieredCache};
pub use ttl::{quality_adjusted_ttl, CacheNamespace, EDGE_TTL_CAP};
