// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical data model for the bookgate gateway.
//!
//! Three DTOs ([`Work`], [`Edition`], [`Author`]) are the common shape
//! every provider response is normalized into and every endpoint returns.
//! The crate also carries the response envelope, the per-job state machine,
//! and the quality/completeness scoring shared by the cache TTL policy and
//! the enrichment merge.

#![deny(unsafe_code)]

mod book;
mod envelope;
mod job;
pub mod quality;

pub use book::{
    Author, AuthorExternalIds, BookBundle, BoundingBox, Edition, EditionFormat, Gender,
    ProviderId, ReviewStatus, Work, WorkExternalIds,
};
pub use envelope::{CacheSource, ResponseEnvelope, ResponseMetadata};
pub use job::{JobId, JobState, JobStatus, Pipeline};
