// SPDX-License-Identifier: MIT OR Apache-2.0
//! External metadata providers.
//!
//! Each provider implements the [`BookProvider`] contract: four query
//! operations, a hard 10-second deadline per call, and failure
//! categorization into [`ProviderFailure`]. Provider-specific JSON never
//! leaves this crate; normalizers map every response into the canonical
//! [`bgw_core::BookBundle`] shape tagged with the originating provider.

#![deny(unsafe_code)]

mod contract;
mod google;
mod isbndb;
mod mock;
mod openlibrary;

pub use contract::{with_deadline, BookProvider, ProviderFailure, ProviderResult, PROVIDER_DEADLINE};
pub use google::GoogleBooksProvider;
pub use isbndb::IsbndbProvider;
pub use mock::StaticProvider;
pub use openlibrary::OpenLibraryProvider;
