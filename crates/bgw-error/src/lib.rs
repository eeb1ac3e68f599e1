// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable wire codes for the bookgate gateway.
//!
//! Every gateway error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. The code alone determines the HTTP status a
//! REST caller sees and whether a job-layer caller may retry.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or out-of-bounds caller input. Never retried.
    Validation,
    /// Missing, expired, or mismatched auth token.
    Auth,
    /// Caller exceeded the fixed-window rate limit.
    RateLimit,
    /// The requested resource does not exist.
    NotFound,
    /// An upstream metadata provider failed or timed out.
    Provider,
    /// Catch-all for unexpected internal failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::NotFound => "not_found",
            Self::Provider => "provider",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable wire code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is part of
/// the public API contract and must not change across releases. Provider
/// failures are sanitized into these codes; upstream messages and stack
/// traces never reach clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Validation --
    /// Request body or parameters failed validation.
    InvalidRequest,
    /// The supplied ISBN is not a valid ISBN-10 or ISBN-13.
    InvalidIsbn,
    /// The search query is empty or unusable.
    InvalidQuery,
    /// A required parameter is missing.
    MissingParam,
    /// An uploaded body exceeds the per-file size limit.
    FileTooLarge,
    /// A batch request exceeds the item-count limit.
    BatchTooLarge,

    // -- Lookup --
    /// The requested resource does not exist.
    NotFound,

    // -- Throttling --
    /// The caller exhausted the fixed 60-second window.
    RateLimitExceeded,

    // -- Providers --
    /// All providers in the fan-out failed.
    ProviderError,
    /// A provider did not answer within the 10-second deadline.
    ProviderTimeout,

    // -- Auth --
    /// Missing, expired, or mismatched token.
    AuthError,

    // -- Internal --
    /// Unexpected internal failure.
    InternalError,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest
            | Self::InvalidIsbn
            | Self::InvalidQuery
            | Self::MissingParam
            | Self::FileTooLarge
            | Self::BatchTooLarge => ErrorCategory::Validation,

            Self::NotFound => ErrorCategory::NotFound,

            Self::RateLimitExceeded => ErrorCategory::RateLimit,

            Self::ProviderError | Self::ProviderTimeout => ErrorCategory::Provider,

            Self::AuthError => ErrorCategory::Auth,

            Self::InternalError => ErrorCategory::Internal,
        }
    }

    /// HTTP status code a REST caller receives for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest
            | Self::InvalidIsbn
            | Self::InvalidQuery
            | Self::MissingParam
            | Self::BatchTooLarge => 400,
            Self::AuthError => 401,
            Self::NotFound => 404,
            Self::FileTooLarge => 413,
            Self::RateLimitExceeded => 429,
            Self::ProviderError => 502,
            Self::ProviderTimeout => 504,
            Self::InternalError => 500,
        }
    }

    /// Whether a caller may reasonably retry the same request.
    ///
    /// Validation and auth failures are deterministic; provider and internal
    /// failures are transient.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded
                | Self::ProviderError
                | Self::ProviderTimeout
                | Self::InternalError
        )
    }

    /// Stable `&'static str` representation (e.g. `"INVALID_ISBN"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidIsbn => "INVALID_ISBN",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::MissingParam => "MISSING_PARAM",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::BatchTooLarge => "BATCH_TOO_LARGE",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::AuthError => "AUTH_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Unified gateway error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use bgw_error::{ErrorCode, GatewayError};
///
/// let err = GatewayError::new(ErrorCode::ProviderTimeout, "google-books timed out")
///     .with_context("provider", "google-books")
///     .with_context("deadline_ms", 10_000);
/// assert_eq!(err.code.http_status(), 504);
/// ```
pub struct GatewayError {
    /// Machine-readable wire code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GatewayError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.retryable()`.
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }
}

impl fmt::Debug for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("GatewayError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`GatewayError`] as it appears inside the
/// response envelope's `error` field (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDto {
    /// Wire code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured details; omitted when empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl From<&GatewayError> for ErrorDto {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            details: err.context.clone(),
        }
    }
}

impl From<GatewayError> for ErrorDto {
    fn from(err: GatewayError) -> Self {
        (&err).into()
    }
}

impl ErrorDto {
    /// Build a DTO directly from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
