// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error-to-envelope mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bgw_core::{ResponseEnvelope, ResponseMetadata};
use bgw_error::{ErrorCode, ErrorDto};

/// A handler failure. Always renders the standard envelope with
/// `data: null` and the status the wire code maps to.
#[derive(Debug)]
pub struct ApiError(pub ErrorDto);

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(ErrorDto::new(code, message))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<ErrorDto> for ApiError {
    fn from(dto: ErrorDto) -> Self {
        Self(dto)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: ResponseEnvelope<serde_json::Value> =
            ResponseEnvelope::err(self.0, ResponseMetadata::fresh(0));
        (status, Json(envelope)).into_response()
    }
}
