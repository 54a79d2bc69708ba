// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API error type and its JSON rendering.
//!
//! Every failure leaves the gateway as `{"success": false, "message": ...}`,
//! with a machine-readable `code` where one exists.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use notigate_core::{PushError, PushErrorCode};
use notigate_whatsapp::SessionError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("API key is required, provide the X-API-Key header")]
    MissingApiKey,

    #[error("the provided API key is not valid")]
    InvalidApiKey,

    #[error("origin {0} is not allowed to access this API")]
    OriginDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("too many requests, try again in {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// The backing service was not enabled in the configuration.
    #[error("{0} is not enabled on this gateway")]
    Disabled(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::OriginDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Disabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Session(e) => session_status(e),
            ApiError::Push(e) => push_status(e.code),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> Option<String> {
        let code = match self {
            ApiError::MissingApiKey | ApiError::InvalidApiKey => "unauthorized",
            ApiError::OriginDenied(_) => "origin_denied",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Disabled(_) => "disabled",
            ApiError::Session(e) => match e {
                SessionError::Validation(_) => "validation",
                SessionError::ConnectionBusy => "connection_busy",
                SessionError::Connection(_) => "not_connected",
                SessionError::PermanentLogout => "logged_out",
                SessionError::ShutDown => "shut_down",
                SessionError::Provider { .. } => "provider",
                SessionError::Credentials(_) => "credentials",
            },
            ApiError::Push(e) => return Some(e.code.to_string()),
            ApiError::BadRequest(_) | ApiError::NotFound(_) | ApiError::Internal(_) => {
                return None;
            }
        };
        Some(code.to_string())
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Validation(_) => StatusCode::BAD_REQUEST,
        SessionError::ConnectionBusy => StatusCode::CONFLICT,
        SessionError::Connection(_) | SessionError::PermanentLogout | SessionError::ShutDown => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SessionError::Provider { .. } => StatusCode::BAD_GATEWAY,
        SessionError::Credentials(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn push_status(code: PushErrorCode) -> StatusCode {
    match code {
        PushErrorCode::InvalidArgument
        | PushErrorCode::SenderIdMismatch
        | PushErrorCode::ThirdPartyAuthError
        | PushErrorCode::PermissionDenied => StatusCode::BAD_REQUEST,
        PushErrorCode::Unregistered => StatusCode::NOT_FOUND,
        PushErrorCode::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        PushErrorCode::Unavailable | PushErrorCode::Internal => StatusCode::SERVICE_UNAVAILABLE,
        PushErrorCode::Transport | PushErrorCode::Unknown => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            message: self.to_string(),
            code: self.code(),
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}
