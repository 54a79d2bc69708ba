// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Notigate crate.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across adapter traits and process-level operations.
#[derive(Debug, Error)]
pub enum NotigateError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local storage errors (credential directory, temp files, uploads).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel errors (listener bind failure, session not available).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Upstream provider errors (FCM, OAuth token endpoint, messaging bridge).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure reported by a live protocol connection.
///
/// Socket-level failures mean the link itself is gone; everything else is a
/// per-request failure that leaves the connection usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The underlying socket failed or was reset.
    #[error("socket error: {0}")]
    Socket(String),

    /// The connection was closed before a response arrived.
    #[error("connection closed")]
    Closed,

    /// No response arrived within the request deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote endpoint refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The remote endpoint does not implement the requested method.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether this failure means the connection itself is lost.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, TransportError::Socket(_) | TransportError::Closed)
    }
}

/// Stable classification of a push delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PushErrorCode {
    /// Malformed request (bad token format, oversized payload, bad topic).
    InvalidArgument,
    /// The registration token is no longer valid.
    Unregistered,
    /// Sending quota exceeded for the project or device.
    QuotaExceeded,
    /// The upstream service is temporarily unavailable.
    Unavailable,
    /// The upstream service failed internally.
    Internal,
    /// The token belongs to a different sender.
    SenderIdMismatch,
    /// APNs or web push credentials were rejected.
    ThirdPartyAuthError,
    /// The service account lacks permission.
    PermissionDenied,
    /// The request never reached the upstream service.
    Transport,
    /// Any other upstream status.
    Unknown,
}

/// Failure reported by a push provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct PushError {
    pub code: PushErrorCode,
    pub message: String,
}

impl PushError {
    pub fn new(code: PushErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
