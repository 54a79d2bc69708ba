// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key authentication and origin checks.
//!
//! Requests must carry a configured key in `X-API-Key`. When no keys are
//! configured every authenticated route is rejected (fail-closed).
//! Requests without an `Origin` header are not origin-checked.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    pub api_keys: Arc<[String]>,
    pub allowed_origins: Arc<[String]>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(api_keys: Vec<String>, allowed_origins: Vec<String>) -> Self {
        Self {
            api_keys: api_keys.into(),
            allowed_origins: allowed_origins
                .into_iter()
                .map(|o| o.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

/// Middleware validating `X-API-Key` and, when present, `Origin`.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if auth.api_keys.is_empty() {
        tracing::error!("gateway has no API keys configured -- rejecting request");
        return Err(ApiError::InvalidApiKey);
    }

    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingApiKey)?;
    if !auth.api_keys.iter().any(|k| k == key) {
        tracing::warn!(path = %request.uri().path(), "rejected invalid API key");
        return Err(ApiError::InvalidApiKey);
    }

    if let Some(origin) = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
    {
        if !auth.origin_allowed(origin) {
            return Err(ApiError::OriginDenied(origin.to_string()));
        }
    }

    tracing::debug!(
        key_prefix = %key.chars().take(8).collect::<String>(),
        method = %request.method(),
        path = %request.uri().path(),
        "API request"
    );
    Ok(next.run(request).await)
}
