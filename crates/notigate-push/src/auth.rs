// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OAuth2 access tokens for the FCM and Instance ID APIs.
//!
//! A service account signs an RS256 JWT assertion and trades it at the token
//! endpoint for a bearer token. Tokens are cached and refreshed shortly
//! before they expire.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use notigate_core::{PushError, PushErrorCode};
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{AssertionClaims, ServiceAccountKey, TokenResponse};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Covers both message sends and Instance ID topic management.
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/firebase.messaging https://www.googleapis.com/auth/cloud-platform";

const ASSERTION_LIFETIME: TimeDelta = TimeDelta::seconds(3600);
const REFRESH_MARGIN: TimeDelta = TimeDelta::seconds(60);

/// `grant_type` for the JWT bearer flow, already form-encoded.
const JWT_BEARER_GRANT: &str = "urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer";

/// Where bearer tokens come from.
#[derive(Debug)]
pub enum TokenSource {
    /// A fixed token. Used against local test servers.
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl TokenSource {
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, PushError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(auth) => auth.access_token(http).await,
        }
    }
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

/// Service-account token exchange with caching.
pub struct ServiceAccountAuth {
    client_email: String,
    key: EncodingKey,
    token_url: String,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    pub fn new(
        key: &ServiceAccountKey,
        token_url: impl Into<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            client_email: key.client_email.clone(),
            key: EncodingKey::from_rsa_pem(key.private_key.as_bytes())?,
            token_url: token_url.into(),
            cache: Mutex::new(None),
        })
    }

    /// Signs the assertion exchanged at the token endpoint.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, PushError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: &self.token_url,
            iat: now.timestamp(),
            exp: (now + ASSERTION_LIFETIME).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key).map_err(|e| {
            PushError::new(
                PushErrorCode::PermissionDenied,
                format!("failed to sign service account assertion: {e}"),
            )
        })
    }

    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, PushError> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(now)) {
            return Ok(cached.token.clone());
        }

        let fresh = self.exchange(http, now).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn exchange(
        &self,
        http: &reqwest::Client,
        now: DateTime<Utc>,
    ) -> Result<CachedToken, PushError> {
        let assertion = self.assertion(now)?;
        // JWTs are base64url segments joined by dots: nothing to escape.
        let body = format!("grant_type={JWT_BEARER_GRANT}&assertion={assertion}");

        let response = http
            .post(&self.token_url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| {
                PushError::new(PushErrorCode::Transport, format!("token request failed: {e}"))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PushError::new(PushErrorCode::Transport, format!("token response unreadable: {e}"))
        })?;
        if !status.is_success() {
            return Err(PushError::new(
                PushErrorCode::PermissionDenied,
                format!("token exchange returned {status}: {text}"),
            ));
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            PushError::new(
                PushErrorCode::Unknown,
                format!("unexpected token response: {e}"),
            )
        })?;
        debug!(
            client_email = %self.client_email,
            expires_in = parsed.expires_in,
            "access token refreshed"
        );
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: now + TimeDelta::seconds(parsed.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_tokens_expire_early() {
        let now = Utc::now();
        let token = CachedToken {
            token: "t".into(),
            expires_at: now + TimeDelta::seconds(90),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + TimeDelta::seconds(31)));
    }

    #[tokio::test]
    async fn static_source_returns_its_token() {
        let http = reqwest::Client::new();
        let source = TokenSource::Static("abc".into());
        assert_eq!(source.access_token(&http).await.unwrap(), "abc");
    }

    #[test]
    fn garbage_private_key_is_rejected() {
        let key = ServiceAccountKey {
            client_email: "x@y".into(),
            private_key: "not a key".into(),
            project_id: None,
            token_uri: None,
        };
        assert!(ServiceAccountAuth::new(&key, DEFAULT_TOKEN_URL).is_err());
    }
}
