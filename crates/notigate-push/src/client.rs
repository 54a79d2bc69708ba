// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for FCM HTTP v1 sends and Instance ID topic management.

use std::str::FromStr;
use std::time::Duration;

use notigate_core::{
    MessageId, PushData, PushError, PushErrorCode, PushNotification, TopicManagementFailure,
    TopicManagementReport,
};
use reqwest::StatusCode;
use tracing::debug;

use crate::auth::TokenSource;
use crate::types::{BatchRequest, BatchResponse, ErrorResponse, Message, SendRequest, SendResponse, Target};

pub const DEFAULT_BASE_URL: &str = "https://fcm.googleapis.com";
pub const DEFAULT_IID_BASE_URL: &str = "https://iid.googleapis.com";

/// Topic membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOp {
    Subscribe,
    Unsubscribe,
}

impl TopicOp {
    fn endpoint(self) -> &'static str {
        match self {
            TopicOp::Subscribe => "batchAdd",
            TopicOp::Unsubscribe => "batchRemove",
        }
    }
}

fn transport(context: &str) -> impl FnOnce(reqwest::Error) -> PushError + '_ {
    move |e| PushError::new(PushErrorCode::Transport, format!("{context}: {e}"))
}

#[derive(Debug)]
pub struct FcmClient {
    http: reqwest::Client,
    base_url: String,
    iid_base_url: String,
    project_id: String,
    tokens: TokenSource,
}

impl FcmClient {
    pub fn new(project_id: impl Into<String>, tokens: TokenSource) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            iid_base_url: DEFAULT_IID_BASE_URL.to_string(),
            project_id: project_id.into(),
            tokens,
        })
    }

    /// Overrides both endpoints (config overrides, wiremock).
    pub fn with_base_urls(mut self, base_url: &str, iid_base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.iid_base_url = iid_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn send(
        &self,
        target: Target<'_>,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.project_id
        );
        let token = self.tokens.access_token(&self.http).await?;
        let body = SendRequest {
            message: Message::new(target, notification, data),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport("FCM request failed"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(transport("FCM response unreadable"))?;
        debug!(status = %status, ?target, "FCM send response");

        if !status.is_success() {
            return Err(parse_error(status, &text));
        }
        let sent: SendResponse = serde_json::from_str(&text).map_err(|e| {
            PushError::new(PushErrorCode::Unknown, format!("unexpected FCM response: {e}"))
        })?;
        Ok(MessageId(sent.name))
    }

    pub async fn manage_topic(
        &self,
        op: TopicOp,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError> {
        let url = format!("{}/iid/v1:{}", self.iid_base_url, op.endpoint());
        let token = self.tokens.access_token(&self.http).await?;
        let body = BatchRequest {
            to: format!("/topics/{topic}"),
            registration_tokens: tokens,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("access_token_auth", "true")
            .json(&body)
            .send()
            .await
            .map_err(transport("topic request failed"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(transport("topic response unreadable"))?;
        debug!(status = %status, ?op, topic, tokens = tokens.len(), "topic management response");

        if !status.is_success() {
            return Err(parse_error(status, &text));
        }
        let parsed: BatchResponse = serde_json::from_str(&text).map_err(|e| {
            PushError::new(PushErrorCode::Unknown, format!("unexpected topic response: {e}"))
        })?;

        let errors: Vec<TopicManagementFailure> = parsed
            .results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| {
                result
                    .error
                    .map(|reason| TopicManagementFailure { index, reason })
            })
            .collect();
        Ok(TopicManagementReport {
            success_count: tokens.len().saturating_sub(errors.len()),
            failure_count: errors.len(),
            errors,
        })
    }
}

/// Classifies a failed response. The FCM-specific `errorCode` detail wins
/// over the generic RPC status, which wins over the HTTP status.
pub fn parse_error(status: StatusCode, body: &str) -> PushError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => {
            let code = parsed
                .error
                .details
                .iter()
                .find_map(|d| d.error_code.as_deref())
                .or(parsed.error.status.as_deref())
                .map_or_else(|| code_from_status(status), code_from_upstream);
            PushError::new(code, parsed.error.message)
        }
        Err(_) => PushError::new(
            code_from_status(status),
            format!("FCM returned {status}: {body}"),
        ),
    }
}

fn code_from_upstream(code: &str) -> PushErrorCode {
    match code {
        "NOT_FOUND" => PushErrorCode::Unregistered,
        "RESOURCE_EXHAUSTED" => PushErrorCode::QuotaExceeded,
        "UNAUTHENTICATED" => PushErrorCode::PermissionDenied,
        "APNS_AUTH_ERROR" => PushErrorCode::ThirdPartyAuthError,
        other => PushErrorCode::from_str(other).unwrap_or(PushErrorCode::Unknown),
    }
}

fn code_from_status(status: StatusCode) -> PushErrorCode {
    match status.as_u16() {
        400 => PushErrorCode::InvalidArgument,
        401 | 403 => PushErrorCode::PermissionDenied,
        404 => PushErrorCode::Unregistered,
        429 => PushErrorCode::QuotaExceeded,
        500 => PushErrorCode::Internal,
        503 => PushErrorCode::Unavailable,
        _ => PushErrorCode::Unknown,
    }
}
