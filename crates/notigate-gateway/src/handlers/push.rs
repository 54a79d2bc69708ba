// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push notification endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::Utc;
use notigate_core::{MessageId, PushError};
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::{Envelope, ok};
use crate::server::GatewayState;
use crate::validation::{
    self, DeviceRequest, MAX_MULTICAST_TOKENS, MulticastRequest, SubscriptionRequest, TopicRequest,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSent {
    pub message_id: MessageId,
    pub sent_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSent {
    pub message_id: MessageId,
    pub topic: String,
    pub sent_at: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&PushError> for ErrorDetail {
    fn from(e: &PushError) -> Self {
        Self {
            code: e.code.to_string(),
            message: e.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutcome {
    pub token: String,
    pub success: bool,
    pub message_id: Option<MessageId>,
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MulticastSent {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<TokenOutcome>,
    pub sent_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMembership {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<notigate_core::TopicManagementFailure>,
    pub topic: String,
    pub updated_at: String,
}

/// POST /send-to-device
pub async fn send_to_device(
    State(state): State<GatewayState>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<Envelope<DeviceSent>>, ApiError> {
    let Json(body) = payload?;
    let token = validation::token(&body.token)?;
    let notification = validation::notification(body.notification)?;
    let push = state.push()?;

    let message_id = push.send_to_device(token, &notification, &body.data).await?;
    Ok(ok(
        "notification sent",
        DeviceSent {
            message_id,
            sent_at: Utc::now().to_rfc3339(),
        },
    ))
}

/// POST /send-to-multiple-devices
pub async fn send_to_multiple_devices(
    State(state): State<GatewayState>,
    payload: Result<Json<MulticastRequest>, JsonRejection>,
) -> Result<Json<Envelope<MulticastSent>>, ApiError> {
    let Json(body) = payload?;
    let tokens = validation::tokens(body.tokens, MAX_MULTICAST_TOKENS)?;
    let notification = validation::notification(body.notification)?;
    let push = state.push()?;

    let report = push
        .send_to_devices(&tokens, &notification, &body.data)
        .await?;
    let responses = report
        .responses
        .into_iter()
        .map(|r| TokenOutcome {
            success: r.error.is_none(),
            error: r.error.as_ref().map(ErrorDetail::from),
            token: r.token,
            message_id: r.message_id,
        })
        .collect();
    Ok(ok(
        format!(
            "notification sent to {} of {} devices",
            report.success_count,
            tokens.len()
        ),
        MulticastSent {
            success_count: report.success_count,
            failure_count: report.failure_count,
            responses,
            sent_at: Utc::now().to_rfc3339(),
        },
    ))
}

/// POST /send-to-topic
pub async fn send_to_topic(
    State(state): State<GatewayState>,
    payload: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<Envelope<TopicSent>>, ApiError> {
    let Json(body) = payload?;
    let topic = validation::topic(&body.topic)?;
    let notification = validation::notification(body.notification)?;
    let push = state.push()?;

    let message_id = push.send_to_topic(topic, &notification, &body.data).await?;
    Ok(ok(
        format!("notification sent to topic {topic}"),
        TopicSent {
            message_id,
            topic: topic.to_string(),
            sent_at: Utc::now().to_rfc3339(),
        },
    ))
}

/// POST /subscribe-to-topic
pub async fn subscribe_to_topic(
    state: State<GatewayState>,
    payload: Result<Json<SubscriptionRequest>, JsonRejection>,
) -> Result<Json<Envelope<TopicMembership>>, ApiError> {
    manage_topic(state, payload, true).await
}

/// POST /unsubscribe-from-topic
pub async fn unsubscribe_from_topic(
    state: State<GatewayState>,
    payload: Result<Json<SubscriptionRequest>, JsonRejection>,
) -> Result<Json<Envelope<TopicMembership>>, ApiError> {
    manage_topic(state, payload, false).await
}

async fn manage_topic(
    State(state): State<GatewayState>,
    payload: Result<Json<SubscriptionRequest>, JsonRejection>,
    subscribe: bool,
) -> Result<Json<Envelope<TopicMembership>>, ApiError> {
    let Json(body) = payload?;
    let tokens = validation::subscription_tokens(body.tokens)?;
    let topic = validation::topic(&body.topic)?;
    let push = state.push()?;

    let (report, verb) = if subscribe {
        (push.subscribe_to_topic(&tokens, topic).await?, "subscribed to")
    } else {
        (
            push.unsubscribe_from_topic(&tokens, topic).await?,
            "unsubscribed from",
        )
    };
    tracing::info!(
        topic,
        subscribe,
        success = report.success_count,
        failure = report.failure_count,
        "topic membership updated"
    );
    Ok(ok(
        format!("{verb} topic {topic}"),
        TopicMembership {
            success_count: report.success_count,
            failure_count: report.failure_count,
            errors: report.errors,
            topic: topic.to_string(),
            updated_at: Utc::now().to_rfc3339(),
        },
    ))
}
