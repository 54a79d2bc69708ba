// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combined push + WhatsApp delivery.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use notigate_core::{MessageId, PushData, PushNotification};
use notigate_whatsapp::SendReceipt;
use serde::Serialize;

use crate::error::ApiError;
use crate::server::GatewayState;
use crate::validation::{self, DualRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SendReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DualResults {
    pub fcm: PushOutcome,
    pub whatsapp: ChatOutcome,
    pub errors: Vec<ServiceError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DualResponse {
    pub success: bool,
    pub message: String,
    pub data: DualResults,
    pub sent_at: String,
}

/// POST /send-dual
///
/// Both channels are attempted concurrently. 200 if at least one delivered,
/// 500 otherwise.
pub async fn send_dual(
    State(state): State<GatewayState>,
    payload: Result<Json<DualRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let fcm = body
        .fcm
        .ok_or_else(|| ApiError::BadRequest("fcm is required".into()))?;
    let chat = body
        .whatsapp
        .ok_or_else(|| ApiError::BadRequest("whatsapp is required".into()))?;

    let token = validation::token(&fcm.token)?.to_string();
    let notification = validation::notification(fcm.notification)?;
    let phone_number = validation::required(&chat.phone_number, "whatsapp.phoneNumber")?;
    let message = validation::chat_message(&chat.message, "whatsapp.message")?;

    let (push, whatsapp) = tokio::join!(
        deliver_push(&state, &token, &notification, &fcm.data),
        deliver_chat(&state, phone_number, message),
    );

    let mut errors = Vec::new();
    if let Some(e) = &push.error {
        errors.push(ServiceError {
            service: "fcm",
            message: e.clone(),
        });
    }
    if let Some(e) = &whatsapp.error {
        errors.push(ServiceError {
            service: "whatsapp",
            message: e.clone(),
        });
    }

    let success = push.success || whatsapp.success;
    tracing::info!(
        fcm = push.success,
        whatsapp = whatsapp.success,
        "dual delivery finished"
    );
    let (status, message) = if success {
        (StatusCode::OK, "message delivered on at least one channel")
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "message could not be delivered on any channel",
        )
    };

    let response = DualResponse {
        success,
        message: message.to_string(),
        data: DualResults {
            fcm: push,
            whatsapp,
            errors,
        },
        sent_at: Utc::now().to_rfc3339(),
    };
    Ok((status, Json(response)).into_response())
}

async fn deliver_push(
    state: &GatewayState,
    token: &str,
    notification: &PushNotification,
    data: &PushData,
) -> PushOutcome {
    let result = match state.push() {
        Ok(push) => push
            .send_to_device(token, notification, data)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match result {
        Ok(message_id) => PushOutcome {
            success: true,
            message_id: Some(message_id),
            error: None,
        },
        Err(error) => {
            tracing::warn!(error = %error, "dual delivery: push failed");
            PushOutcome {
                success: false,
                message_id: None,
                error: Some(error),
            }
        }
    }
}

async fn deliver_chat(state: &GatewayState, to: &str, message: &str) -> ChatOutcome {
    let result = match state.whatsapp() {
        Ok(wa) => wa.send_message(to, message).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match result {
        Ok(receipt) => ChatOutcome {
            success: true,
            data: Some(receipt),
            error: None,
        },
        Err(error) => {
            tracing::warn!(error = %error, "dual delivery: WhatsApp failed");
            ChatOutcome {
                success: false,
                data: None,
                error: Some(error),
            }
        }
    }
}
