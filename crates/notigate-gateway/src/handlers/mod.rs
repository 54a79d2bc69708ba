// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Successful responses share the envelope
//! `{"success": true, "message": ..., "data": ...}`.

pub mod dual;
pub mod push;
pub mod whatsapp;

use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::IntoResponse;
use chrono::Utc;
use notigate_core::{HealthStatus, PluginAdapter};
use serde::Serialize;
use serde_json::{Value, json};

use crate::server::GatewayState;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
    })
}

/// GET /
pub async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Notigate notification gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "documentation": "/api/notifications/health",
        "endpoints": {
            "health": "GET /api/notifications/health",
            "sendToDevice": "POST /api/notifications/send-to-device",
            "sendToMultipleDevices": "POST /api/notifications/send-to-multiple-devices",
            "sendToTopic": "POST /api/notifications/send-to-topic",
            "subscribeToTopic": "POST /api/notifications/subscribe-to-topic",
            "unsubscribeFromTopic": "POST /api/notifications/unsubscribe-from-topic",
            "sendDual": "POST /api/notifications/send-dual",
            "whatsappStatus": "GET /api/notifications/whatsapp/status",
            "whatsappQr": "GET /api/notifications/whatsapp/qr",
            "whatsappSend": "POST /api/notifications/whatsapp/send"
        }
    }))
}

/// GET /api/notifications/health
pub async fn health(State(state): State<GatewayState>) -> Json<Value> {
    let mut checks = Vec::new();
    if let Some(push) = &state.push {
        checks.push(adapter_check(push.as_ref()).await);
    }
    if let Some(wa) = &state.whatsapp {
        checks.push(adapter_check(wa.as_ref()).await);
    }

    Json(json!({
        "success": true,
        "message": "Notigate is running",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
        "push": state.push.is_some(),
        "whatsapp": state.whatsapp.as_ref().map(|wa| wa.status()),
        "checks": checks,
    }))
}

/// One entry of the health `checks` list.
async fn adapter_check<A: PluginAdapter + ?Sized>(adapter: &A) -> Value {
    let (status, detail) = match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => ("healthy", None),
        Ok(HealthStatus::Degraded(detail)) => ("degraded", Some(detail)),
        Ok(HealthStatus::Unhealthy(detail)) => ("unhealthy", Some(detail)),
        Err(e) => ("unhealthy", Some(e.to_string())),
    };
    json!({
        "name": adapter.name(),
        "type": adapter.adapter_type().to_string(),
        "version": adapter.version().to_string(),
        "status": status,
        "detail": detail,
    })
}

pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "endpoint not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
}
