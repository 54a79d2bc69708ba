// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp session endpoints under `/whatsapp`.

use std::str::FromStr;

use axum::Json;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use notigate_core::ParticipantAction;
use notigate_whatsapp::{
    BatchReport, BroadcastTarget, BroadcastTargetInfo, ChatDirectory, ChatSummary,
    ConnectionStatus, DeletionReceipt, ParticipantsReport, SendReceipt, UniversalReceipt,
    render_data_url, render_png,
};
use serde::Serialize;
use serde_json::{Value, json};
use tempfile::NamedTempFile;

use crate::error::ApiError;
use crate::handlers::{Envelope, ok};
use crate::server::GatewayState;
use crate::validation::{
    self, BroadcastImageRequest, BroadcastListImageRequest, BroadcastListMessageRequest,
    BroadcastRequest, ChatImageUrlRequest, ChatMessageRequest, CreateBroadcastListRequest,
    MAX_BROADCAST_RECIPIENTS, MAX_BROADCAST_TARGETS, MAX_IMAGE_BROADCAST_TARGETS,
    MAX_PARTICIPANTS, ParticipantsRequest, UniversalRequest,
};

const QR_PNG_SIZE: u32 = 400;

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;

// --- Connection ---

/// POST /whatsapp/initialize
pub async fn initialize(State(state): State<GatewayState>) -> Reply<ConnectionStatus> {
    let wa = state.whatsapp()?;
    wa.initialize().await?;
    Ok(ok(
        "WhatsApp initialization started, scan the QR code if pairing is required",
        wa.status(),
    ))
}

/// GET /whatsapp/status
pub async fn status(State(state): State<GatewayState>) -> Reply<ConnectionStatus> {
    let wa = state.whatsapp()?;
    Ok(ok("WhatsApp status", wa.status()))
}

/// POST /whatsapp/reconnect
pub async fn reconnect(State(state): State<GatewayState>) -> Reply<ConnectionStatus> {
    let wa = state.whatsapp()?;
    wa.ensure_connection().await?;
    Ok(ok("WhatsApp connection is ready", wa.status()))
}

/// POST /whatsapp/force-reconnect
pub async fn force_reconnect(State(state): State<GatewayState>) -> Reply<ConnectionStatus> {
    let wa = state.whatsapp()?;
    let status = wa.force_reconnect().await?;
    Ok(ok("WhatsApp connection restarted", status))
}

// --- Pairing ---

fn current_pairing_token(state: &GatewayState) -> Result<String, ApiError> {
    state.whatsapp()?.pairing_token().ok_or_else(|| {
        ApiError::NotFound("no QR code available, initialize WhatsApp first".into())
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub success: bool,
    pub qr_code: String,
    pub qr_code_text: String,
    #[serde(rename = "qrImageURL")]
    pub qr_image_url: String,
    pub instructions: Value,
}

/// GET /whatsapp/qr
pub async fn qr(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<QrResponse>, ApiError> {
    let token = current_pairing_token(&state)?;
    let data_url =
        render_data_url(&token).map_err(|e| ApiError::Internal(format!("QR rendering failed: {e}")))?;

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    Ok(Json(QrResponse {
        success: true,
        qr_code: data_url,
        qr_code_text: token,
        qr_image_url: format!("{scheme}://{host}/api/notifications/whatsapp/qr/image"),
        instructions: json!({
            "message": "Scan this QR code with your WhatsApp app",
            "steps": [
                "1. Open WhatsApp on your phone",
                "2. Go to Settings > Linked Devices",
                "3. Tap 'Link a Device'",
                "4. Scan the QR code displayed above"
            ]
        }),
    }))
}

/// GET /whatsapp/qr/image
pub async fn qr_image(State(state): State<GatewayState>) -> Result<Response, ApiError> {
    let token = current_pairing_token(&state)?;
    let png = render_png(&token, QR_PNG_SIZE)
        .map_err(|e| ApiError::Internal(format!("QR rendering failed: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        png,
    )
        .into_response())
}

// --- Direct sends ---

/// POST /whatsapp/send
pub async fn send(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatMessageRequest>, JsonRejection>,
) -> Reply<SendReceipt> {
    let Json(body) = payload?;
    let to = validation::required(&body.phone_number, "phoneNumber")?;
    let message = validation::chat_message(&body.message, "message")?;
    let receipt = state.whatsapp()?.send_message(to, message).await?;
    Ok(ok("WhatsApp message sent", receipt))
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    Ok(field.text().await?)
}

/// POST /whatsapp/send-image (multipart: `phoneNumber`, `caption`, `image`)
///
/// The upload is spooled to a temp file that is removed once the send
/// finishes, whatever its outcome.
pub async fn send_image(
    State(state): State<GatewayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Reply<SendReceipt> {
    let mut multipart = multipart?;
    let mut phone_number = String::new();
    let mut caption = String::new();
    let mut upload: Option<NamedTempFile> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "phoneNumber" => phone_number = field_text(field).await?,
            "caption" => caption = field_text(field).await?,
            "image" => {
                let is_image = field
                    .content_type()
                    .is_some_and(|ct| ct.starts_with("image/"));
                if !is_image {
                    return Err(ApiError::BadRequest(
                        "only image uploads are accepted".into(),
                    ));
                }
                let suffix = field
                    .file_name()
                    .and_then(|f| std::path::Path::new(f).extension())
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_default();
                let bytes = field.bytes().await?;
                upload = Some(spool(&bytes, &suffix).await?);
            }
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }

    let to = validation::required(&phone_number, "phoneNumber")?;
    let file = upload.ok_or_else(|| ApiError::BadRequest("image file is required".into()))?;

    let result = state
        .whatsapp()?
        .send_image_file(to, file.path(), &caption)
        .await;
    if let Err(e) = file.close() {
        tracing::warn!(error = %e, "failed to remove uploaded image");
    }
    Ok(ok("WhatsApp image sent", result?))
}

async fn spool(bytes: &[u8], suffix: &str) -> Result<NamedTempFile, ApiError> {
    let file = tempfile::Builder::new()
        .prefix("notigate-upload-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| ApiError::Internal(format!("cannot create upload file: {e}")))?;
    tokio::fs::write(file.path(), bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot write upload file: {e}")))?;
    tracing::debug!(path = %file.path().display(), bytes = bytes.len(), "spooled upload");
    Ok(file)
}

/// POST /whatsapp/send-image-url
pub async fn send_image_url(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatImageUrlRequest>, JsonRejection>,
) -> Reply<SendReceipt> {
    let Json(body) = payload?;
    let to = validation::required(&body.phone_number, "phoneNumber")?;
    let url = validation::http_url(&body.image_url, "imageUrl")?;
    let receipt = state
        .whatsapp()?
        .send_image_from_url(to, url, &body.caption)
        .await?;
    Ok(ok("WhatsApp image sent", receipt))
}

/// POST /whatsapp/send-universal
pub async fn send_universal(
    State(state): State<GatewayState>,
    payload: Result<Json<UniversalRequest>, JsonRejection>,
) -> Reply<UniversalReceipt> {
    let Json(body) = payload?;
    let to = validation::required(&body.phone_number, "phoneNumber")?;
    let receipt = state
        .whatsapp()?
        .send_universal(
            to,
            body.message.as_deref(),
            body.image_url.as_deref(),
            body.caption.as_deref(),
        )
        .await?;
    let message = if receipt.image_message_id.is_some() {
        "WhatsApp message with image sent"
    } else {
        "WhatsApp text message sent"
    };
    Ok(ok(message, receipt))
}

// --- Batches ---

fn batch_message(report: &BatchReport) -> String {
    format!(
        "broadcast completed: {} successful, {} failed",
        report.successful, report.failed
    )
}

/// POST /whatsapp/broadcast
pub async fn broadcast(
    State(state): State<GatewayState>,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Reply<BatchReport> {
    let Json(body) = payload?;
    let message = validation::chat_message(&body.message, "message")?;
    let targets =
        validation::prefilter_targets(body.phone_numbers, "phoneNumbers", MAX_BROADCAST_TARGETS)?;
    let report = state.whatsapp()?.broadcast_text(&targets, message).await?;
    Ok(ok(batch_message(&report), report))
}

/// POST /whatsapp/broadcast-image
pub async fn broadcast_image(
    State(state): State<GatewayState>,
    payload: Result<Json<BroadcastImageRequest>, JsonRejection>,
) -> Reply<BatchReport> {
    let Json(body) = payload?;
    let url = validation::http_url(&body.image_url, "imageUrl")?;
    let targets = validation::prefilter_targets(
        body.phone_numbers,
        "phoneNumbers",
        MAX_IMAGE_BROADCAST_TARGETS,
    )?;
    let report = state
        .whatsapp()?
        .broadcast_image(&targets, url, &body.caption)
        .await?;
    Ok(ok(batch_message(&report), report))
}

// --- Broadcast targets ---

/// POST /whatsapp/broadcast-list
pub async fn create_broadcast_list(
    State(state): State<GatewayState>,
    payload: Result<Json<CreateBroadcastListRequest>, JsonRejection>,
) -> Reply<BroadcastTarget> {
    let Json(body) = payload?;
    let name = validation::broadcast_name(&body.name)?;
    let recipients =
        validation::prefilter_targets(body.recipients, "recipients", MAX_BROADCAST_RECIPIENTS)?;
    let target = state
        .whatsapp()?
        .create_broadcast_target(name, &recipients)
        .await?;
    Ok(ok(
        format!("broadcast list {} created", target.name),
        target,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastListing {
    pub broadcast_lists: Vec<ChatSummary>,
    pub total: usize,
}

/// GET /whatsapp/broadcast-lists
pub async fn list_broadcast_lists(State(state): State<GatewayState>) -> Reply<BroadcastListing> {
    let lists = state.whatsapp()?.list_broadcast_targets().await?;
    Ok(ok(
        "broadcast lists",
        BroadcastListing {
            total: lists.len(),
            broadcast_lists: lists,
        },
    ))
}

/// GET /whatsapp/broadcast-list/{id}
pub async fn broadcast_list_info(
    State(state): State<GatewayState>,
    id: Result<Path<String>, PathRejection>,
) -> Reply<BroadcastTargetInfo> {
    let Path(id) = id?;
    let info = state.whatsapp()?.broadcast_target_info(&id).await?;
    Ok(ok("broadcast list info", info))
}

/// POST /whatsapp/broadcast-list/send
pub async fn send_to_broadcast_list(
    State(state): State<GatewayState>,
    payload: Result<Json<BroadcastListMessageRequest>, JsonRejection>,
) -> Reply<SendReceipt> {
    let Json(body) = payload?;
    let id = validation::required(&body.broadcast_id, "broadcastId")?;
    let message = validation::chat_message(&body.message, "message")?;
    let receipt = state
        .whatsapp()?
        .send_to_broadcast_target(id, message)
        .await?;
    Ok(ok("message sent to broadcast list", receipt))
}

/// POST /whatsapp/broadcast-list/send-image
pub async fn send_image_to_broadcast_list(
    State(state): State<GatewayState>,
    payload: Result<Json<BroadcastListImageRequest>, JsonRejection>,
) -> Reply<SendReceipt> {
    let Json(body) = payload?;
    let id = validation::required(&body.broadcast_id, "broadcastId")?;
    let url = validation::http_url(&body.image_url, "imageUrl")?;
    let receipt = state
        .whatsapp()?
        .send_image_to_broadcast_target(id, url, &body.caption)
        .await?;
    Ok(ok("image sent to broadcast list", receipt))
}

/// POST /whatsapp/broadcast-list/participants
pub async fn update_participants(
    State(state): State<GatewayState>,
    payload: Result<Json<ParticipantsRequest>, JsonRejection>,
) -> Reply<ParticipantsReport> {
    let Json(body) = payload?;
    let id = validation::required(&body.broadcast_id, "broadcastId")?;
    let action = ParticipantAction::from_str(body.action.trim())
        .map_err(|_| ApiError::BadRequest(r#"action must be "add" or "remove""#.into()))?;
    let participants =
        validation::prefilter_targets(body.participants, "participants", MAX_PARTICIPANTS)?;
    let report = state
        .whatsapp()?
        .update_broadcast_participants(id, action, &participants)
        .await?;
    Ok(ok(
        format!("{} participants updated ({action})", report.participant_count),
        report,
    ))
}

/// DELETE /whatsapp/broadcast-list/{id}
pub async fn delete_broadcast_list(
    State(state): State<GatewayState>,
    id: Result<Path<String>, PathRejection>,
) -> Reply<DeletionReceipt> {
    let Path(id) = id?;
    let receipt = state.whatsapp()?.delete_broadcast_target(&id).await?;
    Ok(ok("broadcast list deleted", receipt))
}

/// GET /whatsapp/chats
pub async fn chats(State(state): State<GatewayState>) -> Reply<ChatDirectory> {
    let directory = state.whatsapp()?.list_chats().await?;
    Ok(ok("chats", directory))
}
