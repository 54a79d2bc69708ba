// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Notigate crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::PushError;

/// Unique identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    PushProvider,
    Protocol,
}

// --- Protocol session types ---

/// Persisted authentication material for the messaging protocol.
///
/// `current` is the primary credential record; `keys` holds the auxiliary
/// signal keys, indexed by their protocol name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub current: Option<serde_json::Value>,
    #[serde(default)]
    pub keys: BTreeMap<String, serde_json::Value>,
}

impl Credentials {
    /// True when no pairing has ever completed.
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.keys.is_empty()
    }
}

/// A credential rotation pushed by the protocol.
///
/// A `None` key value means the key was deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialUpdate {
    pub current: Option<serde_json::Value>,
    #[serde(default)]
    pub keys: BTreeMap<String, Option<serde_json::Value>>,
}

/// Why the protocol closed a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Credentials were invalidated remotely. Never retried automatically.
    LoggedOut,
    ConnectionLost,
    ConnectionClosed,
    TimedOut,
    Replaced,
    RestartRequired,
    Other(String),
}

impl DisconnectReason {
    pub fn from_code(code: &str) -> Self {
        match code {
            "logged_out" => DisconnectReason::LoggedOut,
            "connection_lost" => DisconnectReason::ConnectionLost,
            "connection_closed" => DisconnectReason::ConnectionClosed,
            "timed_out" => DisconnectReason::TimedOut,
            "replaced" => DisconnectReason::Replaced,
            "restart_required" => DisconnectReason::RestartRequired,
            other => DisconnectReason::Other(other.to_string()),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, DisconnectReason::LoggedOut)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            DisconnectReason::LoggedOut => "logged_out",
            DisconnectReason::ConnectionLost => "connection_lost",
            DisconnectReason::ConnectionClosed => "connection_closed",
            DisconnectReason::TimedOut => "timed_out",
            DisconnectReason::Replaced => "replaced",
            DisconnectReason::RestartRequired => "restart_required",
            DisconnectReason::Other(code) => code,
        };
        f.write_str(code)
    }
}

/// A change in the protocol link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    Open,
    Close(DisconnectReason),
}

/// A message delivered by the protocol, payload left undecoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Raw chat address the message arrived on.
    pub remote: String,
    /// Sender within a group or broadcast, when the protocol reports one.
    #[serde(default)]
    pub participant: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    /// Content keyed by message type (`conversation`, `imageMessage`, ...).
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

/// Everything a live protocol connection can report.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// A pairing token that must be shown to the operator as a QR code.
    PairingToken(String),
    Connection(ConnectionUpdate),
    CredentialsRotated(CredentialUpdate),
    /// Message upsert. `live` is false for history sync batches.
    Messages {
        live: bool,
        messages: Vec<IncomingMessage>,
    },
}

/// Where outbound image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Bytes(Vec<u8>),
}

/// Outbound message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    Image { source: ImageSource, caption: String },
}

impl OutboundContent {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundContent::Text(_) => "text",
            OutboundContent::Image { .. } => "image",
        }
    }
}

/// Group or broadcast metadata as reported by the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub creation: Option<i64>,
    #[serde(default)]
    pub announce: bool,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Broadcast list details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastListInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Membership change on a broadcast target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
}

/// Per-participant outcome of a membership change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub jid: String,
    pub status: String,
}

// --- Push types ---

/// The visible part of a push notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    #[serde(default, rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Custom key/value data delivered alongside a notification.
pub type PushData = BTreeMap<String, String>;

/// Outcome of one token within a multicast send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSendResponse {
    pub token: String,
    pub message_id: Option<MessageId>,
    pub error: Option<PushError>,
}

impl PushSendResponse {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcome of a multicast send. Responses follow input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MulticastReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<PushSendResponse>,
}

impl MulticastReport {
    pub fn from_responses(responses: Vec<PushSendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success()).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}

/// One token that could not be (un)subscribed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicManagementFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a topic subscribe or unsubscribe call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicManagementReport {
    #[serde(rename = "successCount")]
    pub success_count: usize,
    #[serde(rename = "failureCount")]
    pub failure_count: usize,
    pub errors: Vec<TopicManagementFailure>,
}
