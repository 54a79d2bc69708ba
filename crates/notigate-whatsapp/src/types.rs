// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result records returned by session operations.

use chrono::{DateTime, Utc};
use notigate_core::{Jid, JidKind, MessageId, ParticipantAction, ParticipantUpdate};
use serde::Serialize;

use crate::state::{ConnectionState, SessionSnapshot};

/// Public view of the session, as served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub is_connected: bool,
    pub is_reconnecting: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub has_pairing_token: bool,
}

impl From<&SessionSnapshot> for ConnectionStatus {
    fn from(s: &SessionSnapshot) -> Self {
        Self {
            state: s.state,
            is_connected: s.is_connected(),
            is_reconnecting: s.is_reconnecting,
            reconnect_attempts: s.reconnect_attempts,
            max_reconnect_attempts: s.max_reconnect_attempts,
            has_pairing_token: s.pairing_token.is_some(),
        }
    }
}

/// A single successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub to: Jid,
    /// The address exactly as the caller supplied it.
    pub original: String,
    pub message_id: MessageId,
    pub timestamp: DateTime<Utc>,
}

/// One item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub original: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Jid>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryOutcome {
    pub fn delivered(receipt: SendReceipt) -> Self {
        Self {
            original: receipt.original,
            to: Some(receipt.to),
            success: true,
            message_id: Some(receipt.message_id),
            error: None,
            timestamp: receipt.timestamp,
        }
    }

    pub fn failed(original: &str, to: Option<Jid>, error: impl ToString) -> Self {
        Self {
            original: original.to_string(),
            to,
            success: false,
            message_id: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate of a paced batch send. `results` follows input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<DeliveryOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(results: Vec<DeliveryOutcome>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// A newly created broadcast target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTarget {
    pub id: Jid,
    pub name: String,
    pub recipient_count: usize,
    pub recipients: Vec<Jid>,
    pub created_at: DateTime<Utc>,
}

/// Result of an add/remove participants command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsReport {
    pub broadcast_id: Jid,
    pub action: ParticipantAction,
    pub participant_count: usize,
    pub results: Vec<ParticipantUpdate>,
    pub timestamp: DateTime<Utc>,
}

/// Result of leaving a broadcast target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReceipt {
    pub broadcast_id: Jid,
    pub timestamp: DateTime<Utc>,
}

/// Image send followed by an optional text follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalReceipt {
    pub to: Jid,
    pub original: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_message_id: Option<MessageId>,
    pub timestamp: DateTime<Utc>,
}

/// Which query produced a [`BroadcastTargetInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoSource {
    BroadcastList,
    GroupMetadata,
}

/// Details of one broadcast target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTargetInfo {
    pub id: Jid,
    pub name: Option<String>,
    pub recipients: Vec<String>,
    pub total_recipients: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    pub source: InfoSource,
}

/// Directory entry for a group or broadcast the session participates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub kind: JidKind,
    pub name: String,
    pub participant_count: usize,
    pub announce: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

/// Participating chats split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatDirectory {
    pub groups: Vec<ChatSummary>,
    pub broadcasts: Vec<ChatSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_report_counts_and_keeps_order() {
        let ok = |original: &str| {
            DeliveryOutcome::delivered(SendReceipt {
                to: Jid::individual(format!("62{original}")),
                original: original.to_string(),
                message_id: MessageId(format!("id-{original}")),
                timestamp: Utc::now(),
            })
        };
        let report = BatchReport::from_outcomes(vec![
            ok("811111111"),
            DeliveryOutcome::failed("bad", None, "no digits"),
            ok("822222222"),
        ]);
        assert_eq!((report.total, report.successful, report.failed), (3, 2, 1));
        assert_eq!(report.results[1].original, "bad");
        assert_eq!(report.results[1].error.as_deref(), Some("no digits"));
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = ConnectionStatus::from(&SessionSnapshot::new(5));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isConnected"], false);
        assert_eq!(json["maxReconnectAttempts"], 5);
        assert_eq!(json["state"], "disconnected");
    }
}
