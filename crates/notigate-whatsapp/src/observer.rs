// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message classification for diagnostic logging.
//!
//! The observer is passive: it logs and returns. Nothing here may fail in a
//! way that reaches the connection.

use notigate_core::{IncomingMessage, Jid, JidKind};
use thiserror::Error;
use tracing::{debug, info, warn};

/// What a message carries, by its payload key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    /// Protocol housekeeping (receipts, key distribution, edits).
    Protocol,
    Other(String),
}

impl ContentKind {
    fn from_key(key: &str) -> Self {
        match key {
            "conversation" | "extendedTextMessage" => ContentKind::Text,
            "imageMessage" => ContentKind::Image,
            "videoMessage" => ContentKind::Video,
            "audioMessage" => ContentKind::Audio,
            "documentMessage" | "documentWithCaptionMessage" => ContentKind::Document,
            "protocolMessage" | "senderKeyDistributionMessage" | "messageContextInfo" => {
                ContentKind::Protocol
            }
            other => ContentKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::Document => "document",
            ContentKind::Protocol => "protocol",
            ContentKind::Other(key) => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("message from {remote} has no content")]
    NoContent { remote: String },

    #[error("message from {remote} has a non-object payload")]
    NotAnObject { remote: String },
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub origin: JidKind,
    pub kind: ContentKind,
    pub from: String,
    pub sender: Option<String>,
    /// Text body, caption, or file name when present.
    pub preview: Option<String>,
}

pub fn classify(message: &IncomingMessage) -> Result<Classified, ClassifyError> {
    let origin = Jid::parse(&message.remote).map_or(JidKind::Unknown, |jid| jid.kind());

    let content = message.content.as_ref().ok_or_else(|| ClassifyError::NoContent {
        remote: message.remote.clone(),
    })?;
    let object = content.as_object().ok_or_else(|| ClassifyError::NotAnObject {
        remote: message.remote.clone(),
    })?;

    // The first non-housekeeping key decides; housekeeping only if alone.
    let kinds: Vec<(&String, ContentKind)> = object
        .keys()
        .map(|key| (key, ContentKind::from_key(key)))
        .collect();
    let (key, kind) = kinds
        .iter()
        .find(|(_, kind)| *kind != ContentKind::Protocol)
        .or_else(|| kinds.first())
        .cloned()
        .ok_or_else(|| ClassifyError::NoContent {
            remote: message.remote.clone(),
        })?;

    let body = &object[key.as_str()];
    let preview = match kind {
        ContentKind::Text => body
            .as_str()
            .map(str::to_string)
            .or_else(|| body.get("text").and_then(|t| t.as_str()).map(str::to_string)),
        ContentKind::Image | ContentKind::Video => body
            .get("caption")
            .and_then(|c| c.as_str())
            .map(str::to_string),
        ContentKind::Document => body
            .get("fileName")
            .and_then(|c| c.as_str())
            .map(str::to_string),
        _ => None,
    };

    Ok(Classified {
        origin,
        kind,
        from: message.remote.clone(),
        sender: message.participant.clone(),
        preview,
    })
}

/// Logs message batches delivered by the connection.
#[derive(Debug, Clone, Default)]
pub struct InboundObserver;

impl InboundObserver {
    pub fn new() -> Self {
        Self
    }

    pub fn observe(&self, live: bool, messages: &[IncomingMessage]) {
        if !live {
            debug!(count = messages.len(), "skipping history sync batch");
            return;
        }

        for message in messages {
            match classify(message) {
                Ok(c) if c.kind == ContentKind::Protocol => {
                    debug!(from = %c.from, "protocol message");
                }
                Ok(c) => {
                    info!(
                        origin = %c.origin,
                        kind = c.kind.label(),
                        from = %c.from,
                        sender = c.sender.as_deref().unwrap_or("-"),
                        preview = c.preview.as_deref().map(|p| truncate(p, 80)).unwrap_or_default(),
                        "incoming message"
                    );
                }
                Err(e) => warn!(error = %e, "could not classify incoming message"),
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(remote: &str, content: serde_json::Value) -> IncomingMessage {
        IncomingMessage {
            remote: remote.into(),
            participant: None,
            timestamp: 1_700_000_000,
            content: Some(content),
        }
    }

    #[test]
    fn classifies_origin_and_kind() {
        let c = classify(&msg("628111@s.whatsapp.net", json!({"conversation": "hi"}))).unwrap();
        assert_eq!(c.origin, JidKind::Individual);
        assert_eq!(c.kind, ContentKind::Text);
        assert_eq!(c.preview.as_deref(), Some("hi"));

        let c = classify(&msg(
            "1203@g.us",
            json!({"imageMessage": {"caption": "look"}}),
        ))
        .unwrap();
        assert_eq!(c.origin, JidKind::Group);
        assert_eq!(c.kind, ContentKind::Image);
        assert_eq!(c.preview.as_deref(), Some("look"));

        let c = classify(&msg("status@broadcast", json!({"videoMessage": {}}))).unwrap();
        assert_eq!(c.origin, JidKind::Status);
        assert_eq!(c.kind, ContentKind::Video);
    }

    #[test]
    fn housekeeping_key_does_not_hide_content() {
        let c = classify(&msg(
            "628111@s.whatsapp.net",
            json!({"messageContextInfo": {}, "extendedTextMessage": {"text": "yo"}}),
        ))
        .unwrap();
        assert_eq!(c.kind, ContentKind::Text);
        assert_eq!(c.preview.as_deref(), Some("yo"));
    }

    #[test]
    fn unknown_kinds_and_origins_are_reported_as_such() {
        let c = classify(&msg("garbage", json!({"pollCreationMessage": {}}))).unwrap();
        assert_eq!(c.origin, JidKind::Unknown);
        assert_eq!(c.kind, ContentKind::Other("pollCreationMessage".into()));
    }

    #[test]
    fn malformed_payloads_are_errors_not_panics() {
        let mut m = msg("x@g.us", json!("just a string"));
        assert!(matches!(classify(&m), Err(ClassifyError::NotAnObject { .. })));
        m.content = None;
        assert!(matches!(classify(&m), Err(ClassifyError::NoContent { .. })));
        m.content = Some(json!({}));
        assert!(matches!(classify(&m), Err(ClassifyError::NoContent { .. })));
    }

    #[tracing_test::traced_test]
    #[test]
    fn observe_logs_failures_and_keeps_going() {
        let observer = InboundObserver::new();
        observer.observe(
            true,
            &[
                msg("x@g.us", json!(42)),
                msg("628111@s.whatsapp.net", json!({"conversation": "after"})),
            ],
        );
        assert!(logs_contain("could not classify"));
        assert!(logs_contain("incoming message"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
