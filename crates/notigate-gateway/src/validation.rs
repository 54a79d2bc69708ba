// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request payloads and their validation.

use std::collections::HashSet;

use notigate_core::{PushData, PushNotification};
use serde::Deserialize;

use crate::error::ApiError;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_BODY_CHARS: usize = 250;
pub const MAX_MULTICAST_TOKENS: usize = 500;
pub const MAX_TOPIC_TOKENS: usize = 1000;
pub const MAX_BROADCAST_TARGETS: usize = 100;
pub const MAX_IMAGE_BROADCAST_TARGETS: usize = 50;
pub const MAX_BROADCAST_RECIPIENTS: usize = 256;
pub const MAX_PARTICIPANTS: usize = 100;
pub const MAX_BROADCAST_NAME_CHARS: usize = 100;
pub const MAX_CHAT_MESSAGE_CHARS: usize = 4096;

// --- Push ---

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRequest {
    #[serde(default)]
    pub token: String,
    pub notification: Option<NotificationInput>,
    #[serde(default)]
    pub data: PushData,
}

#[derive(Debug, Deserialize)]
pub struct MulticastRequest {
    pub tokens: Option<Vec<String>>,
    pub notification: Option<NotificationInput>,
    #[serde(default)]
    pub data: PushData,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    #[serde(default)]
    pub topic: String,
    pub notification: Option<NotificationInput>,
    #[serde(default)]
    pub data: PushData,
}

/// A single token or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TokensInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub tokens: Option<TokensInput>,
    #[serde(default)]
    pub topic: String,
}

pub fn notification(input: Option<NotificationInput>) -> Result<PushNotification, ApiError> {
    let input = input.ok_or_else(|| bad("notification is required"))?;
    let title = input.title.trim();
    let body = input.body.trim();
    if title.is_empty() {
        return Err(bad("notification.title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(bad(format!(
            "notification.title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    if body.is_empty() {
        return Err(bad("notification.body is required"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(bad(format!(
            "notification.body must be at most {MAX_BODY_CHARS} characters"
        )));
    }
    let image_url = match input.image_url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(url) => Some(http_url(url, "notification.imageUrl")?.to_string()),
    };
    Ok(PushNotification {
        title: title.to_string(),
        body: body.to_string(),
        image_url,
    })
}

pub fn token(token: &str) -> Result<&str, ApiError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(bad("token is required"));
    }
    Ok(token)
}

pub fn tokens(tokens: Option<Vec<String>>, max: usize) -> Result<Vec<String>, ApiError> {
    let tokens = tokens.ok_or_else(|| bad("tokens is required"))?;
    if tokens.is_empty() {
        return Err(bad("at least one token is required"));
    }
    if tokens.len() > max {
        return Err(bad(format!("at most {max} tokens per request")));
    }
    if tokens.iter().any(|t| t.trim().is_empty()) {
        return Err(bad("tokens must not be empty"));
    }
    Ok(tokens)
}

pub fn subscription_tokens(input: Option<TokensInput>) -> Result<Vec<String>, ApiError> {
    let list = input.map(|t| match t {
        TokensInput::One(token) => vec![token],
        TokensInput::Many(tokens) => tokens,
    });
    tokens(list, MAX_TOPIC_TOKENS)
}

/// Topic names are limited to `[A-Za-z0-9-_.~%]+`.
pub fn topic(topic: &str) -> Result<&str, ApiError> {
    if topic.is_empty() {
        return Err(bad("topic is required"));
    }
    let valid = topic
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'));
    if !valid {
        return Err(bad(
            "topic may only contain letters, digits, and the characters -_.~%",
        ));
    }
    Ok(topic)
}

// --- WhatsApp ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatImageUrlRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalRequest {
    #[serde(default)]
    pub phone_number: String,
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub phone_numbers: Option<Vec<String>>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastImageRequest {
    pub phone_numbers: Option<Vec<String>>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBroadcastListRequest {
    #[serde(default)]
    pub name: String,
    pub recipients: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastListMessageRequest {
    #[serde(default)]
    pub broadcast_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastListImageRequest {
    #[serde(default)]
    pub broadcast_id: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsRequest {
    #[serde(default)]
    pub broadcast_id: String,
    #[serde(default)]
    pub action: String,
    pub participants: Option<Vec<String>>,
}

// --- Dual ---

#[derive(Debug, Deserialize)]
pub struct DualRequest {
    pub fcm: Option<DeviceRequest>,
    pub whatsapp: Option<ChatMessageRequest>,
}

pub fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(bad(format!("{field} is required")));
    }
    Ok(value)
}

pub fn chat_message<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = required(value, field)?;
    if value.chars().count() > MAX_CHAT_MESSAGE_CHARS {
        return Err(bad(format!(
            "{field} must be at most {MAX_CHAT_MESSAGE_CHARS} characters"
        )));
    }
    Ok(value)
}

pub fn http_url<'a>(url: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let url = required(url, field)?;
    let lower = url.to_ascii_lowercase();
    let has_host = ["http://", "https://"]
        .iter()
        .any(|scheme| lower.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()));
    if !has_host {
        return Err(bad(format!("{field} must be a valid http(s) URL")));
    }
    Ok(url)
}

pub fn broadcast_name(name: &str) -> Result<&str, ApiError> {
    let name = required(name, "name")?;
    if name.chars().count() > MAX_BROADCAST_NAME_CHARS {
        return Err(bad(format!(
            "name must be at most {MAX_BROADCAST_NAME_CHARS} characters"
        )));
    }
    Ok(name)
}

/// Drops duplicates and anything that is neither an address with `@` nor a
/// number with 10 to 15 digits. Order is kept.
pub fn prefilter_targets(
    targets: Option<Vec<String>>,
    field: &str,
    max: usize,
) -> Result<Vec<String>, ApiError> {
    let targets = targets.ok_or_else(|| bad(format!("{field} is required")))?;
    if targets.is_empty() {
        return Err(bad(format!("{field} must not be empty")));
    }
    if targets.len() > max {
        return Err(bad(format!("at most {max} entries allowed in {field}")));
    }

    let mut seen = HashSet::new();
    let unique: Vec<String> = targets
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();
    let total = unique.len();
    let valid: Vec<String> = unique.into_iter().filter(|t| plausible_target(t)).collect();

    if valid.is_empty() {
        return Err(bad("no valid phone numbers or JIDs found"));
    }
    if valid.len() != total {
        tracing::info!(
            dropped = total - valid.len(),
            field,
            "filtered invalid targets"
        );
    }
    Ok(valid)
}

fn plausible_target(target: &str) -> bool {
    if target.contains('@') {
        return true;
    }
    let digits = target.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

fn bad(message: impl Into<String>) -> ApiError {
    ApiError::BadRequest(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, body: &str, image: Option<&str>) -> Option<NotificationInput> {
        Some(NotificationInput {
            title: title.into(),
            body: body.into(),
            image_url: image.map(Into::into),
        })
    }

    #[test]
    fn notification_limits() {
        assert!(notification(input("Hi", "there", None)).is_ok());
        assert!(notification(None).is_err());
        assert!(notification(input("", "there", None)).is_err());
        assert!(notification(input(&"t".repeat(101), "b", None)).is_err());
        assert!(notification(input(&"t".repeat(100), &"b".repeat(250), None)).is_ok());
        assert!(notification(input("t", &"b".repeat(251), None)).is_err());
        assert!(notification(input("t", "b", Some("ftp://x/y.png"))).is_err());
        let n = notification(input("t", "b", Some("https://cdn.example.com/a.png"))).unwrap();
        assert_eq!(n.image_url.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn topic_charset() {
        assert!(topic("news_2024-v1.0~%20").is_ok());
        assert!(topic("").is_err());
        assert!(topic("bad topic").is_err());
        assert!(topic("/topics/news").is_err());
    }

    #[test]
    fn token_lists_are_bounded() {
        assert!(tokens(None, 500).is_err());
        assert!(tokens(Some(vec![]), 500).is_err());
        assert!(tokens(Some(vec!["a".into(); 501]), 500).is_err());
        assert_eq!(tokens(Some(vec!["a".into(); 500]), 500).unwrap().len(), 500);
        assert_eq!(
            subscription_tokens(Some(TokensInput::One("t".into()))).unwrap(),
            vec!["t".to_string()]
        );
    }

    #[test]
    fn prefilter_dedups_and_drops_implausible_targets() {
        let targets = vec![
            "081234567890".to_string(),
            "081234567890".to_string(),
            "12345".to_string(),
            "120363000000000001@g.us".to_string(),
            "+62 812-3456-7891".to_string(),
        ];
        let kept = prefilter_targets(Some(targets), "phoneNumbers", 100).unwrap();
        assert_eq!(
            kept,
            vec!["081234567890", "120363000000000001@g.us", "+62 812-3456-7891"]
        );

        assert!(prefilter_targets(Some(vec!["123".into()]), "phoneNumbers", 100).is_err());
        assert!(prefilter_targets(Some(vec!["0812345678901".into(); 101]), "phoneNumbers", 100).is_err());
    }

    #[test]
    fn http_urls_need_a_host() {
        assert!(http_url("https://example.com/a.png", "imageUrl").is_ok());
        assert!(http_url("HTTP://example.com", "imageUrl").is_ok());
        assert!(http_url("https://", "imageUrl").is_err());
        assert!(http_url("file:///etc/passwd", "imageUrl").is_err());
    }
}
