// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FCM HTTP v1, Instance ID, and OAuth2 wire types.

use notigate_core::{PushData, PushNotification};
use serde::{Deserialize, Serialize};

// --- Send ---

/// Body of `POST /v1/projects/{project}/messages:send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest<'a> {
    pub message: Message<'a>,
}

/// Where a message goes. Exactly one of token or topic is set.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Token(&'a str),
    Topic(&'a str),
}

#[derive(Debug, Clone, Serialize)]
pub struct Message<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<&'a str>,
    pub notification: Notification<'a>,
    #[serde(skip_serializing_if = "no_data")]
    pub data: &'a PushData,
    pub android: AndroidConfig,
    pub apns: ApnsConfig,
}

impl<'a> Message<'a> {
    pub fn new(target: Target<'a>, notification: &'a PushNotification, data: &'a PushData) -> Self {
        let (token, topic) = match target {
            Target::Token(token) => (Some(token), None),
            Target::Topic(topic) => (None, Some(topic)),
        };
        Self {
            token,
            topic,
            notification: Notification {
                title: &notification.title,
                body: &notification.body,
                image: notification.image_url.as_deref(),
            },
            data,
            android: AndroidConfig::default(),
            apns: ApnsConfig::default(),
        }
    }
}

fn no_data(data: &&PushData) -> bool {
    data.is_empty()
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification<'a> {
    pub title: &'a str,
    pub body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a str>,
}

/// High priority with the default sound and channel.
#[derive(Debug, Clone, Serialize)]
pub struct AndroidConfig {
    pub priority: &'static str,
    pub notification: AndroidNotification,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            priority: "high",
            notification: AndroidNotification {
                sound: "default",
                channel_id: "default",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AndroidNotification {
    pub sound: &'static str,
    pub channel_id: &'static str,
}

/// Default sound, badge 1.
#[derive(Debug, Clone, Serialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,
}

impl Default for ApnsConfig {
    fn default() -> Self {
        Self {
            payload: ApnsPayload {
                aps: Aps {
                    sound: "default",
                    badge: 1,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, Serialize)]
pub struct Aps {
    pub sound: &'static str,
    pub badge: u32,
}

/// Success body: `{"name": "projects/p/messages/123"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    pub name: String,
}

// --- Errors ---

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorStatus {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
}

// --- Topic management ---

/// Body of `POST /iid/v1:batchAdd` and `:batchRemove`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest<'a> {
    pub to: String,
    pub registration_tokens: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<BatchResult>,
}

/// Empty object on success, `{"error": "NOT_FOUND"}` otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub error: Option<String>,
}

// --- OAuth2 ---

/// The fields of a Google service account key file that matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssertionClaims<'a> {
    pub iss: &'a str,
    pub scope: &'a str,
    pub aud: &'a str,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_message_carries_platform_defaults() {
        let notification = PushNotification {
            title: "Order shipped".into(),
            body: "On its way".into(),
            image_url: Some("https://cdn.example.com/box.png".into()),
        };
        let mut data = PushData::new();
        data.insert("orderId".into(), "42".into());

        let body = serde_json::to_value(SendRequest {
            message: Message::new(Target::Token("tok-1"), &notification, &data),
        })
        .unwrap();
        let m = &body["message"];
        assert_eq!(m["token"], "tok-1");
        assert!(m.get("topic").is_none());
        assert_eq!(m["notification"]["image"], "https://cdn.example.com/box.png");
        assert_eq!(m["data"]["orderId"], "42");
        assert_eq!(m["android"]["priority"], "high");
        assert_eq!(m["android"]["notification"]["channel_id"], "default");
        assert_eq!(m["apns"]["payload"]["aps"]["badge"], 1);
    }

    #[test]
    fn topic_message_omits_empty_data() {
        let notification = PushNotification {
            title: "t".into(),
            body: "b".into(),
            image_url: None,
        };
        let data = PushData::new();
        let body = serde_json::to_value(Message::new(Target::Topic("news"), &notification, &data))
            .unwrap();
        assert_eq!(body["topic"], "news");
        assert!(body.get("data").is_none());
        assert!(body["notification"].get("image").is_none());
    }

    #[test]
    fn error_details_parse() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND","details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.status.as_deref(), Some("NOT_FOUND"));
        assert_eq!(parsed.error.details[0].error_code.as_deref(), Some("UNREGISTERED"));
    }
}
