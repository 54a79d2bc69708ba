// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Firebase Cloud Messaging provider for Notigate.
//!
//! Implements [`PushProvider`] over the FCM HTTP v1 API, with topic
//! membership handled by the Instance ID batch API.

pub mod auth;
pub mod client;
pub mod types;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use notigate_config::PushConfig;
use notigate_core::{
    AdapterType, HealthStatus, MessageId, MulticastReport, NotigateError, PluginAdapter, PushData,
    PushError, PushNotification, PushProvider, PushSendResponse, TopicManagementReport,
};
use tracing::{info, warn};

use crate::auth::{DEFAULT_TOKEN_URL, ServiceAccountAuth, TokenSource};
use crate::client::{FcmClient, TopicOp};
use crate::types::{ServiceAccountKey, Target};

/// Per-token sends in flight during a multicast.
const MULTICAST_CONCURRENCY: usize = 10;

/// FCM push provider implementing [`PushProvider`].
#[derive(Debug)]
pub struct FcmProvider {
    client: FcmClient,
}

impl FcmProvider {
    /// Builds a provider from the `[push]` section.
    ///
    /// The project id comes from the config override, else the service
    /// account file; the token URL likewise.
    pub async fn from_config(config: &PushConfig) -> Result<Self, NotigateError> {
        let path = config.service_account_path.as_deref().ok_or_else(|| {
            NotigateError::Config("push.service_account_path is required".into())
        })?;
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            NotigateError::Config(format!("cannot read service account file {path}: {e}"))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            NotigateError::Config(format!("invalid service account file {path}: {e}"))
        })?;

        let project_id = config
            .project_id
            .clone()
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| {
                NotigateError::Config(
                    "push.project_id is not set and the service account has none".into(),
                )
            })?;
        let token_url = config
            .token_url
            .clone()
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());

        let auth = ServiceAccountAuth::new(&key, token_url).map_err(|e| {
            NotigateError::Config(format!("invalid service account private key: {e}"))
        })?;
        let client = FcmClient::new(project_id, TokenSource::ServiceAccount(auth))
            .map_err(|e| NotigateError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?
            .with_base_urls(&config.base_url, &config.iid_base_url);

        info!(
            project_id = client.project_id(),
            client_email = %key.client_email,
            "FCM push provider initialized"
        );
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: FcmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for FcmProvider {
    fn name(&self) -> &str {
        "fcm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PushProvider
    }

    async fn health_check(&self) -> Result<HealthStatus, NotigateError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NotigateError> {
        Ok(())
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send_to_device(
        &self,
        token: &str,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError> {
        let id = self
            .client
            .send(Target::Token(token), notification, data)
            .await?;
        info!(message_id = %id, "push sent to device");
        Ok(id)
    }

    async fn send_to_devices(
        &self,
        tokens: &[String],
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MulticastReport, PushError> {
        let sends: Vec<_> = tokens
            .iter()
            .map(|token| async move {
                let outcome = self
                    .client
                    .send(Target::Token(token), notification, data)
                    .await;
                if let Err(e) = &outcome {
                    warn!(code = %e.code, "push to device failed");
                }
                PushSendResponse {
                    token: token.clone(),
                    message_id: outcome.as_ref().ok().cloned(),
                    error: outcome.err(),
                }
            })
            .collect();
        let responses: Vec<PushSendResponse> = stream::iter(sends)
            .buffered(MULTICAST_CONCURRENCY)
            .collect()
            .await;

        let report = MulticastReport::from_responses(responses);
        info!(
            success = report.success_count,
            failure = report.failure_count,
            "multicast push finished"
        );
        Ok(report)
    }

    async fn send_to_topic(
        &self,
        topic: &str,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError> {
        let id = self
            .client
            .send(Target::Topic(topic), notification, data)
            .await?;
        info!(topic, message_id = %id, "push sent to topic");
        Ok(id)
    }

    async fn subscribe_to_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError> {
        self.client
            .manage_topic(TopicOp::Subscribe, tokens, topic)
            .await
    }

    async fn unsubscribe_from_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError> {
        self.client
            .manage_topic(TopicOp::Unsubscribe, tokens, topic)
            .await
    }
}
