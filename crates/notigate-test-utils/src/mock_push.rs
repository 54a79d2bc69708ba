// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock push provider for deterministic gateway tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use notigate_core::{
    AdapterType, HealthStatus, MessageId, MulticastReport, NotigateError, PluginAdapter, PushData,
    PushError, PushNotification, PushProvider, PushSendResponse, TopicManagementFailure,
    TopicManagementReport,
};

/// One call observed by [`MockPushProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushCall {
    Device {
        token: String,
        notification: PushNotification,
        data: PushData,
    },
    Multicast {
        tokens: Vec<String>,
        notification: PushNotification,
    },
    Topic {
        topic: String,
        notification: PushNotification,
        data: PushData,
    },
    Subscribe {
        tokens: Vec<String>,
        topic: String,
    },
    Unsubscribe {
        tokens: Vec<String>,
        topic: String,
    },
}

/// A push provider that succeeds unless told otherwise.
///
/// Tokens registered with [`MockPushProvider::fail_token`] fail every send
/// and topic operation they take part in.
pub struct MockPushProvider {
    calls: Mutex<Vec<PushCall>>,
    failing_tokens: Mutex<HashMap<String, PushError>>,
    topic_error: Mutex<Option<PushError>>,
    next_id: AtomicU64,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_tokens: Mutex::new(HashMap::new()),
            topic_error: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn fail_token(&self, token: impl Into<String>, error: PushError) {
        self.failing_tokens.lock().await.insert(token.into(), error);
    }

    /// Makes every topic send fail with `error`.
    pub async fn fail_topics(&self, error: PushError) {
        *self.topic_error.lock().await = Some(error);
    }

    pub async fn calls(&self) -> Vec<PushCall> {
        self.calls.lock().await.clone()
    }

    fn next_message_id(&self) -> MessageId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        MessageId(format!("projects/mock/messages/{n}"))
    }

    async fn outcome_for(&self, token: &str) -> Result<MessageId, PushError> {
        match self.failing_tokens.lock().await.get(token) {
            Some(error) => Err(error.clone()),
            None => Ok(self.next_message_id()),
        }
    }

    async fn topic_report(&self, tokens: &[String]) -> TopicManagementReport {
        let failing = self.failing_tokens.lock().await;
        let errors: Vec<TopicManagementFailure> = tokens
            .iter()
            .enumerate()
            .filter_map(|(index, token)| {
                failing.get(token).map(|e| TopicManagementFailure {
                    index,
                    reason: e.code.to_string(),
                })
            })
            .collect();
        TopicManagementReport {
            success_count: tokens.len() - errors.len(),
            failure_count: errors.len(),
            errors,
        }
    }
}

impl Default for MockPushProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPushProvider {
    fn name(&self) -> &str {
        "mock-push"
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
impl PushProvider for MockPushProvider {
    async fn send_to_device(
        &self,
        token: &str,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError> {
        self.calls.lock().await.push(PushCall::Device {
            token: token.to_string(),
            notification: notification.clone(),
            data: data.clone(),
        });
        self.outcome_for(token).await
    }

    async fn send_to_devices(
        &self,
        tokens: &[String],
        notification: &PushNotification,
        _data: &PushData,
    ) -> Result<MulticastReport, PushError> {
        self.calls.lock().await.push(PushCall::Multicast {
            tokens: tokens.to_vec(),
            notification: notification.clone(),
        });
        let mut responses = Vec::with_capacity(tokens.len());
        for token in tokens {
            let outcome = self.outcome_for(token).await;
            responses.push(PushSendResponse {
                token: token.clone(),
                message_id: outcome.as_ref().ok().cloned(),
                error: outcome.err(),
            });
        }
        Ok(MulticastReport::from_responses(responses))
    }

    async fn send_to_topic(
        &self,
        topic: &str,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError> {
        self.calls.lock().await.push(PushCall::Topic {
            topic: topic.to_string(),
            notification: notification.clone(),
            data: data.clone(),
        });
        match self.topic_error.lock().await.clone() {
            Some(error) => Err(error),
            None => Ok(self.next_message_id()),
        }
    }

    async fn subscribe_to_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError> {
        self.calls.lock().await.push(PushCall::Subscribe {
            tokens: tokens.to_vec(),
            topic: topic.to_string(),
        });
        Ok(self.topic_report(tokens).await)
    }

    async fn unsubscribe_from_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError> {
        self.calls.lock().await.push(PushCall::Unsubscribe {
            tokens: tokens.to_vec(),
            topic: topic.to_string(),
        });
        Ok(self.topic_report(tokens).await)
    }
}
