// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push notification provider trait.

use async_trait::async_trait;

use crate::error::PushError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, MulticastReport, PushData, PushNotification, TopicManagementReport};

/// Delivers notifications to devices and topics.
#[async_trait]
pub trait PushProvider: PluginAdapter {
    /// Sends to a single registration token.
    async fn send_to_device(
        &self,
        token: &str,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError>;

    /// Sends to every token. Per-token failures are reported, not raised.
    async fn send_to_devices(
        &self,
        tokens: &[String],
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MulticastReport, PushError>;

    /// Sends to every device subscribed to `topic`.
    async fn send_to_topic(
        &self,
        topic: &str,
        notification: &PushNotification,
        data: &PushData,
    ) -> Result<MessageId, PushError>;

    async fn subscribe_to_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError>;

    async fn unsubscribe_from_topic(
        &self,
        tokens: &[String],
        topic: &str,
    ) -> Result<TopicManagementReport, PushError>;
}
