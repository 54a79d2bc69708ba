// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound commands.
//!
//! Every public operation here first calls
//! [`SessionManager::ensure_connection`], then transmits under the send lock
//! so at most one command is in flight. A socket-level failure marks the
//! session disconnected; the next command reconnects.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notigate_core::{
    BroadcastListInfo, GroupInfo, ImageSource, Jid, JidKind, MessageId, OutboundContent,
    ParticipantAction, ProtocolConnection, TransportError,
};
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::state::Transition;
use crate::supervisor::SessionManager;
use crate::types::{
    BatchReport, BroadcastTarget, BroadcastTargetInfo, ChatDirectory, ChatSummary,
    DeletionReceipt, DeliveryOutcome, InfoSource, ParticipantsReport, SendReceipt,
    UniversalReceipt,
};

/// Exclusive right to use the connection for one command.
pub(crate) struct OutboundPermit<'a> {
    _serial: MutexGuard<'a, ()>,
    generation: u64,
    connection: Arc<dyn ProtocolConnection>,
}

fn validate_image_url(url: &str) -> Result<(), SessionError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(SessionError::Validation(format!(
            "image URL must be http or https, got `{url}`"
        )))
    }
}

fn require_text(text: &str, what: &str) -> Result<(), SessionError> {
    if text.trim().is_empty() {
        Err(SessionError::Validation(format!("{what} must not be empty")))
    } else {
        Ok(())
    }
}

fn chat_summary(group: &GroupInfo) -> ChatSummary {
    ChatSummary {
        id: group.id.clone(),
        kind: Jid::parse(&group.id).map_or(JidKind::Unknown, |jid| jid.kind()),
        name: group.subject.clone().unwrap_or_else(|| "Unnamed".into()),
        participant_count: group.participants.len(),
        announce: group.announce,
        created: group.creation,
    }
}

impl SessionManager {
    async fn acquire(&self) -> Result<OutboundPermit<'_>, SessionError> {
        let serial = self.send_lock.lock().await;
        let snapshot = self.snapshot();
        if !snapshot.is_connected() {
            return Err(SessionError::Connection("connection lost".into()));
        }

        let link = self.link.lock().await;
        let link = link
            .as_ref()
            .filter(|l| l.generation == snapshot.generation)
            .ok_or_else(|| SessionError::Connection("no live connection".into()))?;
        Ok(OutboundPermit {
            _serial: serial,
            generation: link.generation,
            connection: Arc::clone(&link.connection),
        })
    }

    fn fail(
        &self,
        permit: &OutboundPermit<'_>,
        operation: &'static str,
        source: TransportError,
    ) -> SessionError {
        if source.is_connection_loss() {
            warn!(
                operation,
                generation = permit.generation,
                error = %source,
                "connection lost during command"
            );
            self.apply(Transition::TransportLost {
                generation: permit.generation,
            });
        }
        SessionError::Provider { operation, source }
    }

    fn settle<T>(
        &self,
        permit: &OutboundPermit<'_>,
        operation: &'static str,
        result: Result<T, TransportError>,
    ) -> Result<T, SessionError> {
        result.map_err(|source| self.fail(permit, operation, source))
    }

    async fn transmit(
        &self,
        operation: &'static str,
        to: &Jid,
        content: &OutboundContent,
    ) -> Result<MessageId, SessionError> {
        let permit = self.acquire().await?;
        let result = permit.connection.send_message(to, content).await;
        self.settle(&permit, operation, result)
    }

    async fn send_to(
        &self,
        operation: &'static str,
        original: &str,
        to: Jid,
        content: &OutboundContent,
    ) -> Result<SendReceipt, SessionError> {
        let message_id = self.transmit(operation, &to, content).await?;
        info!(to = %to, kind = content.kind(), message_id = %message_id, "message sent");
        Ok(SendReceipt {
            to,
            original: original.to_string(),
            message_id,
            timestamp: Utc::now(),
        })
    }

    /// Resolves a broadcast-target id; individuals are rejected.
    fn target_address(&self, id: &str) -> Result<Jid, SessionError> {
        let jid = self.normalizer.normalize(id)?;
        if jid.is_multi_recipient() {
            Ok(jid)
        } else {
            Err(SessionError::Validation(format!(
                "`{id}` is not a group or broadcast address"
            )))
        }
    }

    /// Normalizes, drops duplicates, keeps input order.
    fn collect_members<'a>(
        &self,
        inputs: impl IntoIterator<Item = &'a String>,
        strict: bool,
    ) -> Result<Vec<Jid>, SessionError> {
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for input in inputs {
            match self.normalizer.normalize(input) {
                Ok(jid) if jid.kind() == JidKind::Individual => {
                    if seen.insert(jid.clone()) {
                        members.push(jid);
                    }
                }
                Ok(jid) if strict => {
                    return Err(SessionError::Validation(format!(
                        "`{jid}` is not an individual address"
                    )));
                }
                Ok(jid) => warn!(recipient = %jid, "skipping non-individual recipient"),
                Err(e) if strict => return Err(e.into()),
                Err(e) => warn!(recipient = %input, error = %e, "skipping malformed recipient"),
            }
        }
        Ok(members)
    }

    pub async fn send_message(&self, target: &str, text: &str) -> Result<SendReceipt, SessionError> {
        self.ensure_connection().await?;
        let to = self.normalizer.normalize(target)?;
        require_text(text, "message")?;
        self.send_to("send message", target, to, &OutboundContent::Text(text.to_string()))
            .await
    }

    pub async fn send_image_from_url(
        &self,
        target: &str,
        url: &str,
        caption: &str,
    ) -> Result<SendReceipt, SessionError> {
        self.ensure_connection().await?;
        let to = self.normalizer.normalize(target)?;
        validate_image_url(url)?;
        let content = OutboundContent::Image {
            source: ImageSource::Url(url.trim().to_string()),
            caption: caption.to_string(),
        };
        self.send_to("send image", target, to, &content).await
    }

    pub async fn send_image_file(
        &self,
        target: &str,
        path: &Path,
        caption: &str,
    ) -> Result<SendReceipt, SessionError> {
        self.ensure_connection().await?;
        let to = self.normalizer.normalize(target)?;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::Validation(format!(
                    "image file not found: {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(SessionError::Validation(format!(
                    "cannot read image file {}: {e}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), bytes = bytes.len(), "read image file");
        let content = OutboundContent::Image {
            source: ImageSource::Bytes(bytes),
            caption: caption.to_string(),
        };
        self.send_to("send image file", target, to, &content).await
    }

    /// Sends an image when a URL is given, otherwise text.
    ///
    /// The image caption falls back to `message`. If `message` differs from
    /// the caption it follows as a separate text after the text pacing delay.
    pub async fn send_universal(
        &self,
        target: &str,
        message: Option<&str>,
        image_url: Option<&str>,
        caption: Option<&str>,
    ) -> Result<UniversalReceipt, SessionError> {
        let message = message.filter(|m| !m.trim().is_empty());
        let image_url = image_url.filter(|u| !u.trim().is_empty());
        if message.is_none() && image_url.is_none() {
            return Err(SessionError::Validation(
                "either a message or an image URL is required".into(),
            ));
        }

        self.ensure_connection().await?;
        let to = self.normalizer.normalize(target)?;

        let Some(url) = image_url else {
            let text = message.unwrap_or_default();
            let id = self
                .transmit("send message", &to, &OutboundContent::Text(text.to_string()))
                .await?;
            return Ok(UniversalReceipt {
                to,
                original: target.to_string(),
                image_message_id: None,
                text_message_id: Some(id),
                timestamp: Utc::now(),
            });
        };

        validate_image_url(url)?;
        let caption = caption.or(message).unwrap_or_default();
        let image = OutboundContent::Image {
            source: ImageSource::Url(url.trim().to_string()),
            caption: caption.to_string(),
        };
        let image_id = self.transmit("send image", &to, &image).await?;

        let mut text_id = None;
        if let Some(text) = message.filter(|m| *m != caption) {
            tokio::time::sleep(self.config.text_pacing).await;
            text_id = Some(
                self.transmit("send message", &to, &OutboundContent::Text(text.to_string()))
                    .await?,
            );
        }

        info!(to = %to, follow_up = text_id.is_some(), "universal send complete");
        Ok(UniversalReceipt {
            to,
            original: target.to_string(),
            image_message_id: Some(image_id),
            text_message_id: text_id,
            timestamp: Utc::now(),
        })
    }

    pub async fn broadcast_text(
        &self,
        targets: &[String],
        text: &str,
    ) -> Result<BatchReport, SessionError> {
        require_text(text, "message")?;
        self.ensure_connection().await?;
        let content = OutboundContent::Text(text.to_string());
        Ok(self
            .run_batch("broadcast message", targets, &content, self.config.text_pacing)
            .await)
    }

    pub async fn broadcast_image(
        &self,
        targets: &[String],
        url: &str,
        caption: &str,
    ) -> Result<BatchReport, SessionError> {
        validate_image_url(url)?;
        self.ensure_connection().await?;
        let content = OutboundContent::Image {
            source: ImageSource::Url(url.trim().to_string()),
            caption: caption.to_string(),
        };
        Ok(self
            .run_batch("broadcast image", targets, &content, self.config.image_pacing)
            .await)
    }

    /// Sends to each target in order. Failures are recorded and the batch
    /// continues; consecutive transmits are `pacing` apart.
    async fn run_batch(
        &self,
        operation: &'static str,
        targets: &[String],
        content: &OutboundContent,
        pacing: Duration,
    ) -> BatchReport {
        info!(
            total = targets.len(),
            kind = content.kind(),
            pacing_ms = pacing.as_millis() as u64,
            "starting batch send"
        );

        let mut results = Vec::with_capacity(targets.len());
        let mut transmitted = false;
        for target in targets {
            let to = match self.normalizer.normalize(target) {
                Ok(to) => to,
                Err(e) => {
                    warn!(target = %target, error = %e, "skipping malformed target");
                    results.push(DeliveryOutcome::failed(target, None, e));
                    continue;
                }
            };

            if transmitted {
                tokio::time::sleep(pacing).await;
            }
            transmitted = true;

            match self.transmit(operation, &to, content).await {
                Ok(message_id) => results.push(DeliveryOutcome::delivered(SendReceipt {
                    to,
                    original: target.clone(),
                    message_id,
                    timestamp: Utc::now(),
                })),
                Err(e) => {
                    warn!(to = %to, error = %e, "batch item failed");
                    results.push(DeliveryOutcome::failed(target, Some(to), e));
                }
            }
        }

        let report = BatchReport::from_outcomes(results);
        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "batch send finished"
        );
        report
    }

    /// Creates a multi-recipient target from individual numbers.
    ///
    /// Malformed recipients are skipped; duplicates collapse to one.
    pub async fn create_broadcast_target(
        &self,
        name: &str,
        recipients: &[String],
    ) -> Result<BroadcastTarget, SessionError> {
        let name = name.trim();
        require_text(name, "broadcast name")?;
        self.ensure_connection().await?;

        let members = self.collect_members(recipients, false)?;
        if members.is_empty() {
            return Err(SessionError::Validation("no valid recipients".into()));
        }

        let operation = "create broadcast target";
        let permit = self.acquire().await?;
        let result = permit.connection.group_create(name, &members).await;
        let group = self.settle(&permit, operation, result)?;
        let id = Jid::parse(&group.id).ok_or_else(|| SessionError::Provider {
            operation,
            source: TransportError::Protocol(format!("invalid target id `{}`", group.id)),
        })?;

        info!(id = %id, recipients = members.len(), "broadcast target created");
        Ok(BroadcastTarget {
            id,
            name: group.subject.unwrap_or_else(|| name.to_string()),
            recipient_count: members.len(),
            recipients: members,
            created_at: Utc::now(),
        })
    }

    pub async fn send_to_broadcast_target(
        &self,
        id: &str,
        text: &str,
    ) -> Result<SendReceipt, SessionError> {
        self.ensure_connection().await?;
        let to = self.target_address(id)?;
        require_text(text, "message")?;
        self.send_to(
            "send to broadcast target",
            id,
            to,
            &OutboundContent::Text(text.to_string()),
        )
        .await
    }

    pub async fn send_image_to_broadcast_target(
        &self,
        id: &str,
        url: &str,
        caption: &str,
    ) -> Result<SendReceipt, SessionError> {
        self.ensure_connection().await?;
        let to = self.target_address(id)?;
        validate_image_url(url)?;
        let content = OutboundContent::Image {
            source: ImageSource::Url(url.trim().to_string()),
            caption: caption.to_string(),
        };
        self.send_to("send image to broadcast target", id, to, &content)
            .await
    }

    pub async fn update_broadcast_participants(
        &self,
        id: &str,
        action: ParticipantAction,
        participants: &[String],
    ) -> Result<ParticipantsReport, SessionError> {
        self.ensure_connection().await?;
        let target = self.target_address(id)?;
        let members = self.collect_members(participants, true)?;
        if members.is_empty() {
            return Err(SessionError::Validation("no participants given".into()));
        }

        let permit = self.acquire().await?;
        let result = permit
            .connection
            .group_participants_update(&target, &members, action)
            .await;
        let results = self.settle(&permit, "update participants", result)?;

        info!(target = %target, %action, count = members.len(), "participants updated");
        Ok(ParticipantsReport {
            broadcast_id: target,
            action,
            participant_count: members.len(),
            results,
            timestamp: Utc::now(),
        })
    }

    pub async fn delete_broadcast_target(&self, id: &str) -> Result<DeletionReceipt, SessionError> {
        self.ensure_connection().await?;
        let target = self.target_address(id)?;

        let permit = self.acquire().await?;
        let result = permit.connection.group_leave(&target).await;
        self.settle(&permit, "delete broadcast target", result)?;

        info!(target = %target, "left broadcast target");
        Ok(DeletionReceipt {
            broadcast_id: target,
            timestamp: Utc::now(),
        })
    }

    /// Queries a target. Groups fall back to group metadata when the
    /// broadcast-list query is refused.
    pub async fn broadcast_target_info(
        &self,
        id: &str,
    ) -> Result<BroadcastTargetInfo, SessionError> {
        self.ensure_connection().await?;
        let target = self.target_address(id)?;

        let permit = self.acquire().await?;
        let listed = permit.connection.broadcast_list_info(&target).await;
        let info = match listed {
            Ok(BroadcastListInfo { name, recipients }) => BroadcastTargetInfo {
                id: target,
                name,
                total_recipients: recipients.len(),
                recipients,
                description: None,
                owner: None,
                created: None,
                source: InfoSource::BroadcastList,
            },
            Err(e) if target.kind() == JidKind::Group && !e.is_connection_loss() => {
                debug!(target = %target, error = %e, "broadcast list query refused, using group metadata");
                let result = permit.connection.group_metadata(&target).await;
                let group = self.settle(&permit, "query group metadata", result)?;
                BroadcastTargetInfo {
                    id: target,
                    name: group.subject,
                    total_recipients: group.participants.len(),
                    recipients: group.participants,
                    description: group.description,
                    owner: group.owner,
                    created: group.creation,
                    source: InfoSource::GroupMetadata,
                }
            }
            Err(e) => return Err(self.fail(&permit, "query broadcast target", e)),
        };
        Ok(info)
    }

    /// Announcement groups and broadcast lists, plus the status broadcast.
    pub async fn list_broadcast_targets(&self) -> Result<Vec<ChatSummary>, SessionError> {
        self.ensure_connection().await?;
        let permit = self.acquire().await?;
        let result = permit.connection.group_fetch_all_participating().await;
        let groups = self.settle(&permit, "list broadcast targets", result)?;

        let mut targets: Vec<ChatSummary> = groups
            .iter()
            .filter(|g| g.announce || Jid::parse(&g.id).is_some_and(|jid| jid.is_broadcast()))
            .map(chat_summary)
            .collect();
        targets.push(ChatSummary {
            id: Jid::StatusBroadcast.to_string(),
            kind: JidKind::Status,
            name: "Status Broadcast".into(),
            participant_count: 0,
            announce: false,
            created: None,
        });
        Ok(targets)
    }

    pub async fn list_chats(&self) -> Result<ChatDirectory, SessionError> {
        self.ensure_connection().await?;
        let permit = self.acquire().await?;
        let result = permit.connection.group_fetch_all_participating().await;
        let groups = self.settle(&permit, "list chats", result)?;

        let mut directory = ChatDirectory::default();
        for group in &groups {
            let summary = chat_summary(group);
            match summary.kind {
                JidKind::Broadcast | JidKind::Status => directory.broadcasts.push(summary),
                _ => directory.groups.push(summary),
            }
        }
        Ok(directory)
    }
}
