// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging protocol seam.
//!
//! A [`ProtocolConnector`] opens one connection per call. The returned
//! [`ProtocolSession`] pairs the command handle with the ordered event stream
//! for that connection; the stream ends when the connection is gone.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::jid::Jid;
use crate::types::{
    BroadcastListInfo, Credentials, GroupInfo, MessageId, OutboundContent, ParticipantAction,
    ParticipantUpdate, ProtocolEvent,
};

/// A freshly opened connection and its event stream.
pub struct ProtocolSession {
    pub connection: Arc<dyn ProtocolConnection>,
    pub events: mpsc::Receiver<ProtocolEvent>,
}

impl std::fmt::Debug for ProtocolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolSession").finish_non_exhaustive()
    }
}

/// Opens protocol connections.
#[async_trait]
pub trait ProtocolConnector: Send + Sync + 'static {
    /// Opens a new connection authenticated with `credentials`.
    ///
    /// Empty credentials start a pairing flow: the event stream will carry
    /// [`ProtocolEvent::PairingToken`] values until a device is linked.
    async fn connect(&self, credentials: Credentials) -> Result<ProtocolSession, TransportError>;
}

/// Commands accepted by a live connection.
#[async_trait]
pub trait ProtocolConnection: Send + Sync {
    async fn send_message(
        &self,
        to: &Jid,
        content: &OutboundContent,
    ) -> Result<MessageId, TransportError>;

    async fn group_create(
        &self,
        subject: &str,
        participants: &[Jid],
    ) -> Result<GroupInfo, TransportError>;

    async fn group_participants_update(
        &self,
        group: &Jid,
        participants: &[Jid],
        action: ParticipantAction,
    ) -> Result<Vec<ParticipantUpdate>, TransportError>;

    async fn group_leave(&self, group: &Jid) -> Result<(), TransportError>;

    async fn group_metadata(&self, group: &Jid) -> Result<GroupInfo, TransportError>;

    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupInfo>, TransportError>;

    async fn broadcast_list_info(&self, list: &Jid) -> Result<BroadcastListInfo, TransportError>;

    /// Closes the connection. Idempotent.
    async fn end(&self);
}
