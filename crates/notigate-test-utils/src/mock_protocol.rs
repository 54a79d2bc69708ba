// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock protocol connector for deterministic session tests.
//!
//! `MockConnector` hands out one [`MockConnection`] per `connect()` call.
//! Tests drive the session by emitting events into a connection and assert
//! on what was sent through it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use notigate_core::{
    BroadcastListInfo, ConnectionUpdate, Credentials, DisconnectReason, GroupInfo, Jid, MessageId,
    OutboundContent, ParticipantAction, ParticipantUpdate, ProtocolConnection, ProtocolConnector,
    ProtocolEvent, ProtocolSession, TransportError,
};

/// A message captured by [`MockConnection::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: Jid,
    pub content: OutboundContent,
}

/// A scriptable protocol connector.
///
/// By default every connection reports `Open` as soon as it is created.
pub struct MockConnector {
    connects: AtomicUsize,
    failures_remaining: AtomicUsize,
    auto_open: AtomicBool,
    pairing_token: Mutex<Option<String>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
    credentials_seen: Mutex<Vec<Credentials>>,
}

impl MockConnector {
    /// A connector whose connections open immediately.
    pub fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            auto_open: AtomicBool::new(true),
            pairing_token: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
            credentials_seen: Mutex::new(Vec::new()),
        }
    }

    /// A connector whose connections stay closed until the test opens them.
    pub fn manual() -> Self {
        let connector = Self::new();
        connector.set_auto_open(false);
        connector
    }

    /// A connector whose connections ask for pairing with `token` and wait.
    pub fn pairing(token: impl Into<String>) -> Self {
        let mut connector = Self::manual();
        connector.pairing_token = Mutex::new(Some(token.into()));
        connector
    }

    pub fn set_auto_open(&self, auto_open: bool) {
        self.auto_open.store(auto_open, Ordering::SeqCst);
    }

    /// The next `n` connect calls fail with a socket error.
    pub fn fail_next_connects(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Total connect calls, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Connections handed out so far, oldest first.
    pub async fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().await.clone()
    }

    pub async fn latest(&self) -> Option<Arc<MockConnection>> {
        self.connections.lock().await.last().cloned()
    }

    /// Credentials passed to each connect call, in order.
    pub async fn credentials_seen(&self) -> Vec<Credentials> {
        self.credentials_seen.lock().await.clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolConnector for MockConnector {
    async fn connect(&self, credentials: Credentials) -> Result<ProtocolSession, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen.lock().await.push(credentials);

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TransportError::Socket("mock connect refused".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        let connection = Arc::new(MockConnection::new(tx));

        if let Some(token) = self.pairing_token.lock().await.clone() {
            connection.emit(ProtocolEvent::PairingToken(token)).await;
        }
        if self.auto_open.load(Ordering::SeqCst) {
            connection.open().await;
        }

        self.connections.lock().await.push(Arc::clone(&connection));
        Ok(ProtocolSession {
            connection,
            events: rx,
        })
    }
}

/// One mock connection.
///
/// Sends are recorded; sends to addresses registered with
/// [`MockConnection::fail_sends_to`] fail with the given error.
pub struct MockConnection {
    events: mpsc::Sender<ProtocolEvent>,
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<Jid, TransportError>>,
    groups: Mutex<Vec<GroupInfo>>,
    broadcast_lists: Mutex<HashMap<Jid, BroadcastListInfo>>,
    participant_calls: Mutex<Vec<(Jid, Vec<Jid>, ParticipantAction)>>,
    left: Mutex<Vec<Jid>>,
    ended: AtomicBool,
    next_id: AtomicU64,
}

impl MockConnection {
    fn new(events: mpsc::Sender<ProtocolEvent>) -> Self {
        Self {
            events,
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            groups: Mutex::new(Vec::new()),
            broadcast_lists: Mutex::new(HashMap::new()),
            participant_calls: Mutex::new(Vec::new()),
            left: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Delivers an event to whoever consumes this connection's stream.
    pub async fn emit(&self, event: ProtocolEvent) {
        // The consumer may already be gone.
        let _ = self.events.send(event).await;
    }

    pub async fn open(&self) {
        self.emit(ProtocolEvent::Connection(ConnectionUpdate::Open))
            .await;
    }

    pub async fn close(&self, reason: DisconnectReason) {
        self.emit(ProtocolEvent::Connection(ConnectionUpdate::Close(reason)))
            .await;
    }

    pub async fn fail_sends_to(&self, to: Jid, error: TransportError) {
        self.failures.lock().await.insert(to, error);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn add_group(&self, group: GroupInfo) {
        self.groups.lock().await.push(group);
    }

    pub async fn groups(&self) -> Vec<GroupInfo> {
        self.groups.lock().await.clone()
    }

    /// Makes `broadcast_list_info` answer for `list`. Unregistered lists
    /// are reported as unsupported.
    pub async fn add_broadcast_list(&self, list: Jid, info: BroadcastListInfo) {
        self.broadcast_lists.lock().await.insert(list, info);
    }

    pub async fn participant_calls(&self) -> Vec<(Jid, Vec<Jid>, ParticipantAction)> {
        self.participant_calls.lock().await.clone()
    }

    pub async fn left(&self) -> Vec<Jid> {
        self.left.lock().await.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<(), TransportError> {
        if self.is_ended() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProtocolConnection for MockConnection {
    async fn send_message(
        &self,
        to: &Jid,
        content: &OutboundContent,
    ) -> Result<MessageId, TransportError> {
        self.check_open()?;
        if let Some(error) = self.failures.lock().await.get(to) {
            return Err(error.clone());
        }
        self.sent.lock().await.push(SentMessage {
            to: to.clone(),
            content: content.clone(),
        });
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageId(format!("MOCK{n:04}")))
    }

    async fn group_create(
        &self,
        subject: &str,
        participants: &[Jid],
    ) -> Result<GroupInfo, TransportError> {
        self.check_open()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let group = GroupInfo {
            id: format!("12036300{n:04}@g.us"),
            subject: Some(subject.to_string()),
            creation: Some(1_700_000_000),
            participants: participants.iter().map(Jid::to_string).collect(),
            ..Default::default()
        };
        self.groups.lock().await.push(group.clone());
        Ok(group)
    }

    async fn group_participants_update(
        &self,
        group: &Jid,
        participants: &[Jid],
        action: ParticipantAction,
    ) -> Result<Vec<ParticipantUpdate>, TransportError> {
        self.check_open()?;
        self.participant_calls
            .lock()
            .await
            .push((group.clone(), participants.to_vec(), action));
        Ok(participants
            .iter()
            .map(|jid| ParticipantUpdate {
                jid: jid.to_string(),
                status: "200".into(),
            })
            .collect())
    }

    async fn group_leave(&self, group: &Jid) -> Result<(), TransportError> {
        self.check_open()?;
        let id = group.to_string();
        self.groups.lock().await.retain(|g| g.id != id);
        self.left.lock().await.push(group.clone());
        Ok(())
    }

    async fn group_metadata(&self, group: &Jid) -> Result<GroupInfo, TransportError> {
        self.check_open()?;
        let id = group.to_string();
        self.groups
            .lock()
            .await
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| TransportError::Rejected("item-not-found".into()))
    }

    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupInfo>, TransportError> {
        self.check_open()?;
        Ok(self.groups.lock().await.clone())
    }

    async fn broadcast_list_info(&self, list: &Jid) -> Result<BroadcastListInfo, TransportError> {
        self.check_open()?;
        self.broadcast_lists
            .lock()
            .await
            .get(list)
            .cloned()
            .ok_or_else(|| TransportError::Unsupported("broadcast list query".into()))
    }

    async fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            let _ = self
                .events
                .try_send(ProtocolEvent::Connection(ConnectionUpdate::Close(
                    DisconnectReason::ConnectionClosed,
                )));
        }
    }
}
