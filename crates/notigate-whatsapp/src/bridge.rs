// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport to a protocol bridge.
//!
//! The bridge speaks JSON text frames tagged by `type`. After the `hello`
//! frame (device name plus stored credentials) it pushes `qr`, `connection`,
//! `creds`, and `messages` frames, and answers `request` frames with
//! `response` frames carrying the same id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use notigate_config::WhatsAppConfig;
use notigate_core::{
    BroadcastListInfo, ConnectionUpdate, CredentialUpdate, Credentials, DisconnectReason,
    GroupInfo, ImageSource, IncomingMessage, Jid, MessageId, OutboundContent, ParticipantAction,
    ParticipantUpdate, ProtocolConnection, ProtocolConnector, ProtocolEvent, ProtocolSession,
    TransportError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type BridgeStream = (SplitSink<WsStream, Message>, SplitStream<WsStream>);
type Pending = DashMap<String, oneshot::Sender<Result<Value, TransportError>>>;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundFrame<'a> {
    Hello {
        device: &'a str,
        credentials: &'a Credentials,
    },
    Request {
        id: &'a str,
        method: &'a str,
        params: Value,
    },
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum LinkState {
    Connecting,
    Open,
    Close,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    fn into_transport(self) -> TransportError {
        match self.code.as_str() {
            "unsupported" => TransportError::Unsupported(self.message),
            _ => TransportError::Rejected(format!("{}: {}", self.code, self.message)),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    Qr {
        code: String,
    },
    Connection {
        state: LinkState,
        #[serde(default)]
        reason: Option<String>,
    },
    Creds {
        #[serde(default)]
        current: Option<Value>,
        #[serde(default)]
        keys: std::collections::BTreeMap<String, Option<Value>>,
    },
    Messages {
        #[serde(default)]
        live: bool,
        #[serde(default)]
        messages: Vec<IncomingMessage>,
    },
    Response {
        id: String,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<ErrorBody>,
    },
}

#[derive(Deserialize)]
struct SentBody {
    id: String,
}

/// Opens bridge sessions over WebSocket.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    url: String,
    device_name: String,
    query_timeout: Duration,
    connect_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(url: impl Into<String>, device_name: impl Into<String>, query_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            device_name: device_name.into(),
            query_timeout,
            connect_timeout: query_timeout,
        }
    }

    /// Bounds the WebSocket upgrade and the `hello` frame.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self::new(
            config.bridge_url.clone(),
            config.device_name.clone(),
            config.query_timeout(),
        )
        .with_connect_timeout(config.connect_timeout())
    }

    async fn handshake(&self, credentials: &Credentials) -> Result<BridgeStream, TransportError> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Socket(format!("bridge at {}: {e}", self.url)))?;
        let (mut sink, source) = stream.split();

        let hello = serde_json::to_string(&OutboundFrame::Hello {
            device: &self.device_name,
            credentials,
        })
        .map_err(|e| TransportError::Protocol(e.to_string()))?;
        sink.send(Message::Text(hello.into()))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))?;
        Ok((sink, source))
    }
}

#[async_trait]
impl ProtocolConnector for BridgeConnector {
    async fn connect(&self, credentials: Credentials) -> Result<ProtocolSession, TransportError> {
        let (mut sink, mut source) =
            tokio::time::timeout(self.connect_timeout, self.handshake(&credentials))
                .await
                .map_err(|_| {
                    warn!(
                        url = %self.url,
                        timeout_ms = self.connect_timeout.as_millis() as u64,
                        "bridge handshake timed out"
                    );
                    TransportError::Timeout(self.connect_timeout)
                })??;
        debug!(url = %self.url, "bridge session opened");

        let (frames_tx, mut frames_rx) = mpsc::channel::<Message>(64);
        let (events_tx, events_rx) = mpsc::channel::<ProtocolEvent>(256);
        let pending: Arc<Pending> = Arc::new(DashMap::new());
        let closed = CancellationToken::new();

        let writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_closed.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = frames_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = sink.send(frame).await {
                            warn!(error = %e, "bridge write failed");
                            writer_closed.cancel();
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
        });

        let reader_closed = closed.clone();
        let reader_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            let mut close_reported = false;
            loop {
                let message = tokio::select! {
                    _ = reader_closed.cancelled() => break,
                    message = source.next() => message,
                };
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = route_frame(text.as_str(), &reader_pending) {
                            close_reported |= matches!(
                                event,
                                ProtocolEvent::Connection(ConnectionUpdate::Close(_))
                            );
                            if events_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "bridge closed the socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "bridge read failed");
                        break;
                    }
                    None => break,
                }
            }

            reader_closed.cancel();
            let waiting: Vec<String> = reader_pending.iter().map(|e| e.key().clone()).collect();
            for id in waiting {
                if let Some((_, tx)) = reader_pending.remove(&id) {
                    let _ = tx.send(Err(TransportError::Closed));
                }
            }
            if !close_reported {
                let _ = events_tx
                    .send(ProtocolEvent::Connection(ConnectionUpdate::Close(
                        DisconnectReason::ConnectionLost,
                    )))
                    .await;
            }
        });

        Ok(ProtocolSession {
            connection: Arc::new(BridgeConnection {
                frames: frames_tx,
                pending,
                closed,
                query_timeout: self.query_timeout,
            }),
            events: events_rx,
        })
    }
}

/// Decodes one text frame. Responses are delivered to their waiter and
/// produce no event.
fn route_frame(text: &str, pending: &Pending) -> Option<ProtocolEvent> {
    let frame = match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "ignoring malformed bridge frame");
            return None;
        }
    };

    match frame {
        InboundFrame::Qr { code } => Some(ProtocolEvent::PairingToken(code)),
        InboundFrame::Connection { state, reason } => match state {
            LinkState::Connecting => {
                trace!("bridge connecting");
                None
            }
            LinkState::Open => Some(ProtocolEvent::Connection(ConnectionUpdate::Open)),
            LinkState::Close => {
                let reason = reason
                    .as_deref()
                    .map_or(DisconnectReason::ConnectionClosed, DisconnectReason::from_code);
                Some(ProtocolEvent::Connection(ConnectionUpdate::Close(reason)))
            }
        },
        InboundFrame::Creds { current, keys } => {
            Some(ProtocolEvent::CredentialsRotated(CredentialUpdate { current, keys }))
        }
        InboundFrame::Messages { live, messages } => {
            Some(ProtocolEvent::Messages { live, messages })
        }
        InboundFrame::Response { id, result, error } => {
            match pending.remove(&id) {
                Some((_, tx)) => {
                    let outcome = match error {
                        Some(error) => Err(error.into_transport()),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    let _ = tx.send(outcome);
                }
                None => debug!(id, "response for unknown or expired request"),
            }
            None
        }
    }
}

fn content_params(to: &Jid, content: &OutboundContent) -> Value {
    match content {
        OutboundContent::Text(text) => json!({ "to": to.to_string(), "text": text }),
        OutboundContent::Image { source, caption } => {
            let image = match source {
                ImageSource::Url(url) => json!({ "url": url }),
                ImageSource::Bytes(bytes) => json!({ "base64": STANDARD.encode(bytes) }),
            };
            json!({ "to": to.to_string(), "image": image, "caption": caption })
        }
    }
}

/// Command handle for one bridge session.
pub struct BridgeConnection {
    frames: mpsc::Sender<Message>,
    pending: Arc<Pending>,
    closed: CancellationToken,
    query_timeout: Duration,
}

impl BridgeConnection {
    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let frame = serde_json::to_string(&OutboundFrame::Request {
            id: &id,
            method,
            params,
        })
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        if self.frames.send(Message::Text(frame.into())).await.is_err() {
            self.pending.remove(&id);
            return Err(TransportError::Closed);
        }

        let value = match tokio::time::timeout(self.query_timeout, rx).await {
            Ok(Ok(outcome)) => outcome?,
            Ok(Err(_)) => return Err(TransportError::Closed),
            Err(_) => {
                self.pending.remove(&id);
                return Err(TransportError::Timeout(self.query_timeout));
            }
        };

        serde_json::from_value(value)
            .map_err(|e| TransportError::Protocol(format!("unexpected {method} response: {e}")))
    }
}

fn addresses(jids: &[Jid]) -> Vec<String> {
    jids.iter().map(Jid::to_string).collect()
}

#[async_trait]
impl ProtocolConnection for BridgeConnection {
    async fn send_message(
        &self,
        to: &Jid,
        content: &OutboundContent,
    ) -> Result<MessageId, TransportError> {
        let sent: SentBody = self.request("send_message", content_params(to, content)).await?;
        Ok(MessageId(sent.id))
    }

    async fn group_create(
        &self,
        subject: &str,
        participants: &[Jid],
    ) -> Result<GroupInfo, TransportError> {
        self.request(
            "group_create",
            json!({ "subject": subject, "participants": addresses(participants) }),
        )
        .await
    }

    async fn group_participants_update(
        &self,
        group: &Jid,
        participants: &[Jid],
        action: ParticipantAction,
    ) -> Result<Vec<ParticipantUpdate>, TransportError> {
        self.request(
            "group_participants_update",
            json!({
                "group": group.to_string(),
                "participants": addresses(participants),
                "action": action,
            }),
        )
        .await
    }

    async fn group_leave(&self, group: &Jid) -> Result<(), TransportError> {
        self.request::<Value>("group_leave", json!({ "group": group.to_string() }))
            .await
            .map(drop)
    }

    async fn group_metadata(&self, group: &Jid) -> Result<GroupInfo, TransportError> {
        self.request("group_metadata", json!({ "group": group.to_string() }))
            .await
    }

    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupInfo>, TransportError> {
        self.request("group_fetch_all_participating", json!({}))
            .await
    }

    async fn broadcast_list_info(&self, list: &Jid) -> Result<BroadcastListInfo, TransportError> {
        self.request("broadcast_list_info", json!({ "list": list.to_string() }))
            .await
    }

    async fn end(&self) {
        if !self.closed.is_cancelled() {
            debug!("ending bridge session");
            self.closed.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_and_connection_frames_become_events() {
        let pending = Pending::new();
        assert_eq!(
            route_frame(r#"{"type":"qr","code":"2@abc"}"#, &pending),
            Some(ProtocolEvent::PairingToken("2@abc".into()))
        );
        assert_eq!(
            route_frame(r#"{"type":"connection","state":"open"}"#, &pending),
            Some(ProtocolEvent::Connection(ConnectionUpdate::Open))
        );
        assert_eq!(
            route_frame(
                r#"{"type":"connection","state":"close","reason":"logged_out"}"#,
                &pending
            ),
            Some(ProtocolEvent::Connection(ConnectionUpdate::Close(
                DisconnectReason::LoggedOut
            )))
        );
        assert_eq!(
            route_frame(r#"{"type":"connection","state":"connecting"}"#, &pending),
            None
        );
    }

    #[test]
    fn creds_frame_keeps_deletions() {
        let pending = Pending::new();
        let event = route_frame(
            r#"{"type":"creds","current":{"me":1},"keys":{"pre-key:1":null,"pre-key:2":{"k":2}}}"#,
            &pending,
        );
        let Some(ProtocolEvent::CredentialsRotated(update)) = event else {
            panic!("expected credentials event, got {event:?}");
        };
        assert_eq!(update.current, Some(json!({"me": 1})));
        assert_eq!(update.keys["pre-key:1"], None);
        assert_eq!(update.keys["pre-key:2"], Some(json!({"k": 2})));
    }

    #[tokio::test]
    async fn responses_resolve_their_waiter() {
        let pending = Pending::new();
        let (tx, rx) = oneshot::channel();
        pending.insert("r1".into(), tx);
        let (tx2, rx2) = oneshot::channel();
        pending.insert("r2".into(), tx2);

        assert!(route_frame(r#"{"type":"response","id":"r1","result":{"id":"M1"}}"#, &pending).is_none());
        assert_eq!(rx.await.unwrap(), Ok(json!({"id": "M1"})));

        route_frame(
            r#"{"type":"response","id":"r2","error":{"code":"unsupported","message":"no lists"}}"#,
            &pending,
        );
        assert_eq!(
            rx2.await.unwrap(),
            Err(TransportError::Unsupported("no lists".into()))
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let pending = Pending::new();
        assert!(route_frame("not json", &pending).is_none());
        assert!(route_frame(r#"{"type":"mystery"}"#, &pending).is_none());
    }

    #[test]
    fn image_params_carry_url_or_base64() {
        let to = Jid::individual("628111");
        let by_url = content_params(
            &to,
            &OutboundContent::Image {
                source: ImageSource::Url("https://x/y.png".into()),
                caption: "hi".into(),
            },
        );
        assert_eq!(by_url["image"]["url"], "https://x/y.png");
        assert_eq!(by_url["to"], "628111@s.whatsapp.net");

        let by_bytes = content_params(
            &to,
            &OutboundContent::Image {
                source: ImageSource::Bytes(vec![1, 2, 3]),
                caption: String::new(),
            },
        );
        assert_eq!(by_bytes["image"]["base64"], "AQID");
    }
}
