// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Notigate notification gateway.
//!
//! This crate provides the trait seams, error types, and common types shared
//! by the push provider, the WhatsApp session, and the HTTP gateway.

pub mod error;
pub mod jid;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{NotigateError, PushError, PushErrorCode, TransportError};
pub use jid::{Jid, JidKind};
pub use types::{
    AdapterType, BroadcastListInfo, ConnectionUpdate, CredentialUpdate, Credentials,
    DisconnectReason, GroupInfo, HealthStatus, ImageSource, IncomingMessage, MessageId,
    MulticastReport, OutboundContent, ParticipantAction, ParticipantUpdate, ProtocolEvent,
    PushData, PushNotification, PushSendResponse, TopicManagementFailure, TopicManagementReport,
};

pub use traits::{PluginAdapter, ProtocolConnection, ProtocolConnector, ProtocolSession, PushProvider};
