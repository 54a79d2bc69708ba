// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp session management for Notigate.
//!
//! A single [`SessionManager`] supervises one protocol connection: it opens
//! and reopens it, persists rotated credentials, surfaces pairing QR codes,
//! and gates outbound commands so they only run against a connected session.
//! The protocol itself is reached through [`BridgeConnector`] or any other
//! [`notigate_core::ProtocolConnector`].

pub mod address;
pub mod bridge;
pub mod credentials;
pub mod error;
mod gate;
pub mod observer;
pub mod pairing;
pub mod state;
pub mod supervisor;
pub mod types;

pub use address::{AddressError, AddressNormalizer};
pub use bridge::{BridgeConnection, BridgeConnector};
pub use credentials::{CredentialError, CredentialStore};
pub use error::SessionError;
pub use observer::InboundObserver;
pub use pairing::{PairingPresenter, render_data_url, render_png, render_terminal};
pub use state::{ConnectionState, SessionSnapshot};
pub use supervisor::{SessionConfig, SessionManager};
pub use types::{
    BatchReport, BroadcastTarget, BroadcastTargetInfo, ChatDirectory, ChatSummary,
    ConnectionStatus, DeletionReceipt, DeliveryOutcome, InfoSource, ParticipantsReport,
    SendReceipt, UniversalReceipt,
};
