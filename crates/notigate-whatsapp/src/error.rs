// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session errors.

use notigate_core::TransportError;
use thiserror::Error;

use crate::address::AddressError;
use crate::credentials::CredentialError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No usable connection, and none could be established in time.
    #[error("WhatsApp not connected: {0}")]
    Connection(String),

    /// A reconnect is already in flight.
    #[error("WhatsApp is reconnecting, try again shortly")]
    ConnectionBusy,

    /// Bad caller input (address, file, missing field).
    #[error("{0}")]
    Validation(String),

    /// The protocol rejected or failed the command.
    #[error("{operation} failed: {source}")]
    Provider {
        operation: &'static str,
        source: TransportError,
    },

    /// Credentials were invalidated remotely; a fresh pairing is required.
    #[error("WhatsApp session logged out; force a reconnect to pair again")]
    PermanentLogout,

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("WhatsApp session is shut down")]
    ShutDown,
}

impl From<AddressError> for SessionError {
    fn from(err: AddressError) -> Self {
        SessionError::Validation(err.to_string())
    }
}
