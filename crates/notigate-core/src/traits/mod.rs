// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod protocol;
pub mod push;

pub use adapter::PluginAdapter;
pub use protocol::{ProtocolConnection, ProtocolConnector, ProtocolSession};
pub use push::PushProvider;
