// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Notigate integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests without
//! a protocol bridge or push credentials.
//!
//! # Components
//!
//! - [`MockConnector`] - Scriptable protocol connector; every connect yields a [`MockConnection`]
//! - [`MockPushProvider`] - Push provider that records calls and fails on demand

pub mod mock_protocol;
pub mod mock_push;

pub use mock_protocol::{MockConnection, MockConnector, SentMessage};
pub use mock_push::{MockPushProvider, PushCall};
