// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Notigate.
//!
//! Exposes push notifications and the WhatsApp session under
//! `/api/notifications`, with API key authentication, fixed-window rate
//! limits, and CORS.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod server;
pub mod validation;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use rate_limit::{FixedWindowLimiter, RateLimits};
pub use server::{GatewayState, build_router, start_server};
