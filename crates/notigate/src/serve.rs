// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `notigate serve` command implementation.
//!
//! Builds the enabled backends (FCM push, WhatsApp session), mounts them on
//! the HTTP gateway, and serves until SIGINT/SIGTERM.

use std::sync::Arc;

use notigate_config::NotigateConfig;
use notigate_core::{NotigateError, PushProvider};
use notigate_gateway::{GatewayState, RateLimits, build_router, start_server};
use notigate_whatsapp::{BridgeConnector, SessionConfig, SessionManager};
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `notigate serve` command.
pub async fn run_serve(config: NotigateConfig) -> Result<(), NotigateError> {
    init_tracing(&config.server.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting notigate serve");

    if config.server.api_keys.is_empty() {
        warn!("server.api_keys is empty, every protected endpoint will answer 401");
    }

    let push = build_push(&config).await?;
    let whatsapp = build_whatsapp(&config);

    if let Some(manager) = &whatsapp {
        let manager = manager.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.initialize().await {
                warn!(error = %e, "WhatsApp initialization failed, retry via /whatsapp/initialize");
            }
        });
    }

    let limits = RateLimits::from_config(&config.rate_limit);
    let state = GatewayState::new(push.clone(), whatsapp.clone());
    let router = build_router(state, &config.server, &limits);

    let cancel = shutdown::install_signal_handler();
    let served = start_server(&config.server, router, cancel).await;

    if let Some(manager) = &whatsapp {
        manager.shutdown().await;
    }
    if let Some(push) = &push {
        if let Err(e) = push.shutdown().await {
            warn!(error = %e, "push provider shutdown failed");
        }
    }

    served?;
    info!("notigate serve shutdown complete");
    Ok(())
}

#[cfg(feature = "push")]
async fn build_push(config: &NotigateConfig) -> Result<Option<Arc<dyn PushProvider>>, NotigateError> {
    if !config.push.enabled {
        info!("push notifications disabled");
        return Ok(None);
    }
    let provider = notigate_push::FcmProvider::from_config(&config.push).await?;
    Ok(Some(Arc::new(provider)))
}

#[cfg(not(feature = "push"))]
async fn build_push(config: &NotigateConfig) -> Result<Option<Arc<dyn PushProvider>>, NotigateError> {
    if config.push.enabled {
        return Err(NotigateError::Config(
            "push is enabled but notigate was built without the `push` feature".into(),
        ));
    }
    Ok(None)
}

fn build_whatsapp(config: &NotigateConfig) -> Option<Arc<SessionManager>> {
    if !config.whatsapp.enabled {
        info!("WhatsApp disabled");
        return None;
    }
    let connector = Arc::new(BridgeConnector::from_config(&config.whatsapp));
    info!(
        bridge = %config.whatsapp.bridge_url,
        auth_dir = %config.whatsapp.auth_dir,
        "WhatsApp session configured"
    );
    Some(SessionManager::new(
        SessionConfig::from_config(&config.whatsapp),
        connector,
    ))
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("notigate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
