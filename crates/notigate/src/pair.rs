// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `notigate pair` command implementation.
//!
//! Opens the WhatsApp session with terminal QR output forced on, waits for
//! the device to be linked, and exits. The credentials written while pairing
//! are picked up by the next `notigate serve`.

use std::sync::Arc;
use std::time::Duration;

use notigate_config::NotigateConfig;
use notigate_core::NotigateError;
use notigate_whatsapp::{BridgeConnector, SessionConfig, SessionError, SessionManager};
use tracing::info;

use crate::serve::init_tracing;
use crate::shutdown;

pub async fn run_pair(config: NotigateConfig, timeout_secs: u64) -> Result<(), NotigateError> {
    init_tracing(&config.server.log_level);

    if !config.whatsapp.enabled {
        return Err(NotigateError::Config(
            "whatsapp is disabled in the configuration".into(),
        ));
    }

    let mut session_config = SessionConfig::from_config(&config.whatsapp);
    session_config.print_qr = true;
    let manager = SessionManager::new(
        session_config,
        Arc::new(BridgeConnector::from_config(&config.whatsapp)),
    );

    let cancel = shutdown::install_signal_handler();
    let result = tokio::select! {
        result = pair(&manager, Duration::from_secs(timeout_secs)) => result,
        _ = cancel.cancelled() => Err(SessionError::ShutDown),
    };
    manager.shutdown().await;

    match result {
        Ok(()) => {
            println!("WhatsApp device linked. Credentials saved to {}", config.whatsapp.auth_dir);
            Ok(())
        }
        Err(e) => Err(NotigateError::Channel {
            message: format!("pairing failed: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}

async fn pair(manager: &Arc<SessionManager>, deadline: Duration) -> Result<(), SessionError> {
    manager.initialize().await?;
    if manager.is_connected() {
        info!("stored credentials are still valid, nothing to pair");
        return Ok(());
    }
    eprintln!("Waiting for the QR code to be scanned...");
    manager.wait_until_connected(deadline).await
}
