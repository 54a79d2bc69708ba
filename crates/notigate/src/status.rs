// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `notigate status` command implementation.
//!
//! Queries the health endpoint of a running gateway. Falls back gracefully
//! when nothing is listening.

use std::time::Duration;

use notigate_config::NotigateConfig;
use notigate_core::NotigateError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    version: String,
    uptime_secs: u64,
    push: bool,
    whatsapp: Option<WhatsAppHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhatsAppHealth {
    state: String,
    has_pairing_token: bool,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub version: Option<String>,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub push: Option<bool>,
    pub whatsapp: Option<String>,
    pub url: String,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn health_url(config: &NotigateConfig) -> String {
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        host => host,
    };
    format!(
        "http://{host}:{}/api/notifications/health",
        config.server.port
    )
}

fn whatsapp_label(health: &HealthResponse) -> String {
    match &health.whatsapp {
        None => "disabled".to_string(),
        Some(wa) if wa.has_pairing_token => format!("{} (QR code waiting)", wa.state),
        Some(wa) => wa.state.clone(),
    }
}

/// Run the `notigate status` command.
pub async fn run_status(config: &NotigateConfig, json: bool) -> Result<(), NotigateError> {
    let url = health_url(config);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| NotigateError::Internal(format!("failed to create HTTP client: {e}")))?;

    let health = match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            Some(resp.json::<HealthResponse>().await.map_err(|e| {
                NotigateError::Internal(format!("failed to parse health response: {e}"))
            })?)
        }
        Ok(resp) => {
            return Err(NotigateError::Internal(format!(
                "health endpoint returned {}",
                resp.status()
            )));
        }
        Err(_) => None,
    };

    let response = match &health {
        Some(health) => StatusResponse {
            running: true,
            version: Some(health.version.clone()),
            uptime_secs: Some(health.uptime_secs),
            uptime_human: Some(format_uptime(health.uptime_secs)),
            push: Some(health.push),
            whatsapp: Some(whatsapp_label(health)),
            url,
        },
        None => StatusResponse {
            running: false,
            version: None,
            uptime_secs: None,
            uptime_human: None,
            push: None,
            whatsapp: None,
            url,
        },
    };

    if json {
        let out = serde_json::to_string_pretty(&response)
            .map_err(|e| NotigateError::Internal(format!("failed to encode status: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    if !response.running {
        println!("notigate: not running ({})", response.url);
        return Ok(());
    }
    println!(
        "notigate {}: running, up {}",
        response.version.as_deref().unwrap_or("?"),
        response.uptime_human.as_deref().unwrap_or("?"),
    );
    println!(
        "  push:     {}",
        if response.push == Some(true) { "enabled" } else { "disabled" }
    );
    println!(
        "  whatsapp: {}",
        response.whatsapp.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(90_000), "1d 1h 0m");
    }

    #[test]
    fn wildcard_host_is_queried_on_loopback() {
        let mut config = NotigateConfig::default();
        config.server.host = "0.0.0.0".into();
        config.server.port = 4000;
        assert_eq!(
            health_url(&config),
            "http://127.0.0.1:4000/api/notifications/health"
        );
    }

    #[test]
    fn health_body_parses() {
        let body = r#"{
            "success": true,
            "message": "Notigate is running",
            "timestamp": "2026-01-01T00:00:00Z",
            "version": "0.1.0",
            "uptimeSecs": 120,
            "push": false,
            "whatsapp": {
                "state": "awaiting_pairing",
                "isConnected": false,
                "isReconnecting": false,
                "reconnectAttempts": 0,
                "maxReconnectAttempts": 5,
                "hasPairingToken": true
            }
        }"#;
        let health: HealthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(health.uptime_secs, 120);
        assert_eq!(whatsapp_label(&health), "awaiting_pairing (QR code waiting)");
    }

    #[tokio::test]
    async fn nothing_listening_reports_not_running() {
        let mut config = NotigateConfig::default();
        config.server.host = "127.0.0.1".into();
        // Reserve a port, then free it so nothing listens there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        config.server.port = listener.local_addr().unwrap().port();
        drop(listener);

        run_status(&config, true).await.unwrap();
    }
}
