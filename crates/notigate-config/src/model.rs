// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Notigate configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotigateConfig {
    /// HTTP listener, authentication, and CORS.
    #[serde(default)]
    pub server: ServerConfig,

    /// Fixed-window request limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// WhatsApp session settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// FCM push settings.
    #[serde(default)]
    pub push: PushConfig,
}

/// HTTP server configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Accepted values for the `X-API-Key` header. Empty rejects every
    /// authenticated request.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Origins allowed by CORS. Requests without an `Origin` header are
    /// always allowed.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body, including image uploads.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("allowed_origins", &self.allowed_origins)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            api_keys: Vec::new(),
            allowed_origins: default_allowed_origins(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

/// Rate limiting configuration.
///
/// The general limit applies to every `/api` request; the narrower limits
/// apply on top of it to the matching route groups.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_notification_window_secs")]
    pub notification_window_secs: u64,

    #[serde(default = "default_notification_max")]
    pub notification_max: u32,

    #[serde(default = "default_multicast_window_secs")]
    pub multicast_window_secs: u64,

    #[serde(default = "default_multicast_max")]
    pub multicast_max: u32,

    #[serde(default = "default_topic_window_secs")]
    pub topic_window_secs: u64,

    #[serde(default = "default_topic_max")]
    pub topic_max: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            notification_window_secs: default_notification_window_secs(),
            notification_max: default_notification_max(),
            multicast_window_secs: default_multicast_window_secs(),
            multicast_max: default_multicast_max(),
            topic_window_secs: default_topic_window_secs(),
            topic_max: default_topic_max(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_max_requests() -> u32 {
    100
}

fn default_notification_window_secs() -> u64 {
    60
}

fn default_notification_max() -> u32 {
    10
}

fn default_multicast_window_secs() -> u64 {
    5 * 60
}

fn default_multicast_max() -> u32 {
    5
}

fn default_topic_window_secs() -> u64 {
    10 * 60
}

fn default_topic_max() -> u32 {
    20
}

/// WhatsApp session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// WebSocket endpoint of the protocol bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Directory holding the persisted session credentials.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: String,

    /// Country calling code prepended to local phone numbers.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// How long a gated call waits for a fresh connection to open.
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,

    /// Deadline for the bridge handshake (WebSocket upgrade plus `hello`).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_text_pacing_ms")]
    pub text_pacing_ms: u64,

    #[serde(default = "default_image_pacing_ms")]
    pub image_pacing_ms: u64,

    /// Deadline for a single bridge request.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Print pairing QR codes to the terminal.
    #[serde(default = "default_true")]
    pub print_qr: bool,

    /// Device name announced to the bridge.
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl WhatsAppConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn text_pacing(&self) -> Duration {
        Duration::from_millis(self.text_pacing_ms)
    }

    pub fn image_pacing(&self) -> Duration {
        Duration::from_millis(self.image_pacing_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bridge_url: default_bridge_url(),
            auth_dir: default_auth_dir(),
            country_code: default_country_code(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            settle_timeout_ms: default_settle_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            text_pacing_ms: default_text_pacing_ms(),
            image_pacing_ms: default_image_pacing_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            print_qr: true,
            device_name: default_device_name(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8085/session".to_string()
}

fn default_auth_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("notigate").join("whatsapp-auth"))
        .unwrap_or_else(|| PathBuf::from("./whatsapp-auth"))
        .display()
        .to_string()
}

fn default_country_code() -> String {
    "62".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_settle_timeout_ms() -> u64 {
    3000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_text_pacing_ms() -> u64 {
    1000
}

fn default_image_pacing_ms() -> u64 {
    2000
}

fn default_query_timeout_ms() -> u64 {
    60_000
}

fn default_device_name() -> String {
    "Notigate".to_string()
}

/// FCM push configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Path to the Google service account JSON key.
    #[serde(default)]
    pub service_account_path: Option<String>,

    /// Overrides the project id found in the service account key.
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default = "default_fcm_base_url")]
    pub base_url: String,

    #[serde(default = "default_iid_base_url")]
    pub iid_base_url: String,

    /// OAuth2 token endpoint. Defaults to the one named in the key file.
    #[serde(default)]
    pub token_url: Option<String>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_account_path: None,
            project_id: None,
            base_url: default_fcm_base_url(),
            iid_base_url: default_iid_base_url(),
            token_url: None,
        }
    }
}

fn default_fcm_base_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_iid_base_url() -> String {
    "https://iid.googleapis.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = NotigateConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.whatsapp.country_code, "62");
        assert_eq!(config.whatsapp.max_reconnect_attempts, 5);
        assert_eq!(config.whatsapp.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.whatsapp.settle_timeout(), Duration::from_secs(3));
        assert_eq!(config.whatsapp.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.whatsapp.text_pacing(), Duration::from_secs(1));
        assert_eq!(config.whatsapp.image_pacing(), Duration::from_secs(2));
        assert!(!config.push.enabled);
    }

    #[test]
    fn server_debug_redacts_api_keys() {
        let server = ServerConfig {
            api_keys: vec!["super-secret".into()],
            ..Default::default()
        };
        let debug = format!("{server:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("1 redacted"));
    }
}
