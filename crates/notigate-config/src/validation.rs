// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! Every failing check is collected; validation does not stop at the first.

use crate::diagnostic::ConfigError;
use crate::model::NotigateConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &NotigateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_server(config, &mut errors);
    validate_rate_limit(config, &mut errors);
    if config.whatsapp.enabled {
        validate_whatsapp(config, &mut errors);
    }
    if config.push.enabled {
        validate_push(config, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(config: &NotigateConfig, errors: &mut Vec<ConfigError>) {
    let server = &config.server;
    let host = server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if !LOG_LEVELS.contains(&server.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            server.log_level
        )));
    }

    if server.api_keys.iter().any(|k| k.trim().is_empty()) {
        errors.push(ConfigError::validation(
            "server.api_keys must not contain blank entries",
        ));
    }

    if server.body_limit_bytes == 0 {
        errors.push(ConfigError::validation(
            "server.body_limit_bytes must be greater than zero",
        ));
    }
}

fn validate_rate_limit(config: &NotigateConfig, errors: &mut Vec<ConfigError>) {
    let limits = &config.rate_limit;
    if !limits.enabled {
        return;
    }
    let windows = [
        ("window_secs", limits.window_secs, limits.max_requests),
        (
            "notification_window_secs",
            limits.notification_window_secs,
            limits.notification_max,
        ),
        (
            "multicast_window_secs",
            limits.multicast_window_secs,
            limits.multicast_max,
        ),
        ("topic_window_secs", limits.topic_window_secs, limits.topic_max),
    ];
    for (name, window, max) in windows {
        if window == 0 || max == 0 {
            errors.push(ConfigError::validation(format!(
                "rate_limit.{name} and its request limit must be greater than zero"
            )));
        }
    }
}

fn validate_whatsapp(config: &NotigateConfig, errors: &mut Vec<ConfigError>) {
    let wa = &config.whatsapp;

    if wa.country_code.is_empty() || !wa.country_code.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ConfigError::validation(format!(
            "whatsapp.country_code must be digits only, got `{}`",
            wa.country_code
        )));
    }

    if !(wa.bridge_url.starts_with("ws://") || wa.bridge_url.starts_with("wss://")) {
        errors.push(ConfigError::validation(format!(
            "whatsapp.bridge_url must be a ws:// or wss:// URL, got `{}`",
            wa.bridge_url
        )));
    }

    if wa.auth_dir.trim().is_empty() {
        errors.push(ConfigError::validation("whatsapp.auth_dir must not be empty"));
    }

    let positive = [
        ("reconnect_delay_ms", wa.reconnect_delay_ms),
        ("settle_timeout_ms", wa.settle_timeout_ms),
        ("connect_timeout_ms", wa.connect_timeout_ms),
        ("text_pacing_ms", wa.text_pacing_ms),
        ("image_pacing_ms", wa.image_pacing_ms),
        ("query_timeout_ms", wa.query_timeout_ms),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "whatsapp.{name} must be greater than zero"
            )));
        }
    }
}

fn validate_push(config: &NotigateConfig, errors: &mut Vec<ConfigError>) {
    match config.push.service_account_path.as_deref() {
        Some(path) if !path.trim().is_empty() => {}
        _ => errors.push(ConfigError::validation(
            "push.service_account_path is required when push.enabled = true",
        )),
    }
    for (name, url) in [
        ("base_url", Some(config.push.base_url.as_str())),
        ("iid_base_url", Some(config.push.iid_base_url.as_str())),
        ("token_url", config.push.token_url.as_deref()),
    ] {
        if let Some(url) = url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            errors.push(ConfigError::validation(format!(
                "push.{name} must be an http(s) URL, got `{url}`"
            )));
        }
    }
}
