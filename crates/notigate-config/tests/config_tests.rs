// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and validation.

use notigate_config::diagnostic::ConfigError;
use notigate_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"
api_keys = ["key-one", "key-two"]
allowed_origins = ["https://app.example.com"]

[rate_limit]
max_requests = 50
topic_max = 3

[whatsapp]
bridge_url = "wss://bridge.internal/session"
auth_dir = "/var/lib/notigate/auth"
country_code = "1"
max_reconnect_attempts = 3
settle_timeout_ms = 1500

[push]
enabled = true
service_account_path = "/etc/notigate/sa.json"
project_id = "demo-project"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.api_keys, vec!["key-one", "key-two"]);
    assert_eq!(config.rate_limit.max_requests, 50);
    assert_eq!(config.rate_limit.topic_max, 3);
    assert_eq!(config.rate_limit.notification_max, 10);
    assert_eq!(config.whatsapp.country_code, "1");
    assert_eq!(config.whatsapp.max_reconnect_attempts, 3);
    assert_eq!(config.whatsapp.settle_timeout_ms, 1500);
    assert_eq!(config.whatsapp.text_pacing_ms, 1000);
    assert!(config.push.enabled);
    assert_eq!(config.push.project_id.as_deref(), Some("demo-project"));
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults must validate");
    assert_eq!(config.server.port, 3000);
    assert!(config.whatsapp.enabled);
    assert!(!config.push.enabled);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[whatsapp]
country_cod = "62"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "country_cod");
            assert_eq!(suggestion.as_deref(), Some("country_code"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "server.port"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn validation_runs_after_parsing() {
    let toml = r#"
[whatsapp]
country_code = "sixty-two"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
    assert!(errors[0].to_string().contains("country_code"));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[server]
port = 4000

[whatsapp]
country_code = "44"
"#,
        )?;
        jail.set_env("NOTIGATE_SERVER_PORT", "5000");
        jail.set_env("NOTIGATE_RATE_LIMIT_MAX_REQUESTS", "7");

        let path = jail.directory().join("custom.toml");
        let config = load_and_validate_path(&path).expect("should load");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.rate_limit.max_requests, 7);
        assert_eq!(config.whatsapp.country_code, "44");
        Ok(())
    });
}

#[test]
fn unknown_key_in_file_is_suggested() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "[server]\nprot = 1\n")?;
        let path = jail.directory().join("bad.toml");
        let errors = load_and_validate_path(&path).unwrap_err();
        match &errors[0] {
            ConfigError::UnknownKey { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("port"));
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
        Ok(())
    });
}
