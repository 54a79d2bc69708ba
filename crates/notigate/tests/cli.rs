// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that run the compiled `notigate` binary.

use std::path::Path;
use std::process::{Command, Output};

fn notigate(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_notigate"))
        .arg("--config")
        .arg(config)
        .args(args)
        .current_dir(config.parent().unwrap())
        .env_remove("RUST_LOG")
        .output()
        .expect("binary should run")
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("notigate.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn check_config_accepts_a_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[server]
port = 4100
api_keys = ["secret"]

[whatsapp]
enabled = false
"#,
    );

    let output = notigate(&path, &["check-config"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("config OK"), "stdout: {stdout}");
    assert!(stdout.contains("4100"));
    assert!(stdout.contains("whatsapp disabled"));
}

#[test]
fn check_config_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[server]
prot = 4100
"#,
    );

    let output = notigate(&path, &["check-config"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("prot"), "stderr: {stderr}");
}

#[test]
fn check_config_reports_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[push]
enabled = true
"#,
    );

    let output = notigate(&path, &["check-config"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("service_account_path"), "stderr: {stderr}");
}

#[test]
fn pair_refuses_when_whatsapp_is_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[whatsapp]
enabled = false
"#,
    );

    let output = notigate(&path, &["pair", "--timeout-secs", "1"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("whatsapp is disabled"), "stderr: {stderr}");
}
