// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `/etc/notigate/notigate.toml`, then
//! `~/.config/notigate/notigate.toml`, then `./notigate.toml`, then
//! `NOTIGATE_*` environment variables. Later layers win.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::NotigateConfig;

/// Top-level sections, longest first so `rate_limit_` is tried before any
/// shorter prefix could match.
const SECTIONS: &[&str] = &["rate_limit", "whatsapp", "server", "push"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/notigate/notigate.toml";
pub(crate) const LOCAL_CONFIG: &str = "notigate.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("notigate").join("notigate.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<NotigateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. Env vars are not consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<NotigateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NotigateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<NotigateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NotigateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The unextracted Figment for the standard hierarchy.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(NotigateConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG)).merge(env_provider())
}

/// `NOTIGATE_WHATSAPP_COUNTRY_CODE` maps to `whatsapp.country_code`.
///
/// Only the section prefix is split off; underscores inside key names are
/// left alone.
fn env_provider() -> Env {
    Env::prefixed("NOTIGATE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
