// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notigate - notification gateway for FCM push and WhatsApp.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod pair;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notigate_config::{ConfigError, NotigateConfig};

/// Notigate - notification gateway for FCM push and WhatsApp.
#[derive(Parser, Debug)]
#[command(name = "notigate", version, about, long_about = None)]
struct Cli {
    /// Load this TOML file instead of the standard search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway with push and WhatsApp.
    Serve,
    /// Pair the WhatsApp session by scanning a QR code, then exit.
    Pair {
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Show the state of a running gateway.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<NotigateConfig, Vec<ConfigError>> {
    match path {
        Some(path) => notigate_config::load_and_validate_path(path),
        None => notigate_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            notigate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Pair { timeout_secs }) => pair::run_pair(config, timeout_secs).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::CheckConfig) => {
            println!(
                "notigate: config OK (server {}:{}, whatsapp {}, push {})",
                config.server.host,
                config.server.port,
                enabled(config.whatsapp.enabled),
                enabled(config.push.enabled),
            );
            Ok(())
        }
        None => {
            println!("notigate: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}
