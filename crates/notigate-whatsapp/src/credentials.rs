// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable session credentials.
//!
//! Layout under the auth directory:
//!
//! ```text
//! creds.json          current record
//! keys/<name>.json    one file per named key: {"name": ..., "value": ...}
//! ```
//!
//! Writes go to a sibling temp file, are synced, then renamed over the target,
//! so a crash never leaves a half-written record behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use notigate_core::{CredentialUpdate, Credentials};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

const CURRENT_FILE: &str = "creds.json";
const KEYS_DIR: &str = "keys";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("credential file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CredentialError + '_ {
    move |source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    name: String,
    value: serde_json::Value,
}

/// File-backed credential store.
///
/// All operations are serialized by an internal lock, so a load never
/// observes a partially applied rotation.
#[derive(Debug)]
pub struct CredentialStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads everything on disk, creating the directory if absent.
    pub async fn load(&self) -> Result<Credentials, CredentialError> {
        let _guard = self.lock.lock().await;
        let keys_dir = self.dir.join(KEYS_DIR);
        tokio::fs::create_dir_all(&keys_dir)
            .await
            .map_err(io_err(&keys_dir))?;

        let current_path = self.dir.join(CURRENT_FILE);
        let current = match tokio::fs::read(&current_path).await {
            Ok(bytes) => Some(parse(&current_path, &bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err(&current_path)(e)),
        };

        let mut keys = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&keys_dir)
            .await
            .map_err(io_err(&keys_dir))?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&keys_dir))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await.map_err(io_err(&path))?;
            let record: KeyRecord = parse(&path, &bytes)?;
            keys.insert(record.name, record.value);
        }

        debug!(
            dir = %self.dir.display(),
            has_current = current.is_some(),
            keys = keys.len(),
            "credentials loaded"
        );
        Ok(Credentials { current, keys })
    }

    /// Persists a rotation. Returns only after every change is on disk.
    pub async fn apply(&self, update: CredentialUpdate) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().await;
        let keys_dir = self.dir.join(KEYS_DIR);
        tokio::fs::create_dir_all(&keys_dir)
            .await
            .map_err(io_err(&keys_dir))?;

        if let Some(current) = &update.current {
            write_json(&self.dir.join(CURRENT_FILE), current).await?;
        }

        for (name, value) in &update.keys {
            let path = keys_dir.join(key_file_name(name));
            match value {
                Some(value) => {
                    let record = KeyRecord {
                        name: name.clone(),
                        value: value.clone(),
                    };
                    write_json(&path, &record).await?;
                }
                None => match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(io_err(&path)(e)),
                },
            }
        }

        debug!(
            current = update.current.is_some(),
            keys = update.keys.len(),
            "credentials persisted"
        );
        Ok(())
    }

    /// Deletes every stored record. The next load starts a fresh pairing.
    pub async fn clear(&self) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                info!(dir = %self.dir.display(), "stored credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.dir)(e)),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, CredentialError> {
    serde_json::from_slice(bytes).map_err(|source| CredentialError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Key names may contain `/` or `:`. Every byte outside `[A-Za-z0-9._-]` is
/// percent-escaped, so distinct names never share a file.
fn key_file_name(name: &str) -> String {
    let mut file = String::with_capacity(name.len() + 5);
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                file.push(char::from(byte))
            }
            _ => file.push_str(&format!("%{byte:02X}")),
        }
    }
    file.push_str(".json");
    file
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CredentialError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| CredentialError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp).await.map_err(io_err(&tmp))?;
    file.write_all(&bytes).await.map_err(io_err(&tmp))?;
    file.sync_all().await.map_err(io_err(&tmp))?;
    drop(file);

    tokio::fs::rename(&tmp, path).await.map_err(io_err(path))
}
