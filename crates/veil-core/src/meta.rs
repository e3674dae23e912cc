//! Crypt metadata assembly
//!
//! Everything a client needs to fetch and decrypt one file itself: logical
//! and physical sizes, the block layout, the data key, the encrypted paths
//! and a fetch URL chosen by the proxy policy.
//!
//! ```text
//! start → located → plain | crypt → chain resolved → link fetched
//!       → delivery decided → done
//! ```
//!
//! Any failing step aborts the request; no partial result is returned.

use crate::chain::resolve_chain;
use crate::delivery::{decide_delivery, ProxyPolicy};
use crate::{fs, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use veil_crypto::{encrypted_size, CryptoError, BLOCK_DATA_SIZE, BLOCK_HEADER_SIZE, FILE_HEADER_SIZE};
use veil_storage::path::{normalize, split};
use veil_storage::{LinkArgs, MountTable, StorageError};

/// Whether the file lives behind an encryption overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Plain,
    Crypt,
}

fn is_zero_usize(n: &usize) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

/// Fetch descriptor of the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub part_size: u64,
    /// Path inside the terminal storage
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_path: String,
}

/// Assembled metadata for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub mode: Mode,
    pub path: String,
    pub file_name: String,
    pub size: u64,
    pub encrypted_size: u64,
    pub file_header_size: usize,
    pub block_data_size: usize,
    pub block_header_size: usize,
    /// Base64 data key, empty in plain mode
    pub data_key: String,
    pub encrypted_suffix: String,
    pub encrypted_path: String,
    pub encrypted_actual_path: String,
    pub remote: RemoteInfo,
}

/// Resolves file paths to [`ResolvedMetadata`]
#[derive(Debug, Clone)]
pub struct MetadataAssembler {
    mounts: Arc<MountTable>,
}

impl MetadataAssembler {
    pub fn new(mounts: Arc<MountTable>) -> Self {
        Self { mounts }
    }

    pub fn mounts(&self) -> &Arc<MountTable> {
        &self.mounts
    }

    /// Assemble metadata for the file at `path`
    #[instrument(skip(self, args, policy))]
    pub async fn resolve(
        &self,
        path: &str,
        args: &LinkArgs,
        policy: &ProxyPolicy,
    ) -> Result<ResolvedMetadata> {
        let path = validate(path)?;
        let mounts = self.mounts.as_ref();

        // located
        let (dir, name) = split(&path);
        let entry = fs::list(mounts, &dir)
            .await
            .map_err(|source| listing_error(&path, source))?
            .into_iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| CoreError::NotFound(path.clone()))?;
        if entry.is_dir {
            return Err(CoreError::BadRequest("directory is not supported".to_string()));
        }

        // plain | crypt
        let (storage, actual) = mounts
            .resolve(&path)
            .map_err(|source| CoreError::Resolution {
                path: path.clone(),
                source,
            })?;
        let (mode, fetch_path, data_key, suffix) = match storage.as_overlay() {
            Some(crypt) => {
                let unlocked = crypt
                    .unlock()
                    .await
                    .map_err(|source| CoreError::KeyDerivation {
                        path: path.clone(),
                        source,
                    })?;
                let encrypted = unlocked
                    .encrypted_path(&actual, false)
                    .map_err(|source| CoreError::Resolution {
                        path: path.clone(),
                        source,
                    })?;
                (
                    Mode::Crypt,
                    encrypted,
                    unlocked.data_key().to_base64(),
                    crypt.encrypted_suffix().to_string(),
                )
            }
            None => (Mode::Plain, path.clone(), String::new(), String::new()),
        };
        debug!(mode = ?mode, fetch_path = %fetch_path, "storage located");

        // chain resolved
        let chain = resolve_chain(mounts, &fetch_path).await?;
        let (first, terminal) = match (chain.first(), chain.last()) {
            (Some(first), Some(terminal)) => (first, terminal),
            _ => {
                return Err(CoreError::Resolution {
                    path: fetch_path.clone(),
                    source: StorageError::NoStorage(fetch_path),
                });
            }
        };

        // link fetched
        let (link, remote_entry) = terminal
            .storage
            .link(mounts, &terminal.actual_path, args)
            .await
            .map_err(|source| CoreError::Link {
                path: terminal.virtual_path.clone(),
                source,
            })?;
        let info = link.snapshot();
        if let Err(e) = link.close() {
            warn!(path = %terminal.virtual_path, error = %e, "failed to close remote link");
        }

        // delivery decided
        let delivery = decide_delivery(&chain, &info, &fetch_path, policy);

        let physical_size = if info.content_length > 0 {
            info.content_length
        } else if remote_entry.size > 0 {
            remote_entry.size
        } else if mode == Mode::Crypt {
            encrypted_size(entry.size)
        } else {
            entry.size
        };
        let (file_header_size, block_data_size, block_header_size) = match mode {
            Mode::Crypt => (FILE_HEADER_SIZE, BLOCK_DATA_SIZE, BLOCK_HEADER_SIZE),
            Mode::Plain => (0, 0, 0),
        };

        Ok(ResolvedMetadata {
            mode,
            path: path.clone(),
            file_name: entry.name,
            size: entry.size,
            encrypted_size: physical_size,
            file_header_size,
            block_data_size,
            block_header_size,
            data_key,
            encrypted_suffix: suffix,
            encrypted_path: fetch_path,
            encrypted_actual_path: first.actual_path.clone(),
            remote: RemoteInfo {
                url: delivery.url,
                method: "GET".to_string(),
                headers: delivery.headers,
                concurrency: delivery.concurrency,
                part_size: delivery.part_size,
                raw_path: terminal.actual_path.clone(),
            },
        })
    }

    /// Like [`resolve`](Self::resolve), but only for files behind an
    /// encryption overlay
    #[instrument(skip(self, args, policy))]
    pub async fn resolve_crypt(
        &self,
        path: &str,
        args: &LinkArgs,
        policy: &ProxyPolicy,
    ) -> Result<ResolvedMetadata> {
        let normalized = validate(path)?;
        let (storage, _) = self
            .mounts
            .resolve(&normalized)
            .map_err(|source| CoreError::Resolution {
                path: normalized.clone(),
                source,
            })?;
        if storage.as_overlay().is_none() {
            return Err(CoreError::StorageMismatch("storage is not crypt".to_string()));
        }
        self.resolve(&normalized, args, policy).await
    }
}

fn validate(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(CoreError::BadRequest("path is required".to_string()));
    }
    let path = normalize(trimmed);
    if path == "/" {
        return Err(CoreError::BadRequest("directory is not supported".to_string()));
    }
    Ok(path)
}

fn listing_error(path: &str, source: StorageError) -> CoreError {
    match source {
        StorageError::Secret { .. } | StorageError::Crypto(CryptoError::KeyDerivation(_)) => {
            CoreError::KeyDerivation {
                path: path.to_string(),
                source,
            }
        }
        source if source.is_not_found() || matches!(source, StorageError::NoStorage(_)) => {
            CoreError::NotFound(path.to_string())
        }
        source => CoreError::Resolution {
            path: path.to_string(),
            source,
        },
    }
}
