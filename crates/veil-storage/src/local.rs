//! Local filesystem storage
//!
//! Serves a directory on this host. Browsers cannot reach it, so every read
//! is proxied through the server: the storage always reports must-proxy and
//! its links carry the open file handle as their resource.

use crate::link::LinkResource;
use crate::path::{normalize, split};
use crate::{Entry, LinkArgs, MountTable, RemoteLink, Result, Storage, StorageError, StorageSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Configuration for [`LocalStorage`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub mount_path: String,
    /// Directory served at the mount path
    pub root: PathBuf,
    #[serde(default)]
    pub settings: StorageSettings,
}

/// A directory on the local filesystem
#[derive(Debug)]
pub struct LocalStorage {
    mount_path: String,
    root: PathBuf,
    settings: StorageSettings,
}

impl LocalStorage {
    pub fn new(config: LocalConfig) -> Result<Self> {
        if !config.root.is_absolute() {
            return Err(StorageError::InvalidConfig(format!(
                "local root must be absolute: {}",
                config.root.display()
            )));
        }
        Ok(Self {
            mount_path: config.mount_path,
            root: config.root,
            settings: config.settings,
        })
    }

    /// Filesystem path for a path relative to the mount
    fn full_path(&self, path: &str) -> PathBuf {
        let path = normalize(path);
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }
}

/// Open file backing a local link
struct OpenFile {
    _file: tokio::fs::File,
}

impl LinkResource for OpenFile {
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn not_found(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn mount_path(&self) -> &str {
        &self.mount_path
    }

    fn driver(&self) -> &'static str {
        "local"
    }

    fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    fn must_proxy(&self) -> bool {
        true
    }

    async fn list(&self, _mounts: &MountTable, dir: &str) -> Result<Vec<Entry>> {
        let full = self.full_path(dir);
        let mut read_dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| not_found(dir, e))?;

        let mut entries = Vec::new();
        while let Some(item) = read_dir.next_entry().await? {
            let metadata = item.metadata().await?;
            let name = item.file_name().to_string_lossy().into_owned();
            if metadata.is_dir() {
                entries.push(Entry::dir(name));
            } else {
                entries.push(Entry::file(name, metadata.len()));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn link(
        &self,
        _mounts: &MountTable,
        path: &str,
        _args: &LinkArgs,
    ) -> Result<(RemoteLink, Entry)> {
        let full = self.full_path(path);
        let file = tokio::fs::File::open(&full)
            .await
            .map_err(|e| not_found(path, e))?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        debug!(path = %full.display(), "opened local file for link");

        let (_, name) = split(path);
        let link = RemoteLink::new(format!("file://{}", full.display()))
            .with_content_length(metadata.len())
            .with_resource(Box::new(OpenFile { _file: file }));
        Ok((link, Entry::file(name, metadata.len())))
    }
}
