//! Directory lookups across the mount table
//!
//! Listings merge the owning storage's entries with mount points that sit
//! directly below the directory, so `/` shows every top-level mount.

use std::collections::BTreeMap;
use veil_storage::path::{normalize, split};
use veil_storage::{Entry, MountTable, StorageError};

/// List a virtual directory
pub async fn list(mounts: &MountTable, dir: &str) -> Result<Vec<Entry>, StorageError> {
    let dir = normalize(dir);
    let virtual_dirs = mounts.virtual_children(&dir);

    let listed = match mounts.resolve(&dir) {
        Ok((storage, actual)) => storage.list(mounts, &actual).await,
        Err(e) => Err(e),
    };
    let listed = match listed {
        Ok(entries) => entries,
        Err(e) if !virtual_dirs.is_empty() && (e.is_not_found() || matches!(e, StorageError::NoStorage(_))) => {
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let mut merged: BTreeMap<String, Entry> = listed
        .into_iter()
        .map(|entry| (entry.name.clone(), entry))
        .collect();
    for name in virtual_dirs {
        merged.entry(name.clone()).or_insert_with(|| Entry::dir(name));
    }
    Ok(merged.into_values().collect())
}

/// Look up a single entry by listing its parent
pub async fn get(mounts: &MountTable, path: &str) -> Result<Entry, StorageError> {
    let path = normalize(path);
    if path == "/" {
        return Ok(Entry::dir("/"));
    }
    let (dir, name) = split(&path);
    list(mounts, &dir)
        .await?
        .into_iter()
        .find(|entry| entry.name == name)
        .ok_or(StorageError::NotFound(path))
}
