//! Mount table
//!
//! Maps mount paths to storages. Lookups pick the longest mount path that is
//! a segment prefix of the requested path. The table is shared read-mostly
//! behind a `parking_lot` lock; storages are handed out as `Arc`s so no lock
//! is held across I/O.

use crate::path::{is_sub_path, normalize};
use crate::{MountConfig, Result, Storage, StorageError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Process-wide registry of mounted storages
#[derive(Default)]
pub struct MountTable {
    storages: RwLock<BTreeMap<String, Arc<dyn Storage>>>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register every configured storage
    pub fn from_configs(configs: &[MountConfig]) -> Result<Self> {
        let table = Self::new();
        for config in configs {
            table.register(config.build()?)?;
        }
        Ok(table)
    }

    /// Mount a storage at its mount path
    pub fn register(&self, storage: Arc<dyn Storage>) -> Result<()> {
        let raw = storage.mount_path();
        if !raw.starts_with('/') {
            return Err(StorageError::InvalidConfig(format!(
                "mount path must be absolute: {raw}"
            )));
        }
        let mount_path = normalize(raw);
        let mut storages = self.storages.write();
        if storages.contains_key(&mount_path) {
            return Err(StorageError::AlreadyMounted(mount_path));
        }
        info!(mount = %mount_path, driver = storage.driver(), "storage mounted");
        storages.insert(mount_path, storage);
        Ok(())
    }

    /// Remove the storage mounted at `mount_path`
    pub fn unregister(&self, mount_path: &str) -> Option<Arc<dyn Storage>> {
        self.storages.write().remove(&normalize(mount_path))
    }

    /// Storage mounted exactly at `mount_path`
    pub fn get(&self, mount_path: &str) -> Option<Arc<dyn Storage>> {
        self.storages.read().get(&normalize(mount_path)).cloned()
    }

    /// All mount paths, sorted
    pub fn mounts(&self) -> Vec<String> {
        self.storages.read().keys().cloned().collect()
    }

    /// Find the storage owning `path` and the path within it
    pub fn resolve(&self, path: &str) -> Result<(Arc<dyn Storage>, String)> {
        let path = normalize(path);
        let storages = self.storages.read();
        let (mount_path, storage) = storages
            .iter()
            .filter(|(mount_path, _)| is_sub_path(mount_path, &path))
            .max_by_key(|(mount_path, _)| mount_path.len())
            .ok_or_else(|| StorageError::NoStorage(path.clone()))?;

        let actual = if mount_path == "/" {
            path.clone()
        } else {
            normalize(&path[mount_path.len()..])
        };
        debug!(path = %path, mount = %mount_path, actual = %actual, "resolved storage");
        Ok((storage.clone(), actual))
    }

    /// Names of the mount points directly below `dir` that are not
    /// themselves part of a storage listing
    pub fn virtual_children(&self, dir: &str) -> Vec<String> {
        let dir = normalize(dir);
        let names: BTreeSet<String> = self
            .storages
            .read()
            .keys()
            .filter(|mount_path| *mount_path != &dir && is_sub_path(&dir, mount_path))
            .filter_map(|mount_path| {
                let rest = if dir == "/" {
                    &mount_path[1..]
                } else {
                    &mount_path[dir.len() + 1..]
                };
                rest.split('/').next().map(str::to_string)
            })
            .collect();
        names.into_iter().collect()
    }
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.mounts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UrlTreeConfig, UrlTreeStorage};

    fn storage(mount_path: &str) -> Arc<dyn Storage> {
        Arc::new(UrlTreeStorage::new(UrlTreeConfig {
            mount_path: mount_path.to_string(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_resolve_longest_prefix() {
        let table = MountTable::new();
        table.register(storage("/")).unwrap();
        table.register(storage("/a")).unwrap();
        table.register(storage("/a/b")).unwrap();

        let (s, actual) = table.resolve("/a/b/c.txt").unwrap();
        assert_eq!(s.mount_path(), "/a/b");
        assert_eq!(actual, "/c.txt");

        let (s, actual) = table.resolve("/a/bc/d").unwrap();
        assert_eq!(s.mount_path(), "/a");
        assert_eq!(actual, "/bc/d");

        let (s, actual) = table.resolve("/z").unwrap();
        assert_eq!(s.mount_path(), "/");
        assert_eq!(actual, "/z");

        let (_, actual) = table.resolve("/a/b").unwrap();
        assert_eq!(actual, "/");
    }

    #[test]
    fn test_resolve_without_storage() {
        let table = MountTable::new();
        table.register(storage("/a")).unwrap();
        assert!(matches!(table.resolve("/b"), Err(StorageError::NoStorage(_))));
    }

    #[test]
    fn test_register_rejects_duplicates_and_relative() {
        let table = MountTable::new();
        table.register(storage("/a")).unwrap();
        assert!(matches!(
            table.register(storage("/a/")),
            Err(StorageError::AlreadyMounted(_))
        ));
        assert!(matches!(
            table.register(storage("relative")),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unregister() {
        let table = MountTable::new();
        table.register(storage("/a")).unwrap();
        assert!(table.get("/a").is_some());
        assert!(table.unregister("/a").is_some());
        assert!(table.get("/a").is_none());
        assert!(table.mounts().is_empty());
    }

    #[test]
    fn test_virtual_children() {
        let table = MountTable::new();
        table.register(storage("/enc")).unwrap();
        table.register(storage("/backend/one")).unwrap();
        table.register(storage("/backend/two")).unwrap();

        assert_eq!(table.virtual_children("/"), vec!["backend", "enc"]);
        assert_eq!(table.virtual_children("/backend"), vec!["one", "two"]);
        assert!(table.virtual_children("/enc").is_empty());
    }
}
