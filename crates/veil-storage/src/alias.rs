//! Alias storage
//!
//! Re-routes its mount to paths on other storages. The `paths` option holds
//! one target per line, either `/target` or `name:/target`. With a single
//! target the mount root maps straight onto it; with several, each name is a
//! top-level directory and names given more than once form a union.

use crate::path::{join, normalize, split};
use crate::{
    Entry, LinkArgs, MountTable, RemoteLink, Reroute, Result, Storage, StorageError,
    StorageSettings,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Configuration for [`AliasStorage`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasConfig {
    pub mount_path: String,
    /// Newline separated targets
    pub paths: String,
    #[serde(default)]
    pub settings: StorageSettings,
}

#[derive(Debug)]
enum Targets {
    Single(String),
    Named(BTreeMap<String, Vec<String>>),
}

/// A storage whose paths live on other storages
#[derive(Debug)]
pub struct AliasStorage {
    mount_path: String,
    settings: StorageSettings,
    targets: Targets,
}

impl AliasStorage {
    pub fn new(config: AliasConfig) -> Result<Self> {
        let mut named: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut count = 0;
        for line in config.paths.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (name, target) = match line.split_once(':') {
                Some((name, target)) if !name.starts_with('/') => {
                    (name.trim().to_string(), normalize(target.trim()))
                }
                _ => {
                    let target = normalize(line);
                    (split(&target).1, target)
                }
            };
            if name.is_empty() {
                return Err(StorageError::InvalidConfig(format!(
                    "alias target has no name: {line}"
                )));
            }
            named.entry(name).or_default().push(target);
            count += 1;
        }

        let targets = match count {
            0 => {
                return Err(StorageError::InvalidConfig(format!(
                    "alias {} has no targets",
                    config.mount_path
                )));
            }
            1 => match named.into_values().flatten().next() {
                Some(target) => Targets::Single(target),
                None => return Err(StorageError::Internal("alias target vanished".to_string())),
            },
            _ => Targets::Named(named),
        };

        Ok(Self {
            mount_path: config.mount_path,
            settings: config.settings,
            targets,
        })
    }

    fn candidates(&self, actual_path: &str) -> Vec<String> {
        let actual = normalize(actual_path);
        match &self.targets {
            Targets::Single(target) => vec![join(target, &actual)],
            Targets::Named(named) => {
                let trimmed = &actual[1..];
                if trimmed.is_empty() {
                    return Vec::new();
                }
                let (name, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
                named
                    .get(name)
                    .map(|targets| targets.iter().map(|t| join(t, rest)).collect())
                    .unwrap_or_default()
            }
        }
    }
}

#[async_trait]
impl Reroute for AliasStorage {
    async fn raw_paths(&self, actual_path: &str) -> Result<Vec<String>> {
        Ok(self.candidates(actual_path))
    }
}

#[async_trait]
impl Storage for AliasStorage {
    fn mount_path(&self) -> &str {
        &self.mount_path
    }

    fn driver(&self) -> &'static str {
        "alias"
    }

    fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    async fn list(&self, mounts: &MountTable, dir: &str) -> Result<Vec<Entry>> {
        if let Targets::Named(named) = &self.targets {
            if normalize(dir) == "/" {
                return Ok(named.keys().map(Entry::dir).collect());
            }
        }

        let mut merged: BTreeMap<String, Entry> = BTreeMap::new();
        let mut first_err = None;
        for raw in self.candidates(dir) {
            let (storage, actual) = mounts.resolve(&raw)?;
            match storage.list(mounts, &actual).await {
                Ok(entries) => {
                    for entry in entries {
                        merged.entry(entry.name.clone()).or_insert(entry);
                    }
                }
                Err(e) => {
                    debug!(raw = %raw, error = %e, "alias target listing failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        match (merged.is_empty(), first_err) {
            (true, Some(e)) => Err(e),
            (true, None) => Err(StorageError::NotFound(dir.to_string())),
            _ => Ok(merged.into_values().collect()),
        }
    }

    async fn link(
        &self,
        mounts: &MountTable,
        path: &str,
        args: &LinkArgs,
    ) -> Result<(RemoteLink, Entry)> {
        let raw = self
            .candidates(path)
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        let (storage, actual) = mounts.resolve(&raw)?;
        storage.link(mounts, &actual, args).await
    }

    fn reroute(&self) -> Option<&dyn Reroute> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UrlObject, UrlTreeConfig, UrlTreeStorage};
    use std::sync::Arc;

    fn alias(paths: &str) -> AliasStorage {
        AliasStorage::new(AliasConfig {
            mount_path: "/alias".to_string(),
            paths: paths.to_string(),
            settings: StorageSettings::default(),
        })
        .unwrap()
    }

    fn mounts() -> MountTable {
        let table = MountTable::new();
        table
            .register(Arc::new(UrlTreeStorage::new(UrlTreeConfig {
                mount_path: "/one".to_string(),
                objects: vec![
                    UrlObject::new("/a.txt", "https://one/a", 1),
                    UrlObject::new("/shared.txt", "https://one/shared", 2),
                ],
                ..Default::default()
            })))
            .unwrap();
        table
            .register(Arc::new(UrlTreeStorage::new(UrlTreeConfig {
                mount_path: "/two".to_string(),
                objects: vec![
                    UrlObject::new("/b.txt", "https://two/b", 3),
                    UrlObject::new("/shared.txt", "https://two/shared", 4),
                ],
                ..Default::default()
            })))
            .unwrap();
        table
    }

    #[tokio::test]
    async fn test_single_target_maps_root() {
        let alias = alias("/one");
        assert_eq!(alias.raw_paths("/a.txt").await.unwrap(), vec!["/one/a.txt"]);
        assert_eq!(alias.raw_paths("/").await.unwrap(), vec!["/one"]);

        let mounts = mounts();
        let entries = alias.list(&mounts, "/").await.unwrap();
        assert_eq!(entries.len(), 2);
        let (link, _) = alias.link(&mounts, "/a.txt", &LinkArgs::default()).await.unwrap();
        assert_eq!(link.url, "https://one/a");
    }

    #[tokio::test]
    async fn test_named_targets_and_union() {
        let alias = alias("docs:/one\ndocs:/two\nother:/two");
        assert!(alias.raw_paths("/").await.unwrap().is_empty());
        assert_eq!(
            alias.raw_paths("/docs/shared.txt").await.unwrap(),
            vec!["/one/shared.txt", "/two/shared.txt"]
        );
        assert!(alias.raw_paths("/unknown/x").await.unwrap().is_empty());

        let mounts = mounts();
        let root = alias.list(&mounts, "/").await.unwrap();
        assert_eq!(root, vec![Entry::dir("docs"), Entry::dir("other")]);

        let docs = alias.list(&mounts, "/docs").await.unwrap();
        let names: Vec<_> = docs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "shared.txt"]);
        // first target wins on name clashes
        assert_eq!(docs[2].size, 2);
    }

    #[test]
    fn test_unnamed_lines_use_last_segment() {
        let alias = alias("/one\n/data/two");
        assert_eq!(alias.candidates("/two/x"), vec!["/data/two/x"]);
    }

    #[test]
    fn test_empty_paths_rejected() {
        let result = AliasStorage::new(AliasConfig {
            mount_path: "/alias".to_string(),
            paths: "  \n".to_string(),
            settings: StorageSettings::default(),
        });
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }
}
