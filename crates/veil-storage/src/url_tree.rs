//! In-memory tree of URL objects
//!
//! Every object is a path mapped to a download URL plus the hints a backend
//! would return with it. Directories are implied by object paths. Useful on
//! its own for static link tables and as the backing store in tests.

use crate::link::LinkResource;
use crate::path::{is_sub_path, normalize, split};
use crate::{
    Entry, Headers, LinkArgs, MountTable, RemoteLink, Result, Storage, StorageError,
    StorageSettings,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// One object in the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlObject {
    pub path: String,
    pub url: String,
    pub size: u64,
    pub headers: Headers,
    pub concurrency: usize,
    pub part_size: u64,
}

impl UrlObject {
    pub fn new(path: impl Into<String>, url: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            size,
            ..Default::default()
        }
    }
}

/// Configuration for [`UrlTreeStorage`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlTreeConfig {
    pub mount_path: String,
    #[serde(default)]
    pub must_proxy: bool,
    #[serde(default)]
    pub objects: Vec<UrlObject>,
    #[serde(default)]
    pub settings: StorageSettings,
}

/// An in-memory URL tree storage
#[derive(Debug)]
pub struct UrlTreeStorage {
    mount_path: String,
    must_proxy: bool,
    settings: StorageSettings,
    objects: DashMap<String, UrlObject>,
    open_links: Arc<AtomicUsize>,
}

impl UrlTreeStorage {
    /// Create a storage holding the configured objects
    pub fn new(config: UrlTreeConfig) -> Self {
        let storage = Self {
            mount_path: config.mount_path,
            must_proxy: config.must_proxy,
            settings: config.settings,
            objects: DashMap::new(),
            open_links: Arc::new(AtomicUsize::new(0)),
        };
        for object in config.objects {
            storage.insert(object);
        }
        storage
    }

    /// Add or replace an object
    pub fn insert(&self, mut object: UrlObject) {
        object.path = normalize(&object.path);
        self.objects.insert(object.path.clone(), object);
    }

    /// Remove an object
    pub fn remove(&self, path: &str) -> Option<UrlObject> {
        self.objects.remove(&normalize(path)).map(|(_, object)| object)
    }

    /// Number of objects stored
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Links handed out and not yet released
    pub fn open_links(&self) -> usize {
        self.open_links.load(Ordering::SeqCst)
    }
}

/// Backend session held by an issued link
struct Session {
    open: Arc<AtomicUsize>,
}

impl Session {
    fn open(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            open: counter.clone(),
        }
    }
}

impl LinkResource for Session {
    fn close(self: Box<Self>) -> Result<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Storage for UrlTreeStorage {
    fn mount_path(&self) -> &str {
        &self.mount_path
    }

    fn driver(&self) -> &'static str {
        "url_tree"
    }

    fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    fn must_proxy(&self) -> bool {
        self.must_proxy
    }

    async fn list(&self, _mounts: &MountTable, dir: &str) -> Result<Vec<Entry>> {
        let dir = normalize(dir);
        let mut entries: BTreeMap<String, Entry> = BTreeMap::new();

        for object in self.objects.iter() {
            let path = object.key();
            if path == &dir || !is_sub_path(&dir, path) {
                continue;
            }
            let rest = if dir == "/" { &path[1..] } else { &path[dir.len() + 1..] };
            match rest.split_once('/') {
                Some((child, _)) => {
                    entries
                        .entry(child.to_string())
                        .or_insert_with(|| Entry::dir(child));
                }
                None => {
                    entries.insert(rest.to_string(), Entry::file(rest, object.value().size));
                }
            }
        }

        if entries.is_empty() && dir != "/" {
            return Err(StorageError::NotFound(dir));
        }
        Ok(entries.into_values().collect())
    }

    async fn link(
        &self,
        _mounts: &MountTable,
        path: &str,
        args: &LinkArgs,
    ) -> Result<(RemoteLink, Entry)> {
        let path = normalize(path);
        let object = self
            .objects
            .get(&path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;
        debug!(path = %path, client_ip = ?args.client_ip, "issuing url_tree link");

        let link = RemoteLink::new(object.url)
            .with_headers(object.headers)
            .with_content_length(object.size)
            .with_concurrency(object.concurrency, object.part_size)
            .with_resource(Box::new(Session::open(&self.open_links)));
        let (_, name) = split(&path);
        Ok((link, Entry::file(name, object.size)))
    }
}
