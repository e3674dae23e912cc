//! # Veil Storage
//!
//! Storage layer for the Veil metadata gateway.
//!
//! This crate provides:
//! - **Storage trait**: listing, link fetching and two capability checks,
//!   re-routing and encryption overlay
//! - **Mount table**: longest-prefix lookup of the storage owning a path
//! - **Remote links**: fetch descriptors that release their backend resource
//! - **Drivers**: `url_tree` (in-memory), `local`, `alias`, `crypt`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Resolver / Assembler             │
//! ├─────────────────────────────────────────┤
//! │     MountTable  →  Storage Trait        │
//! ├──────────┬─────────┬─────────┬──────────┤
//! │ url_tree │  local  │  alias  │  crypt   │
//! │          │         │ reroute │ overlay  │
//! └──────────┴─────────┴─────────┴──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use veil_storage::{MountTable, MountConfig};
//!
//! let mounts = MountTable::from_configs(&configs)?;
//! let (storage, actual) = mounts.resolve("/encrypted-mount/docs/report.pdf")?;
//! let entries = storage.list(&mounts, "/docs").await?;
//! ```

pub mod alias;
pub mod config;
pub mod crypt;
pub mod error;
pub mod link;
pub mod local;
pub mod mount;
pub mod path;
pub mod url_tree;

pub use alias::{AliasConfig, AliasStorage};
pub use config::MountConfig;
pub use crypt::{CryptConfig, CryptStorage, Unlocked};
pub use error::{Result, StorageError};
pub use link::{LinkInfo, LinkResource, RemoteLink};
pub use local::{LocalConfig, LocalStorage};
pub use mount::MountTable;
pub use url_tree::{UrlObject, UrlTreeConfig, UrlTreeStorage};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// HTTP headers, possibly multi-valued
pub type Headers = BTreeMap<String, Vec<String>>;

/// A directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

impl Entry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            is_dir: true,
        }
    }
}

/// Caller context forwarded into link fetches
#[derive(Debug, Clone, Default)]
pub struct LinkArgs {
    pub client_ip: Option<IpAddr>,
    pub headers: Headers,
}

/// Delivery settings shared by every driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Browsers must not fetch from the backend directly
    pub web_proxy: bool,
    /// Download proxy URL template; only its first line is used
    pub down_proxy_url: String,
    /// Do not append `?sign=` to download proxy URLs
    pub disable_proxy_sign: bool,
    /// Links served through this server must be signed
    pub sign_links: bool,
}

/// A mounted backend
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Mount path in the virtual namespace
    fn mount_path(&self) -> &str;

    /// Driver name
    fn driver(&self) -> &'static str;

    fn settings(&self) -> &StorageSettings;

    /// All reads must go through this server
    fn must_proxy(&self) -> bool {
        false
    }

    /// List a directory, `dir` being relative to the mount path
    async fn list(&self, mounts: &MountTable, dir: &str) -> Result<Vec<Entry>>;

    /// Produce a fetch link for a file, `path` being relative to the mount path
    async fn link(
        &self,
        mounts: &MountTable,
        path: &str,
        args: &LinkArgs,
    ) -> Result<(RemoteLink, Entry)>;

    /// Re-routing capability
    fn reroute(&self) -> Option<&dyn Reroute> {
        None
    }

    /// Encryption overlay capability
    fn as_overlay(&self) -> Option<&CryptStorage> {
        None
    }
}

/// Storages that delegate paths to other storages
#[async_trait]
pub trait Reroute: Send + Sync {
    /// Candidate virtual paths on other storages for an actual path here
    async fn raw_paths(&self, actual_path: &str) -> Result<Vec<String>>;
}
