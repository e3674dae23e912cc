//! Declarative storage definitions

use crate::{
    AliasConfig, AliasStorage, CryptConfig, CryptStorage, LocalConfig, LocalStorage, Result,
    Storage, UrlTreeConfig, UrlTreeStorage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One mounted storage, tagged by driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum MountConfig {
    UrlTree(UrlTreeConfig),
    Local(LocalConfig),
    Alias(AliasConfig),
    Crypt(CryptConfig),
}

impl MountConfig {
    pub fn mount_path(&self) -> &str {
        match self {
            MountConfig::UrlTree(c) => &c.mount_path,
            MountConfig::Local(c) => &c.mount_path,
            MountConfig::Alias(c) => &c.mount_path,
            MountConfig::Crypt(c) => &c.mount_path,
        }
    }

    /// Instantiate the storage
    pub fn build(&self) -> Result<Arc<dyn Storage>> {
        Ok(match self {
            MountConfig::UrlTree(c) => Arc::new(UrlTreeStorage::new(c.clone())),
            MountConfig::Local(c) => Arc::new(LocalStorage::new(c.clone())?),
            MountConfig::Alias(c) => Arc::new(AliasStorage::new(c.clone())?),
            MountConfig::Crypt(c) => Arc::new(CryptStorage::new(c.clone())?),
        })
    }
}
