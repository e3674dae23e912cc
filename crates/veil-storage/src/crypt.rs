//! Encryption overlay storage
//!
//! Wraps a path of the virtual namespace (`remote_path`) that holds
//! rclone-format encrypted objects. Names are mapped segment by segment with
//! the overlay's name cipher; content is never decrypted here, clients get
//! the data key and the block layout and decrypt themselves.
//!
//! Keys are never kept: every [`CryptStorage::unlock`] reveals the stored
//! secrets and runs scrypt again on the blocking pool.

use crate::path::normalize;
use crate::{
    Entry, LinkArgs, MountTable, RemoteLink, Result, Storage, StorageError, StorageSettings,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use veil_crypto::{
    decrypted_size, reveal_secret, DataKey, KeyMaterial, NameCipher, NameEncoding, NameMode,
    DEFAULT_ENCRYPTED_SUFFIX,
};

fn default_encoding() -> String {
    "base32".to_string()
}

fn default_true() -> bool {
    true
}

fn default_suffix() -> String {
    DEFAULT_ENCRYPTED_SUFFIX.to_string()
}

/// Configuration for [`CryptStorage`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptConfig {
    pub mount_path: String,
    /// Virtual path holding the encrypted objects
    pub remote_path: String,
    /// Plain or `___Obfuscated___`-prefixed obscured password
    #[serde(default)]
    pub password: String,
    /// Plain or obscured salt, empty for the default salt
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub filename_encryption: NameMode,
    /// `base32` or `base64`
    #[serde(default = "default_encoding")]
    pub filename_encoding: String,
    #[serde(default = "default_true")]
    pub directory_name_encryption: bool,
    #[serde(default = "default_suffix")]
    pub encrypted_suffix: String,
    #[serde(default)]
    pub settings: StorageSettings,
}

impl CryptConfig {
    pub fn new(mount_path: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            mount_path: mount_path.into(),
            remote_path: remote_path.into(),
            password: String::new(),
            salt: String::new(),
            filename_encryption: NameMode::default(),
            filename_encoding: default_encoding(),
            directory_name_encryption: true,
            encrypted_suffix: default_suffix(),
            settings: StorageSettings::default(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }
}

/// An encryption overlay
pub struct CryptStorage {
    mount_path: String,
    remote_path: String,
    password: String,
    salt: String,
    mode: NameMode,
    encoding: NameEncoding,
    dir_name_encrypt: bool,
    suffix: String,
    settings: StorageSettings,
}

impl CryptStorage {
    pub fn new(config: CryptConfig) -> Result<Self> {
        let encoding: NameEncoding = config
            .filename_encoding
            .parse()
            .map_err(|e| StorageError::InvalidConfig(format!("{}: {e}", config.mount_path)))?;
        if !config.remote_path.starts_with('/') {
            return Err(StorageError::InvalidConfig(format!(
                "crypt remote path must be absolute: {}",
                config.remote_path
            )));
        }
        Ok(Self {
            mount_path: config.mount_path,
            remote_path: normalize(&config.remote_path),
            password: config.password,
            salt: config.salt,
            mode: config.filename_encryption,
            encoding,
            dir_name_encrypt: config.directory_name_encryption,
            suffix: config.encrypted_suffix,
            settings: config.settings,
        })
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Suffix appended to file names when name encryption is off
    pub fn encrypted_suffix(&self) -> &str {
        &self.suffix
    }

    /// Reveal the secrets and derive this overlay's keys
    #[instrument(skip(self), fields(mount = %self.mount_path))]
    pub async fn unlock(&self) -> Result<Unlocked> {
        let password = reveal_secret(&self.password).map_err(|source| StorageError::Secret {
            secret: "password",
            source,
        })?;
        let salt = reveal_secret(&self.salt).map_err(|source| StorageError::Secret {
            secret: "salt",
            source,
        })?;

        let material = tokio::task::spawn_blocking(move || KeyMaterial::derive(&password, &salt))
            .await
            .map_err(|e| StorageError::Internal(format!("key derivation task failed: {e}")))??;
        debug!(zero_key = material.is_zero(), "overlay keys derived");

        Ok(Unlocked {
            remote_path: self.remote_path.clone(),
            data_key: material.data_key(),
            names: NameCipher::new(
                &material,
                self.mode,
                self.encoding,
                self.dir_name_encrypt,
                &self.suffix,
            ),
        })
    }

    /// Fetch link for the encrypted object behind `path`
    pub async fn remote_link(
        &self,
        mounts: &MountTable,
        path: &str,
        args: &LinkArgs,
    ) -> Result<(RemoteLink, Entry)> {
        let unlocked = self.unlock().await?;
        let remote = unlocked.encrypted_path(path, false)?;
        let (storage, actual) = mounts.resolve(&remote)?;
        storage.link(mounts, &actual, args).await
    }
}

impl std::fmt::Debug for CryptStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptStorage")
            .field("mount_path", &self.mount_path)
            .field("remote_path", &self.remote_path)
            .field("mode", &self.mode)
            .field("encoding", &self.encoding)
            .field("dir_name_encrypt", &self.dir_name_encrypt)
            .finish_non_exhaustive()
    }
}

/// Derived keys of an overlay, valid for one request
#[derive(Debug)]
pub struct Unlocked {
    remote_path: String,
    data_key: DataKey,
    names: NameCipher,
}

impl Unlocked {
    pub fn data_key(&self) -> &DataKey {
        &self.data_key
    }

    /// Virtual path of the encrypted object for a path inside the overlay
    pub fn encrypted_path(&self, path: &str, is_dir: bool) -> Result<String> {
        let mut path = path.to_string();
        if is_dir && !path.ends_with('/') {
            path.push('/');
        }
        let (dir, file) = match path.rfind('/') {
            Some(i) => path.split_at(i + 1),
            None => ("", path.as_str()),
        };

        let remote_dir = self.names.encrypt_dir_name(dir)?;
        let remote_file = if file.trim().is_empty() {
            String::new()
        } else {
            self.names.encrypt_file_name(file)?
        };
        Ok(normalize(&format!(
            "{}/{}/{}",
            self.remote_path, remote_dir, remote_file
        )))
    }

    /// Path of the encrypted object inside the storage that holds it
    pub fn encrypted_actual_path(
        &self,
        mounts: &MountTable,
        path: &str,
        is_dir: bool,
    ) -> Result<String> {
        let (_, actual) = mounts.resolve(&self.encrypted_path(path, is_dir)?)?;
        Ok(actual)
    }

    /// Map a physical entry back to its plaintext form
    pub fn decrypt_entry(&self, entry: Entry) -> Result<Entry> {
        if entry.is_dir {
            return Ok(Entry::dir(self.names.decrypt_dir_name(&entry.name)?));
        }
        let name = self.names.decrypt_file_name(&entry.name)?;
        Ok(Entry::file(name, decrypted_size(entry.size)?))
    }
}

#[async_trait]
impl Storage for CryptStorage {
    fn mount_path(&self) -> &str {
        &self.mount_path
    }

    fn driver(&self) -> &'static str {
        "crypt"
    }

    fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// The backend link serves ciphertext; plaintext only leaves through
    /// this server's proxy
    fn must_proxy(&self) -> bool {
        true
    }

    async fn list(&self, mounts: &MountTable, dir: &str) -> Result<Vec<Entry>> {
        let unlocked = self.unlock().await?;
        let remote = unlocked.encrypted_path(dir, true)?;
        let (storage, actual) = mounts.resolve(&remote)?;
        let entries = storage.list(mounts, &actual).await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let name = entry.name.clone();
                unlocked
                    .decrypt_entry(entry)
                    .map_err(|e| debug!(name = %name, error = %e, "skipping undecryptable entry"))
                    .ok()
            })
            .collect())
    }

    async fn link(
        &self,
        mounts: &MountTable,
        path: &str,
        args: &LinkArgs,
    ) -> Result<(RemoteLink, Entry)> {
        self.remote_link(mounts, path, args).await
    }

    fn as_overlay(&self) -> Option<&CryptStorage> {
        Some(self)
    }
}
