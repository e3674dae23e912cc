//! # Veil Crypto
//!
//! Cryptographic building blocks for Veil encryption overlays.
//!
//! This crate provides:
//! - **Secret reveal**: rclone-compatible un-obscuring of stored passwords and salts
//! - **Key material**: scrypt-stretched data key, name key and name tweak
//! - **Name cipher**: EME-AES-256 segment encryption and keyed obfuscation
//! - **Block layout**: the file header / block geometry clients need to decrypt
//! - **Signed links**: short tokens appended to proxy URLs
//!
//! ## Key material
//!
//! ```text
//! scrypt(password, salt | default salt, N=16384, r=8, p=1) -> 80 bytes
//!   ├── [0..32)   data key   (content blocks, handed to clients)
//!   ├── [32..64)  name key   (EME over path segments)
//!   └── [64..80)  name tweak (EME tweak)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use veil_crypto::{KeyMaterial, NameCipher, NameMode, NameEncoding};
//!
//! let material = KeyMaterial::derive("secret", "")?;
//! let names = NameCipher::new(&material, NameMode::Standard, NameEncoding::Base32, true, ".bin");
//! let encrypted = names.encrypt_file_name("report.pdf")?;
//! ```

pub mod eme;
pub mod error;
pub mod keys;
pub mod layout;
pub mod names;
pub mod obscure;
pub mod sign;

pub use error::{CryptoError, Result};
pub use keys::{DataKey, KeyMaterial, DATA_KEY_SIZE, DEFAULT_SALT};
pub use layout::{
    decrypted_size, encrypted_size, plan_range, BlockRange, BLOCK_DATA_SIZE, BLOCK_HEADER_SIZE,
    FILE_HEADER_SIZE, FILE_MAGIC, FILE_NONCE_SIZE,
};
pub use names::{NameCipher, NameEncoding, NameMode, DEFAULT_ENCRYPTED_SUFFIX};
pub use obscure::{obscure, reveal, reveal_secret, OBFUSCATED_PREFIX};
pub use sign::Signer;
