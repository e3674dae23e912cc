//! Key material for encryption overlays
//!
//! An overlay never stores derived keys. Each caller re-derives the full
//! material from the (revealed) password and salt; the derivation is pure, so
//! concurrent requests for the same overlay always agree on the keys.

use crate::{CryptoError, Result};
use base64::Engine;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the content (data) key in bytes
pub const DATA_KEY_SIZE: usize = 32;

/// Size of the name key in bytes
pub const NAME_KEY_SIZE: usize = 32;

/// Size of the name tweak in bytes
pub const NAME_TWEAK_SIZE: usize = 16;

/// Total derived length: data key, name key, name tweak
pub const KEY_MATERIAL_SIZE: usize = DATA_KEY_SIZE + NAME_KEY_SIZE + NAME_TWEAK_SIZE;

/// Salt used when an overlay has no salt configured
pub const DEFAULT_SALT: [u8; 16] = [
    0xA8, 0x0D, 0xF4, 0x3A, 0x8F, 0xBD, 0x03, 0x08,
    0xA7, 0xCA, 0xB8, 0x3E, 0x58, 0x1F, 0x86, 0xB1,
];

/// scrypt work factors: N = 2^14, r = 8, p = 1
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// The full derived key block
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; KEY_MATERIAL_SIZE],
}

impl KeyMaterial {
    /// Derive key material from a plaintext password and salt.
    ///
    /// An empty password yields all-zero material: such an overlay passes
    /// content through with a null key, though names may still be encrypted.
    /// An empty salt selects [`DEFAULT_SALT`].
    ///
    /// This is deliberately slow (~16 MiB of memory); run it off the async
    /// executor.
    pub fn derive(password: &str, salt: &str) -> Result<Self> {
        let mut bytes = [0u8; KEY_MATERIAL_SIZE];
        if password.is_empty() {
            return Ok(Self { bytes });
        }

        let salt = if salt.is_empty() {
            &DEFAULT_SALT[..]
        } else {
            salt.as_bytes()
        };
        // params.len only bounds scrypt's own output helpers; `scrypt::scrypt`
        // fills the whole 80-byte buffer
        let params = scrypt::Params::new(
            SCRYPT_LOG_N,
            SCRYPT_R,
            SCRYPT_P,
            scrypt::Params::RECOMMENDED_LEN,
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid scrypt params: {e}")))?;
        scrypt::scrypt(password.as_bytes(), salt, &params, &mut bytes)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self { bytes })
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_MATERIAL_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "key material must be {} bytes, got {}",
                KEY_MATERIAL_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; KEY_MATERIAL_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// The content key
    pub fn data_key(&self) -> DataKey {
        let mut key = [0u8; DATA_KEY_SIZE];
        key.copy_from_slice(&self.bytes[..DATA_KEY_SIZE]);
        DataKey { key }
    }

    /// The name key
    pub fn name_key(&self) -> &[u8] {
        &self.bytes[DATA_KEY_SIZE..DATA_KEY_SIZE + NAME_KEY_SIZE]
    }

    /// The name tweak
    pub fn name_tweak(&self) -> &[u8] {
        &self.bytes[DATA_KEY_SIZE + NAME_KEY_SIZE..]
    }

    /// Whether the material is all zero (empty password)
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The content key handed to clients so they can decrypt blocks themselves
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    key: [u8; DATA_KEY_SIZE],
}

impl DataKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; DATA_KEY_SIZE] {
        &self.key
    }

    /// Encode as standard base64
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.key)
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey").field("key", &"[REDACTED]").finish()
    }
}
