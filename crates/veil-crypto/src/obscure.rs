//! Reversible obscuring of stored secrets
//!
//! Overlay passwords and salts may be stored obscured, compatible with
//! rclone's `obscure`: AES-256-CTR under a fixed, published key with a random
//! 16-byte IV, encoded as unpadded URL-safe base64. Anyone holding the config
//! can reveal the secret; this only keeps it from being read over a shoulder.

use crate::{CryptoError, Result};
use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::{RngCore, rngs::OsRng};

/// Marker prepended to a stored secret that holds an obscured value
pub const OBFUSCATED_PREFIX: &str = "___Obfuscated___";

const IV_SIZE: usize = 16;

/// rclone's published obscure key
const OBSCURE_KEY: [u8; 32] = [
    0x9c, 0x93, 0x5b, 0x48, 0x73, 0x0a, 0x55, 0x4d,
    0x6b, 0xfd, 0x7c, 0x63, 0xc8, 0x86, 0xa9, 0x2b,
    0xd3, 0x90, 0x19, 0x8e, 0xb8, 0x12, 0x8a, 0xfb,
    0xf4, 0xde, 0x16, 0x2b, 0x8b, 0x95, 0xf6, 0x38,
];

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Obscure a plaintext secret
pub fn obscure(plaintext: &str) -> Result<String> {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut out = Vec::with_capacity(IV_SIZE + plaintext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(plaintext.as_bytes());
    apply_keystream(&iv, &mut out[IV_SIZE..])?;

    Ok(URL_SAFE_NO_PAD.encode(out))
}

/// Reveal an obscured secret
pub fn reveal(obscured: &str) -> Result<String> {
    let raw = URL_SAFE_NO_PAD
        .decode(obscured.trim())
        .map_err(|e| CryptoError::Reveal(format!("base64 decode failed: {e}")))?;
    if raw.len() < IV_SIZE {
        return Err(CryptoError::Reveal(
            "input too short - is it obscured?".to_string(),
        ));
    }

    let (iv, ciphertext) = raw.split_at(IV_SIZE);
    let mut plaintext = ciphertext.to_vec();
    apply_keystream(iv, &mut plaintext)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Reveal("revealed secret is not UTF-8".to_string()))
}

/// Turn a stored secret into its plaintext form.
///
/// Secrets carrying [`OBFUSCATED_PREFIX`] are revealed; anything else is
/// returned as-is. An empty secret stays empty.
pub fn reveal_secret(stored: &str) -> Result<String> {
    match stored.strip_prefix(OBFUSCATED_PREFIX) {
        Some(obscured) => reveal(obscured),
        None => Ok(stored.to_string()),
    }
}

fn apply_keystream(iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let mut cipher = Aes256Ctr::new_from_slices(&OBSCURE_KEY, iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    cipher.apply_keystream(buf);
    Ok(())
}
