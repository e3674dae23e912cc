//! Signed link tokens
//!
//! Proxy URLs carry `?sign=<token>` so that a proxy can check a link was
//! issued by this server. A token is
//!
//! ```text
//! base64url(blake3_keyed(key, "<path>:<expire>")) ":" <expire>
//! ```
//!
//! where `expire` is a unix timestamp in seconds and `0` never expires. The
//! MAC key is derived from the configured secret, never the secret itself.

use crate::{CryptoError, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use zeroize::Zeroize;

const KEY_CONTEXT: &str = "veil 2024-06 link signing v1";

/// Issues and checks link signatures
pub struct Signer {
    key: [u8; 32],
    ttl: Option<Duration>,
}

impl Signer {
    /// Create a signer. `ttl` of `None` issues tokens that never expire.
    pub fn new(secret: &str, ttl: Option<Duration>) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            ttl,
        }
    }

    /// Sign `path` with the configured lifetime
    pub fn sign(&self, path: &str) -> String {
        let expire = match self.ttl {
            Some(ttl) => (Utc::now() + ttl).timestamp(),
            None => 0,
        };
        self.sign_with_expiry(path, expire)
    }

    /// Sign `path` with an explicit expiry timestamp
    pub fn sign_with_expiry(&self, path: &str, expire: i64) -> String {
        let mac = self.mac(path, expire);
        format!("{}:{}", URL_SAFE_NO_PAD.encode(mac.as_bytes()), expire)
    }

    /// Verify a token issued for `path`
    pub fn verify(&self, path: &str, token: &str) -> Result<()> {
        let (mac, expire) = token
            .rsplit_once(':')
            .ok_or_else(|| CryptoError::InvalidSignature("missing expiry".to_string()))?;
        let expire: i64 = expire
            .parse()
            .map_err(|_| CryptoError::InvalidSignature("malformed expiry".to_string()))?;
        if expire != 0 && expire < Utc::now().timestamp() {
            return Err(CryptoError::SignatureExpired);
        }

        let raw = URL_SAFE_NO_PAD.decode(mac)?;
        let raw: [u8; 32] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature("wrong mac length".to_string()))?;

        // blake3::Hash equality is constant time
        if blake3::Hash::from(raw) != self.mac(path, expire) {
            return Err(CryptoError::InvalidSignature("mac mismatch".to_string()));
        }
        Ok(())
    }

    fn mac(&self, path: &str, expire: i64) -> blake3::Hash {
        blake3::keyed_hash(&self.key, format!("{path}:{expire}").as_bytes())
    }
}

impl Drop for Signer {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("key", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let signer = Signer::new("token", None);
        let token = signer.sign("/a/b.txt");
        assert!(token.ends_with(":0"));
        signer.verify("/a/b.txt", &token).unwrap();
    }

    #[test]
    fn test_verify_rejects_other_path() {
        let signer = Signer::new("token", None);
        let token = signer.sign("/a/b.txt");
        assert!(matches!(
            signer.verify("/a/c.txt", &token),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let token = Signer::new("one", None).sign("/x");
        assert!(Signer::new("two", None).verify("/x", &token).is_err());
    }

    #[test]
    fn test_expiry() {
        let signer = Signer::new("token", Some(Duration::hours(1)));
        let token = signer.sign("/x");
        signer.verify("/x", &token).unwrap();

        let past = Utc::now().timestamp() - 10;
        let expired = signer.sign_with_expiry("/x", past);
        assert!(matches!(
            signer.verify("/x", &expired),
            Err(CryptoError::SignatureExpired)
        ));
    }

    #[test]
    fn test_tampered_expiry_fails() {
        let signer = Signer::new("token", None);
        let token = signer.sign_with_expiry("/x", 4_000_000_000);
        let (mac, _) = token.rsplit_once(':').unwrap();
        assert!(signer.verify("/x", &format!("{mac}:0")).is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = Signer::new("token", None);
        assert!(signer.verify("/x", "").is_err());
        assert!(signer.verify("/x", "abc").is_err());
        assert!(signer.verify("/x", "abc:notanumber").is_err());
        assert!(signer.verify("/x", "YWJj:0").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        assert!(format!("{:?}", Signer::new("token", None)).contains("REDACTED"));
    }
}
