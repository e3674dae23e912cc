//! Error types for the veil-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// An obscured secret could not be revealed
    #[error("failed to reveal secret: {0}")]
    Reveal(String),

    /// scrypt rejected its parameters or output length
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Input to the wide-block cipher has an unusable length
    #[error("invalid block input: {0}")]
    InvalidBlockInput(String),

    /// The name is not a valid encrypted name
    #[error("not an encrypted name: {0}")]
    NotEncryptedName(String),

    /// PKCS#7 padding did not verify after decryption
    #[error("bad padding on decrypted name")]
    BadPadding,

    /// The name is too long to encrypt
    #[error("name too long to encrypt: {0} bytes")]
    NameTooLong(usize),

    /// The physical size cannot belong to an encrypted object
    #[error("invalid encrypted size: {0}")]
    InvalidSize(u64),

    /// Unknown or unsupported name encoding
    #[error("unsupported name encoding: {0}")]
    UnsupportedEncoding(String),

    /// Unknown name encryption mode
    #[error("unsupported name encryption mode: {0}")]
    UnsupportedMode(String),

    /// Malformed or forged signature
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Signature past its expiry
    #[error("signature expired")]
    SignatureExpired,

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
