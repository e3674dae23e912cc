//! Path name encryption for overlays
//!
//! Each `/`-separated segment is transformed on its own, deterministically,
//! so a plaintext path always maps to the same physical path and can be
//! looked up without an index. Three modes are supported:
//!
//! - `standard`: PKCS#7 pad to 16 bytes, EME-AES-256 with the name tweak,
//!   then base32hex (lowercase, unpadded) or URL-safe base64 (unpadded)
//! - `obfuscate`: a keyed character rotation; hides names from casual view only
//! - `off`: names kept as-is, files get the configured suffix
//!
//! Directory segments are only transformed when directory name encryption is
//! enabled; the last segment of a file path always is.

use crate::eme::{self, Direction};
use crate::keys::KeyMaterial;
use crate::{CryptoError, Result};
use aes::Aes256;
use aes::cipher::{KeyInit, generic_array::GenericArray};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use data_encoding::BASE32HEX_NOPAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Suffix appended to file names when name encryption is off
pub const DEFAULT_ENCRYPTED_SUFFIX: &str = ".bin";

/// Longest decoded ciphertext accepted for a single segment
const MAX_SEGMENT_CIPHERTEXT: usize = eme::MAX_BLOCKS * eme::BLOCK_SIZE;

const QUOTE: char = '!';

/// How file and directory names are transformed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMode {
    Off,
    #[default]
    Standard,
    Obfuscate,
}

impl FromStr for NameMode {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "standard" => Ok(Self::Standard),
            "obfuscate" => Ok(Self::Obfuscate),
            other => Err(CryptoError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for NameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Standard => f.write_str("standard"),
            Self::Obfuscate => f.write_str("obfuscate"),
        }
    }
}

/// Text encoding of `standard` mode ciphertext
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameEncoding {
    #[default]
    Base32,
    Base64,
}

impl FromStr for NameEncoding {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base32" => Ok(Self::Base32),
            "base64" => Ok(Self::Base64),
            other => Err(CryptoError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl NameEncoding {
    fn encode(&self, data: &[u8]) -> String {
        match self {
            Self::Base32 => BASE32HEX_NOPAD.encode(data).to_ascii_lowercase(),
            Self::Base64 => URL_SAFE_NO_PAD.encode(data),
        }
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Base32 => BASE32HEX_NOPAD
                .decode(text.to_ascii_uppercase().as_bytes())
                .map_err(|e| CryptoError::NotEncryptedName(format!("{text}: {e}"))),
            Self::Base64 => URL_SAFE_NO_PAD
                .decode(text)
                .map_err(|e| CryptoError::NotEncryptedName(format!("{text}: {e}"))),
        }
    }
}

/// Segment-wise name cipher built from overlay key material
pub struct NameCipher {
    mode: NameMode,
    encoding: NameEncoding,
    dir_name_encrypt: bool,
    suffix: String,
    block: Aes256,
    name_key: [u8; 32],
    name_tweak: [u8; 16],
}

impl NameCipher {
    /// Build a cipher from derived key material
    pub fn new(
        material: &KeyMaterial,
        mode: NameMode,
        encoding: NameEncoding,
        dir_name_encrypt: bool,
        suffix: &str,
    ) -> Self {
        let mut name_key = [0u8; 32];
        name_key.copy_from_slice(material.name_key());
        let mut name_tweak = [0u8; 16];
        name_tweak.copy_from_slice(material.name_tweak());

        Self {
            mode,
            encoding,
            dir_name_encrypt,
            suffix: suffix.to_string(),
            block: Aes256::new(GenericArray::from_slice(&name_key)),
            name_key,
            name_tweak,
        }
    }

    pub fn mode(&self) -> NameMode {
        self.mode
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Encrypt a file name or a relative path ending in a file name
    pub fn encrypt_file_name(&self, name: &str) -> Result<String> {
        if self.mode == NameMode::Off {
            return Ok(format!("{}{}", name, self.suffix));
        }
        self.encrypt_segments(name)
    }

    /// Encrypt a directory name or directory path
    pub fn encrypt_dir_name(&self, name: &str) -> Result<String> {
        if self.mode == NameMode::Off || !self.dir_name_encrypt {
            return Ok(name.to_string());
        }
        self.encrypt_segments(name)
    }

    /// Decrypt a name produced by [`encrypt_file_name`](Self::encrypt_file_name)
    pub fn decrypt_file_name(&self, name: &str) -> Result<String> {
        if self.mode == NameMode::Off {
            return match name.strip_suffix(self.suffix.as_str()) {
                Some(plain) if !plain.is_empty() => Ok(plain.to_string()),
                _ => Err(CryptoError::NotEncryptedName(name.to_string())),
            };
        }
        self.decrypt_segments(name)
    }

    /// Decrypt a name produced by [`encrypt_dir_name`](Self::encrypt_dir_name)
    pub fn decrypt_dir_name(&self, name: &str) -> Result<String> {
        if self.mode == NameMode::Off || !self.dir_name_encrypt {
            return Ok(name.to_string());
        }
        self.decrypt_segments(name)
    }

    fn encrypt_segments(&self, path: &str) -> Result<String> {
        let segments: Vec<&str> = path.split('/').collect();
        let last = segments.len() - 1;
        let mut out = Vec::with_capacity(segments.len());
        for (i, segment) in segments.into_iter().enumerate() {
            if !self.dir_name_encrypt && i != last {
                out.push(segment.to_string());
                continue;
            }
            out.push(match self.mode {
                NameMode::Obfuscate => self.obfuscate_segment(segment),
                _ => self.encrypt_segment(segment)?,
            });
        }
        Ok(out.join("/"))
    }

    fn decrypt_segments(&self, path: &str) -> Result<String> {
        let segments: Vec<&str> = path.split('/').collect();
        let last = segments.len() - 1;
        let mut out = Vec::with_capacity(segments.len());
        for (i, segment) in segments.into_iter().enumerate() {
            if !self.dir_name_encrypt && i != last {
                out.push(segment.to_string());
                continue;
            }
            out.push(match self.mode {
                NameMode::Obfuscate => self.deobfuscate_segment(segment)?,
                _ => self.decrypt_segment(segment)?,
            });
        }
        Ok(out.join("/"))
    }

    /// Encrypt one segment in `standard` mode
    pub fn encrypt_segment(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let padded = pkcs7_pad(plaintext.as_bytes());
        if padded.len() > MAX_SEGMENT_CIPHERTEXT {
            return Err(CryptoError::NameTooLong(plaintext.len()));
        }
        let ciphertext = eme::transform(&self.block, &self.name_tweak, &padded, Direction::Encrypt)?;
        Ok(self.encoding.encode(&ciphertext))
    }

    /// Decrypt one segment in `standard` mode
    pub fn decrypt_segment(&self, ciphertext: &str) -> Result<String> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }
        let raw = self.encoding.decode(ciphertext)?;
        if raw.is_empty() || raw.len() % eme::BLOCK_SIZE != 0 || raw.len() > MAX_SEGMENT_CIPHERTEXT {
            return Err(CryptoError::NotEncryptedName(ciphertext.to_string()));
        }
        let padded = eme::transform(&self.block, &self.name_tweak, &raw, Direction::Decrypt)?;
        let plaintext = pkcs7_unpad(&padded)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::NotEncryptedName(ciphertext.to_string()))
    }

    /// Obfuscate one segment.
    ///
    /// The rotation distance is the code point sum of the name modulo 256,
    /// written in front of the result, plus the sum of the name key bytes.
    /// Digits, ASCII letters, Latin-1 and higher planes rotate within their
    /// own range; everything else is kept.
    pub fn obfuscate_segment(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }

        let seed: u64 = plaintext.chars().map(|c| c as u64).sum::<u64>() % 256;
        let mut out = format!("{seed}.");
        let dir = seed + self.key_sum();

        for c in plaintext.chars() {
            let r = c as u64;
            match c {
                QUOTE => {
                    out.push(QUOTE);
                    out.push(QUOTE);
                }
                '0'..='9' => {
                    let shift = dir % 9 + 1;
                    out.push(to_char('0' as u64 + (r - '0' as u64 + shift) % 10));
                }
                'A'..='Z' | 'a'..='z' => {
                    let shift = dir % 25 + 1;
                    let mut pos = r - 'A' as u64;
                    if pos >= 26 {
                        pos -= 6;
                    }
                    pos = (pos + shift) % 52;
                    if pos >= 26 {
                        pos += 6;
                    }
                    out.push(to_char('A' as u64 + pos));
                }
                '\u{A0}'..='\u{FF}' => {
                    let shift = dir % 95 + 1;
                    out.push(to_char(0xA0 + (r - 0xA0 + shift) % 96));
                }
                _ if r >= 0x100 => {
                    let shift = dir % 127 + 1;
                    let base = r - r % 256;
                    match char::from_u32((base + (r - base + shift) % 256) as u32) {
                        Some(rotated) => out.push(rotated),
                        None => {
                            out.push(QUOTE);
                            out.push(c);
                        }
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }

    /// Reverse [`obfuscate_segment`](Self::obfuscate_segment)
    pub fn deobfuscate_segment(&self, ciphertext: &str) -> Result<String> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }
        let (seed, body) = ciphertext
            .split_once('.')
            .ok_or_else(|| CryptoError::NotEncryptedName(ciphertext.to_string()))?;
        if seed == "!" {
            return Ok(body.to_string());
        }
        let seed: u64 = seed
            .parse()
            .map_err(|_| CryptoError::NotEncryptedName(ciphertext.to_string()))?;
        let dir = seed + self.key_sum();

        let mut out = String::with_capacity(body.len());
        let mut quoted = false;
        for c in body.chars() {
            let r = c as i64;
            let dir = dir as i64;
            if quoted {
                out.push(c);
                quoted = false;
                continue;
            }
            match c {
                QUOTE => quoted = true,
                '0'..='9' => {
                    let shift = dir % 9 + 1;
                    let mut n = r - shift;
                    if n < '0' as i64 {
                        n += 10;
                    }
                    out.push(to_char(n as u64));
                }
                'A'..='Z' | 'a'..='z' => {
                    let shift = dir % 25 + 1;
                    let mut pos = r - 'A' as i64;
                    if pos >= 26 {
                        pos -= 6;
                    }
                    pos -= shift;
                    if pos < 0 {
                        pos += 52;
                    }
                    if pos >= 26 {
                        pos += 6;
                    }
                    out.push(to_char(('A' as i64 + pos) as u64));
                }
                '\u{A0}'..='\u{FF}' => {
                    let shift = dir % 95 + 1;
                    let mut n = r - shift;
                    if n < 0xA0 {
                        n += 96;
                    }
                    out.push(to_char(n as u64));
                }
                _ if r >= 0x100 => {
                    let shift = dir % 127 + 1;
                    let base = r - r % 256;
                    let mut n = r - shift;
                    if n < base {
                        n += 256;
                    }
                    let restored = char::from_u32(n as u32)
                        .ok_or_else(|| CryptoError::NotEncryptedName(ciphertext.to_string()))?;
                    out.push(restored);
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    fn key_sum(&self) -> u64 {
        self.name_key.iter().map(|&b| b as u64).sum()
    }
}

impl Drop for NameCipher {
    fn drop(&mut self) {
        self.name_key.zeroize();
        self.name_tweak.zeroize();
    }
}

impl fmt::Debug for NameCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameCipher")
            .field("mode", &self.mode)
            .field("encoding", &self.encoding)
            .field("dir_name_encrypt", &self.dir_name_encrypt)
            .field("suffix", &self.suffix)
            .finish_non_exhaustive()
    }
}

// Callers only pass code points inside ranges that are valid scalar values.
fn to_char(code: u64) -> char {
    char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let n = eme::BLOCK_SIZE - data.len() % eme::BLOCK_SIZE;
    let mut out = Vec::with_capacity(data.len() + n);
    out.extend_from_slice(data);
    out.resize(data.len() + n, n as u8);
    out
}

fn pkcs7_unpad(data: &[u8]) -> Result<&[u8]> {
    if data.is_empty() || data.len() % eme::BLOCK_SIZE != 0 {
        return Err(CryptoError::BadPadding);
    }
    let n = data[data.len() - 1] as usize;
    if n == 0 || n > eme::BLOCK_SIZE || n > data.len() {
        return Err(CryptoError::BadPadding);
    }
    let (plain, padding) = data.split_at(data.len() - n);
    if padding.iter().any(|&b| b as usize != n) {
        return Err(CryptoError::BadPadding);
    }
    Ok(plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn material() -> KeyMaterial {
        let bytes: Vec<u8> = (0u8..80).collect();
        KeyMaterial::from_bytes(&bytes).unwrap()
    }

    fn cipher(mode: NameMode, encoding: NameEncoding, dirs: bool) -> NameCipher {
        NameCipher::new(&material(), mode, encoding, dirs, DEFAULT_ENCRYPTED_SUFFIX)
    }

    #[test]
    fn test_pkcs7() {
        assert_eq!(pkcs7_pad(b""), vec![16u8; 16]);
        assert_eq!(pkcs7_pad(b"abc").len(), 16);
        assert_eq!(pkcs7_unpad(&pkcs7_pad(b"hello")).unwrap(), b"hello");
        assert!(pkcs7_unpad(&[0u8; 16]).is_err());
        assert!(pkcs7_unpad(&[17u8; 16]).is_err());
    }

    #[rstest]
    #[case(NameEncoding::Base32)]
    #[case(NameEncoding::Base64)]
    fn test_standard_segment_roundtrip(#[case] encoding: NameEncoding) {
        let c = cipher(NameMode::Standard, encoding, true);
        for name in ["1", "report.pdf", "Mixed Case.TXT", "ünïcödé 文件", "a/b"] {
            let enc = c.encrypt_segment(name).unwrap();
            assert_ne!(enc, name);
            assert_eq!(c.decrypt_segment(&enc).unwrap(), name);
        }
    }

    #[test]
    fn test_base32_output_is_lowercase_and_case_insensitive() {
        let c = cipher(NameMode::Standard, NameEncoding::Base32, true);
        let enc = c.encrypt_segment("report.pdf").unwrap();
        assert_eq!(enc, enc.to_ascii_lowercase());
        assert_eq!(enc.len(), 26); // one block
        assert_eq!(c.decrypt_segment(&enc.to_ascii_uppercase()).unwrap(), "report.pdf");
    }

    #[test]
    fn test_standard_deterministic() {
        let c = cipher(NameMode::Standard, NameEncoding::Base32, true);
        assert_eq!(
            c.encrypt_segment("same").unwrap(),
            c.encrypt_segment("same").unwrap()
        );
        assert_ne!(
            c.encrypt_segment("same").unwrap(),
            c.encrypt_segment("Same").unwrap()
        );
    }

    #[test]
    fn test_empty_segment_stays_empty() {
        let c = cipher(NameMode::Standard, NameEncoding::Base32, true);
        assert_eq!(c.encrypt_segment("").unwrap(), "");
        assert_eq!(c.decrypt_segment("").unwrap(), "");
        assert_eq!(c.obfuscate_segment(""), "");
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let c = cipher(NameMode::Standard, NameEncoding::Base32, true);
        assert!(c.decrypt_segment("not-base32!").is_err());
        // valid base32hex but not a whole block
        assert!(c.decrypt_segment("c4").is_err());
    }

    #[test]
    fn test_name_too_long() {
        let c = cipher(NameMode::Standard, NameEncoding::Base32, true);
        let long = "x".repeat(MAX_SEGMENT_CIPHERTEXT);
        assert!(matches!(
            c.encrypt_segment(&long),
            Err(CryptoError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_dir_name_encryption_flag() {
        let with_dirs = cipher(NameMode::Standard, NameEncoding::Base32, true);
        let without = cipher(NameMode::Standard, NameEncoding::Base32, false);

        let enc = with_dirs.encrypt_file_name("docs/report.pdf").unwrap();
        let (dir, file) = enc.split_once('/').unwrap();
        assert_ne!(dir, "docs");
        assert_eq!(with_dirs.decrypt_file_name(&enc).unwrap(), "docs/report.pdf");
        assert_eq!(file, with_dirs.encrypt_segment("report.pdf").unwrap());

        let enc = without.encrypt_file_name("docs/report.pdf").unwrap();
        assert!(enc.starts_with("docs/"));
        assert_eq!(without.decrypt_file_name(&enc).unwrap(), "docs/report.pdf");

        assert_eq!(without.encrypt_dir_name("/docs/").unwrap(), "/docs/");
        assert_ne!(with_dirs.encrypt_dir_name("/docs/").unwrap(), "/docs/");
    }

    #[test]
    fn test_dir_path_keeps_separators() {
        let c = cipher(NameMode::Standard, NameEncoding::Base32, true);
        let enc = c.encrypt_dir_name("/a/b/").unwrap();
        assert!(enc.starts_with('/'));
        assert!(enc.ends_with('/'));
        assert_eq!(enc.matches('/').count(), 3);
        assert_eq!(c.decrypt_dir_name(&enc).unwrap(), "/a/b/");
    }

    #[test]
    fn test_off_mode_suffix() {
        let c = cipher(NameMode::Off, NameEncoding::Base32, true);
        assert_eq!(c.encrypt_file_name("report.pdf").unwrap(), "report.pdf.bin");
        assert_eq!(c.encrypt_dir_name("docs").unwrap(), "docs");
        assert_eq!(c.decrypt_file_name("report.pdf.bin").unwrap(), "report.pdf");
        assert!(c.decrypt_file_name("report.pdf").is_err());
        assert!(c.decrypt_file_name(".bin").is_err());
    }

    #[test]
    fn test_obfuscate_roundtrip() {
        let c = cipher(NameMode::Obfuscate, NameEncoding::Base32, true);
        for name in ["Hello World 2024.txt", "!bang!", "ÀÉÎõü", "日本語のファイル", "\u{7f}ctl"] {
            let enc = c.obfuscate_segment(name);
            assert_ne!(enc, name);
            assert_eq!(c.deobfuscate_segment(&enc).unwrap(), name);
        }
    }

    #[test]
    fn test_obfuscate_prefix_and_quote_escape() {
        let c = cipher(NameMode::Obfuscate, NameEncoding::Base32, true);
        assert_eq!(c.deobfuscate_segment("!.raw name").unwrap(), "raw name");
        assert!(c.deobfuscate_segment("no-dot").is_err());
        assert!(c.deobfuscate_segment("x.abc").is_err());
    }

    #[test]
    fn test_mode_and_encoding_parse() {
        assert_eq!("Standard".parse::<NameMode>().unwrap(), NameMode::Standard);
        assert_eq!("off".parse::<NameMode>().unwrap(), NameMode::Off);
        assert!("rot13".parse::<NameMode>().is_err());
        assert_eq!("base64".parse::<NameEncoding>().unwrap(), NameEncoding::Base64);
        assert!(matches!(
            "base32768".parse::<NameEncoding>(),
            Err(CryptoError::UnsupportedEncoding(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_standard_bijection(name in "[^/]{1,64}", dirs in any::<bool>()) {
            let c = cipher(NameMode::Standard, NameEncoding::Base32, dirs);
            let enc = c.encrypt_file_name(&name).unwrap();
            prop_assert_eq!(c.decrypt_file_name(&enc).unwrap(), name.clone());
            let enc = c.encrypt_dir_name(&name).unwrap();
            prop_assert_eq!(c.decrypt_dir_name(&enc).unwrap(), name);
        }

        #[test]
        fn prop_obfuscate_bijection(name in "[^/]{1,64}") {
            let c = cipher(NameMode::Obfuscate, NameEncoding::Base32, true);
            let enc = c.obfuscate_segment(&name);
            prop_assert_eq!(c.deobfuscate_segment(&enc).unwrap(), name);
        }
    }
}
