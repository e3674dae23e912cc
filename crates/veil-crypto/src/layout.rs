//! Physical layout of encrypted file content
//!
//! ```text
//! +----------------+----------------+---------------------------+-----
//! | magic (8)      | nonce (24)     | tag (16) | data (<=64Ki)  | ...
//! +----------------+----------------+---------------------------+-----
//!  file header (32 bytes)            block 0                      block 1..
//! ```
//!
//! Clients fetch the physical bytes themselves, so the arithmetic here is
//! part of the public contract.

use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};

/// Magic bytes at the start of every encrypted file
pub const FILE_MAGIC: &[u8; 8] = b"RCLONE\x00\x00";

/// Size of the per-file nonce following the magic
pub const FILE_NONCE_SIZE: usize = 24;

/// Size of the whole-file header
pub const FILE_HEADER_SIZE: usize = 8 + FILE_NONCE_SIZE;

/// Plaintext bytes carried by one full block
pub const BLOCK_DATA_SIZE: usize = 64 * 1024;

/// Authentication overhead added to every block
pub const BLOCK_HEADER_SIZE: usize = 16;

const BLOCK_SIZE: u64 = (BLOCK_DATA_SIZE + BLOCK_HEADER_SIZE) as u64;

/// Physical size of a file with `size` plaintext bytes
pub fn encrypted_size(size: u64) -> u64 {
    let data = BLOCK_DATA_SIZE as u64;
    let blocks = size / data;
    let residue = size % data;
    let mut encrypted = FILE_HEADER_SIZE as u64 + blocks * BLOCK_SIZE;
    if residue != 0 {
        encrypted += BLOCK_HEADER_SIZE as u64 + residue;
    }
    encrypted
}

/// Plaintext size of a physical object of `size` bytes.
///
/// Fails when the object is shorter than a file header or ends in a block
/// that has no room for data.
pub fn decrypted_size(size: u64) -> Result<u64> {
    let body = size
        .checked_sub(FILE_HEADER_SIZE as u64)
        .ok_or(CryptoError::InvalidSize(size))?;
    let blocks = body / BLOCK_SIZE;
    let residue = body % BLOCK_SIZE;
    let mut decrypted = blocks * BLOCK_DATA_SIZE as u64;
    if residue != 0 {
        if residue <= BLOCK_HEADER_SIZE as u64 {
            return Err(CryptoError::InvalidSize(size));
        }
        decrypted += residue - BLOCK_HEADER_SIZE as u64;
    }
    Ok(decrypted)
}

/// Physical fetch plan for a plaintext byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    /// Index of the first block that holds requested bytes
    pub first_block: u64,
    /// Offset of that block in the physical object
    pub physical_offset: u64,
    /// Bytes to fetch from `physical_offset`; `None` reads to the end
    pub physical_length: Option<u64>,
    /// Plaintext bytes to drop from the first decrypted block
    pub discard: u64,
}

/// Map the plaintext range `offset..offset+length` onto whole physical blocks.
///
/// The returned length may run past the end of the object for the final
/// block; range requests clamp that naturally.
pub fn plan_range(offset: u64, length: Option<u64>) -> BlockRange {
    let data = BLOCK_DATA_SIZE as u64;
    let first_block = offset / data;
    let physical_length = length.map(|length| {
        if length == 0 {
            return 0;
        }
        let last_block = (offset + length - 1) / data;
        (last_block - first_block + 1) * BLOCK_SIZE
    });

    BlockRange {
        first_block,
        physical_offset: FILE_HEADER_SIZE as u64 + first_block * BLOCK_SIZE,
        physical_length,
        discard: offset % data,
    }
}
