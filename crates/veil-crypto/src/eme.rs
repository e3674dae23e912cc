//! EME wide-block encryption over AES-256
//!
//! EME (ECB-Mix-ECB, Halevi & Rogaway) turns a 128-bit block cipher into a
//! tweakable cipher over 1..=128 blocks where every output byte depends on
//! every input byte. Name segments are encrypted with it so that equal
//! prefixes do not leak through equal ciphertext prefixes.

use crate::{CryptoError, Result};
use aes::Aes256;
use aes::cipher::{BlockDecrypt, BlockEncrypt, generic_array::GenericArray};

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Largest input EME accepts, in blocks
pub const MAX_BLOCKS: usize = 16 * 8;

/// Direction of the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Run EME over `input` with the given tweak.
///
/// `input` must be a non-empty multiple of [`BLOCK_SIZE`] and at most
/// [`MAX_BLOCKS`] blocks long.
pub fn transform(
    cipher: &Aes256,
    tweak: &[u8; BLOCK_SIZE],
    input: &[u8],
    direction: Direction,
) -> Result<Vec<u8>> {
    if input.is_empty() || input.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidBlockInput(format!(
            "length {} is not a positive multiple of {}",
            input.len(),
            BLOCK_SIZE
        )));
    }
    let m = input.len() / BLOCK_SIZE;
    if m > MAX_BLOCKS {
        return Err(CryptoError::InvalidBlockInput(format!(
            "{m} blocks exceeds the maximum of {MAX_BLOCKS}"
        )));
    }

    let l_table = tabulate_l(cipher, m);
    let mut out = input.to_vec();

    // PPPj = E(K; Pj xor 2^(j-1) L)
    for (j, chunk) in out.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        xor_into(chunk, &l_table[j]);
        aes_block(cipher, chunk, direction);
    }

    // MP = (xor of PPPj) xor T
    let mut mp = *tweak;
    for chunk in out.chunks_exact(BLOCK_SIZE) {
        xor_into(&mut mp, chunk);
    }

    let mut mc = mp;
    aes_block(cipher, &mut mc, direction);

    let mut mask = mp;
    xor_into(&mut mask, &mc);

    // CCCj = PPPj xor 2^(j-1) M, for j >= 1
    for chunk in out.chunks_exact_mut(BLOCK_SIZE).skip(1) {
        mult_by_two(&mut mask);
        xor_into(chunk, &mask);
    }

    // CCC1 = (xor of CCCj, j >= 1) xor T xor MC
    let mut ccc1 = mc;
    xor_into(&mut ccc1, tweak);
    for chunk in out.chunks_exact(BLOCK_SIZE).skip(1) {
        xor_into(&mut ccc1, chunk);
    }
    out[..BLOCK_SIZE].copy_from_slice(&ccc1);

    // Cj = E(K; CCCj) xor 2^(j-1) L
    for (j, chunk) in out.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        aes_block(cipher, chunk, direction);
        xor_into(chunk, &l_table[j]);
    }

    Ok(out)
}

/// L_i = 2^(i+1) * E(K; 0)
fn tabulate_l(cipher: &Aes256, m: usize) -> Vec<[u8; BLOCK_SIZE]> {
    let mut li = [0u8; BLOCK_SIZE];
    cipher.encrypt_block(GenericArray::from_mut_slice(&mut li));

    let mut table = Vec::with_capacity(m);
    for _ in 0..m {
        mult_by_two(&mut li);
        table.push(li);
    }
    table
}

/// Doubling in GF(2^128), little-endian byte order
fn mult_by_two(block: &mut [u8; BLOCK_SIZE]) {
    let mut out = [0u8; BLOCK_SIZE];
    out[0] = block[0] << 1;
    if block[BLOCK_SIZE - 1] >= 0x80 {
        out[0] ^= 0x87;
    }
    for j in 1..BLOCK_SIZE {
        out[j] = block[j] << 1;
        if block[j - 1] >= 0x80 {
            out[j] |= 1;
        }
    }
    *block = out;
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

fn aes_block(cipher: &Aes256, block: &mut [u8], direction: Direction) {
    let block = GenericArray::from_mut_slice(block);
    match direction {
        Direction::Encrypt => cipher.encrypt_block(block),
        Direction::Decrypt => cipher.decrypt_block(block),
    }
}
